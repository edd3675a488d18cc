//! The coordinator: route, dispatch, assemble, audit.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use health_config::{AppConfig, DispatchMode};
use health_core::{AgentError, SourceRef, Task, Turn};
use health_llm::{Generation, LanguageModel};
use health_tools::ToolRegistry;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::assembly::{self, Contribution};
use crate::audit::{RequestContext, FINAL_ARTIFACT, QUESTION_ARTIFACT};
use crate::citations;
use crate::language::Language;
use crate::policy;
use crate::prompts;
use crate::routing::{classify, Classification, RoutingDecision};
use crate::specialist::{AgentDefinition, PriorFindings, Specialist, SpecialistReport, SpecialistRole};

/// Tools every specialist is registered with.
pub const SPECIALIST_TOOLS: &[&str] = &["internet_search"];

/// Progress reported while a request is handled.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CoordinatorEvent {
    Routing {
        decision: RoutingDecision,
        emergency: bool,
        insufficient_data: bool,
    },
    Specialist {
        role: SpecialistRole,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Answer to one task.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorResponse {
    pub content: String,
    pub routing: RoutingDecision,
    /// At least one dispatched specialist failed.
    pub degraded: bool,
    pub missing: Vec<SpecialistRole>,
    pub sources: Vec<SourceRef>,
    pub synthesized: bool,
    /// Language of the fixed notices and headings.
    pub language: Language,
}

/// Knobs that shape a coordinator run.
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub dispatch: DispatchMode,
    pub synthesize: bool,
    pub max_steps: usize,
    pub step_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            dispatch: DispatchMode::Parallel,
            synthesize: false,
            max_steps: 12,
            step_timeout: Duration::from_secs(60),
        }
    }
}

impl From<&AppConfig> for CoordinatorSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            dispatch: config.dispatch,
            synthesize: config.synthesize,
            max_steps: config.limits.max_steps,
            step_timeout: config.limits.step_timeout,
        }
    }
}

type Outcome = (SpecialistRole, Result<SpecialistReport, AgentError>);

/// Routes tasks to the doctor and coach specialists and assembles their answers.
pub struct Coordinator {
    model: Arc<dyn LanguageModel>,
    doctor: Specialist,
    coach: Specialist,
    settings: CoordinatorSettings,
}

impl Coordinator {
    /// Builds both specialists from the registry; each needs [`SPECIALIST_TOOLS`].
    pub fn new(
        model: Arc<dyn LanguageModel>,
        registry: &ToolRegistry,
        settings: CoordinatorSettings,
    ) -> Result<Self, AgentError> {
        let build = |role| -> Result<Specialist, AgentError> {
            let definition = AgentDefinition::for_role(role, registry, SPECIALIST_TOOLS)?;
            Ok(Specialist::new(role, definition, Arc::clone(&model), settings.max_steps, settings.step_timeout))
        };

        Ok(Self {
            doctor: build(SpecialistRole::Doctor)?,
            coach: build(SpecialistRole::Coach)?,
            model: Arc::clone(&model),
            settings,
        })
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    fn specialist(&self, role: SpecialistRole) -> &Specialist {
        match role {
            SpecialistRole::Doctor => &self.doctor,
            SpecialistRole::Coach => &self.coach,
        }
    }

    /// Answers `task` without progress events.
    pub async fn handle(&self, task: &Task, ctx: &RequestContext) -> Result<CoordinatorResponse, AgentError> {
        self.handle_with_events(task, ctx, None).await
    }

    /// Answers `task`, reporting progress on `events` when given.
    ///
    /// The question artifact is written before any specialist starts and the
    /// final artifact only after all of them returned. A cancelled request
    /// stops in-flight specialists and writes no final artifact.
    pub async fn handle_with_events(
        &self,
        task: &Task,
        ctx: &RequestContext,
        events: Option<&mpsc::Sender<CoordinatorEvent>>,
    ) -> Result<CoordinatorResponse, AgentError> {
        let classification = classify(task);
        let decision = RoutingDecision::decide(&classification, self.settings.dispatch);
        let language = Language::detect(&task.question);

        info!("╔══════════════════════════════════════════════════════════════");
        info!("║ REQUEST: {}", ctx.request_id);
        info!("║ Input: {}...", task.question.chars().take(50).collect::<String>());
        info!(
            "║ Routing: {} (emergency: {}, insufficient data: {}, ambiguous: {})",
            decision, classification.emergency, classification.insufficient_data, classification.ambiguous
        );
        info!("║ Language: {}", language.code());
        info!("╠══════════════════════════════════════════════════════════════");

        ctx.record(QUESTION_ARTIFACT, &task.question).await?;

        emit(
            events,
            CoordinatorEvent::Routing {
                decision,
                emergency: classification.emergency,
                insufficient_data: classification.insufficient_data,
            },
        )
        .await;

        let outcomes = tokio::select! {
            _ = ctx.cancel.cancelled() => {
                warn!("║ ⚠ Request {} cancelled during dispatch", ctx.request_id);
                return Err(AgentError::Cancelled);
            }
            outcomes = self.dispatch(task, decision, &classification, language, events) => outcomes,
        };

        let failures: Vec<String> = outcomes
            .iter()
            .filter_map(|(role, r)| r.as_ref().err().map(|e| format!("{}: {}", role, e)))
            .collect();
        if failures.len() == outcomes.len() {
            warn!("║ ✗ All specialists failed: {:?}", failures);
            info!("╚══════════════════════════════════════════════════════════════");
            return Err(AgentError::SpecialistsFailed(failures.join("; ")));
        }

        let contributions: Vec<(SpecialistRole, Contribution)> = outcomes
            .into_iter()
            .map(|(role, result)| match result {
                Ok(report) => (role, Contribution::Answer(report.final_text)),
                Err(e) => (role, Contribution::Missing(e.to_string())),
            })
            .collect();
        let missing: Vec<SpecialistRole> = contributions
            .iter()
            .filter(|(_, c)| matches!(c, Contribution::Missing(_)))
            .map(|(role, _)| *role)
            .collect();

        let assembled = assembly::assemble(&task.question, classification.emergency, language, &contributions)?;

        let (content, synthesized) = if self.settings.synthesize {
            tokio::select! {
                _ = ctx.cancel.cancelled() => return Err(AgentError::Cancelled),
                result = self.synthesize(task, &assembled.document, classification.emergency, language) => result,
            }
        } else {
            (assembled.document, false)
        };

        if ctx.cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        ctx.record(FINAL_ARTIFACT, &content).await?;

        info!(
            "║ ✓ Response: {} chars, {} sources, degraded: {}, {}ms",
            content.len(),
            assembled.sources.len(),
            !missing.is_empty(),
            ctx.elapsed_ms()
        );
        info!("╚══════════════════════════════════════════════════════════════");

        Ok(CoordinatorResponse {
            content,
            routing: decision,
            degraded: !missing.is_empty(),
            missing,
            sources: assembled.sources,
            synthesized,
            language,
        })
    }

    async fn dispatch(
        &self,
        task: &Task,
        decision: RoutingDecision,
        classification: &Classification,
        language: Language,
        events: Option<&mpsc::Sender<CoordinatorEvent>>,
    ) -> Vec<Outcome> {
        match decision {
            RoutingDecision::BothSequential => {
                info!("║ SEQUENTIAL EXECUTION: {:?}", decision.roles());
                let doctor = self.run_role(SpecialistRole::Doctor, task, None, classification, language, events).await;
                let prior = doctor.1.as_ref().ok().map(|r| PriorFindings {
                    role: SpecialistRole::Doctor,
                    text: r.final_text.as_str(),
                });
                let coach = self.run_role(SpecialistRole::Coach, task, prior, classification, language, events).await;
                vec![doctor, coach]
            }
            _ => {
                if decision.roles().len() > 1 {
                    info!("║ PARALLEL EXECUTION: {:?}", decision.roles());
                }
                let runs = decision
                    .roles()
                    .iter()
                    .map(|&role| self.run_role(role, task, None, classification, language, events));
                join_all(runs).await
            }
        }
    }

    async fn run_role(
        &self,
        role: SpecialistRole,
        task: &Task,
        prior: Option<PriorFindings<'_>>,
        classification: &Classification,
        language: Language,
        events: Option<&mpsc::Sender<CoordinatorEvent>>,
    ) -> Outcome {
        let result = self.specialist(role).run(task, prior).await.map(|mut report| {
            if role == SpecialistRole::Doctor {
                report.final_text = policy::guard_doctor_answer(&report.final_text, classification, language);
            }
            report
        });

        if let Err(e) = &result {
            warn!("║ ✗ {} failed: {}", role, e);
        }
        emit(
            events,
            CoordinatorEvent::Specialist {
                role,
                ok: result.is_ok(),
                error: result.as_ref().err().map(|e| e.to_string()),
            },
        )
        .await;

        (role, result)
    }

    /// Has the coordinator model polish the draft; falls back to the draft on any failure.
    async fn synthesize(&self, task: &Task, draft: &str, emergency: bool, language: Language) -> (String, bool) {
        let briefing = format!(
            "## Question\n\n{}\n\n## Draft\n\n{}\n\n{}",
            task.question,
            draft,
            prompts::LANGUAGE_INSTRUCTION
        );

        let turns = [Turn::user(briefing)];
        let call = self.model.generate(prompts::COORDINATOR_PROMPT, &turns, &[]);
        let text = match tokio::time::timeout(self.settings.step_timeout, call).await {
            Ok(Ok(Generation::Final(text))) => text,
            Ok(Ok(Generation::ToolCalls(_))) => {
                warn!("║ ⚠ Synthesis asked for tools; using assembled draft");
                return (draft.to_string(), false);
            }
            Ok(Err(e)) => {
                warn!("║ ⚠ Synthesis failed: {}; using assembled draft", e);
                return (draft.to_string(), false);
            }
            Err(_) => {
                warn!("║ ⚠ Synthesis timed out; using assembled draft");
                return (draft.to_string(), false);
            }
        };

        match accept_synthesis(&text, draft, emergency, language) {
            Ok(()) => {
                info!("║ ✓ Synthesis accepted ({} chars)", text.len());
                (text, true)
            }
            Err(e) => {
                warn!("║ ⚠ Synthesis rejected: {}; using assembled draft", e);
                (draft.to_string(), false)
            }
        }
    }
}

/// A rewrite must validate on its own, carry the draft's Sources block
/// verbatim, and keep the missing-perspective section and the disclaimer
/// whenever the draft has them.
fn accept_synthesis(text: &str, draft: &str, emergency: bool, language: Language) -> Result<(), AgentError> {
    assembly::validate_document(text, emergency, language)?;

    let block = |doc: &str| citations::sources_block_start(doc).map(|i| doc[i..].trim().to_string());
    if block(text) != block(draft) {
        return Err(AgentError::MalformedOutput("Sources block changed".into()));
    }

    let missing_header = format!("## {}", language.missing_title());
    let has_missing = |doc: &str| doc.lines().any(|l| l.trim_end() == missing_header);
    if has_missing(draft) && !has_missing(text) {
        return Err(AgentError::MalformedOutput("missing-perspective section dropped".into()));
    }

    let disclaimer = language.disclaimer();
    if draft.contains(disclaimer) && !text.contains(disclaimer) {
        return Err(AgentError::MalformedOutput("medical disclaimer dropped".into()));
    }
    Ok(())
}

async fn emit(events: Option<&mpsc::Sender<CoordinatorEvent>>, event: CoordinatorEvent) {
    if let Some(tx) = events {
        let _ = tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_must_keep_sources() {
        let draft = "# T\n\n[A](https://a.org) [1]\n\n### Sources\n\n- [1] A: https://a.org\n";
        assert!(accept_synthesis("# T2\n\nRewritten [A](https://a.org) [1]\n\n### Sources\n\n- [1] A: https://a.org", draft, false, Language::English).is_ok());
        assert!(accept_synthesis("# T2\n\nRewritten, no sources.", draft, false, Language::English).is_err());
        assert!(accept_synthesis("# T2\n\n[A](https://a.org) [1]\n\n### Sources\n\n- [1] A: https://b.org", draft, false, Language::English).is_err());
    }

    #[test]
    fn synthesis_must_keep_missing_section() {
        let en = Language::English;
        let draft = format!(
            "# T\n\n## Coaching Perspective\n\nSleep more.\n\n## {}\n\n{}\n",
            en.missing_title(),
            en.missing_line(SpecialistRole::Doctor, "timeout")
        );
        assert!(accept_synthesis(&draft, &draft, false, en).is_ok());
        assert!(accept_synthesis("# T\n\nSleep more, it helps.", &draft, false, en).is_err());

        let renamed = draft.replace(en.missing_title(), "What Was Left Out");
        assert!(accept_synthesis(&renamed, &draft, false, en).is_err());

        assert!(accept_synthesis("# T\n\nSleep more.", "# T\n\nSleep.", false, en).is_ok());
    }

    #[test]
    fn synthesis_must_keep_disclaimer() {
        let en = Language::English;
        let draft = format!("# T\n\n## Medical Perspective\n\nRest.\n\n{}\n", en.disclaimer());
        let kept = format!("# T\n\nRest for two days.\n\n{}\n", en.disclaimer());
        assert!(accept_synthesis(&kept, &draft, false, en).is_ok());
        assert!(accept_synthesis("# T\n\nRest for two days.", &draft, false, en).is_err());
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = CoordinatorEvent::Specialist { role: SpecialistRole::Coach, ok: true, error: None };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json, serde_json::json!({"type": "specialist", "role": "coach", "ok": true}));
    }
}
