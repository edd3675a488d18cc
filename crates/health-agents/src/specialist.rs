//! Specialist definitions and the bounded think/act loop that runs them.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use health_core::{AgentError, MessageRole, SourceRef, Task, ToolCall, ToolSchema, Turn};
use health_llm::{Generation, LanguageModel};
use health_tools::{Tool, ToolRegistry};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::citations;
use crate::prompts;

/// History messages included in a briefing.
pub const BRIEFING_HISTORY: usize = 6;

/// The closed set of specialists a coordinator can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecialistRole {
    Doctor,
    Coach,
}

impl SpecialistRole {
    pub const ALL: [SpecialistRole; 2] = [SpecialistRole::Doctor, SpecialistRole::Coach];

    /// Registered agent name.
    pub fn name(&self) -> &'static str {
        match self {
            SpecialistRole::Doctor => "doctor-agent",
            SpecialistRole::Coach => "coach-agent",
        }
    }

    fn description(&self) -> &'static str {
        match self {
            SpecialistRole::Doctor => prompts::DOCTOR_DESCRIPTION,
            SpecialistRole::Coach => prompts::COACH_DESCRIPTION,
        }
    }

    fn system_prompt(&self) -> &'static str {
        match self {
            SpecialistRole::Doctor => prompts::DOCTOR_PROMPT,
            SpecialistRole::Coach => prompts::COACH_PROMPT,
        }
    }
}

impl fmt::Display for SpecialistRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Static description of a specialist: who it is and what it may call.
#[derive(Clone)]
pub struct AgentDefinition {
    pub name: String,
    /// Routing hint.
    pub description: String,
    pub system_prompt: String,
    pub tools: Vec<Arc<dyn Tool>>,
}

impl AgentDefinition {
    /// Builds the stock definition for `role`, taking `tool_names` from the registry.
    pub fn for_role(
        role: SpecialistRole,
        registry: &ToolRegistry,
        tool_names: &[&str],
    ) -> Result<Self, AgentError> {
        let tools = tool_names
            .iter()
            .map(|name| registry.require(name).map_err(AgentError::from))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: role.name().to_string(),
            description: role.description().to_string(),
            system_prompt: role.system_prompt().to_string(),
            tools,
        })
    }

    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }
}

impl fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("name", &self.name)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .finish()
    }
}

/// What a specialist hands back to the coordinator.
///
/// Only `final_text` is shown to the caller; `consulted` feeds citation assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecialistReport {
    pub role: SpecialistRole,
    pub final_text: String,
    /// Sources returned by every tool call, in call order.
    pub consulted: Vec<SourceRef>,
    pub steps: usize,
    pub tool_calls: usize,
}

/// Findings from an earlier specialist, shared in sequential dispatch.
#[derive(Debug, Clone, Copy)]
pub struct PriorFindings<'a> {
    pub role: SpecialistRole,
    pub text: &'a str,
}

enum LoopState {
    Thinking,
    Acting(Vec<ToolCall>),
    Finished(String),
}

/// A specialist bound to a model and step limits.
pub struct Specialist {
    role: SpecialistRole,
    definition: AgentDefinition,
    model: Arc<dyn LanguageModel>,
    max_steps: usize,
    step_timeout: Duration,
}

impl Specialist {
    pub fn new(
        role: SpecialistRole,
        definition: AgentDefinition,
        model: Arc<dyn LanguageModel>,
        max_steps: usize,
        step_timeout: Duration,
    ) -> Self {
        Self { role, definition, model, max_steps, step_timeout }
    }

    pub fn role(&self) -> SpecialistRole {
        self.role
    }

    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    /// Runs the think/act loop until the model answers without tool calls.
    ///
    /// Tool failures are reported back to the model as text; the run only fails
    /// on model errors, a step timeout, or exceeding `max_steps` model calls.
    pub async fn run(
        &self,
        task: &Task,
        prior: Option<PriorFindings<'_>>,
    ) -> Result<SpecialistReport, AgentError> {
        let start = Instant::now();
        let schemas = self.definition.schemas();
        let mut turns = vec![Turn::user(briefing(task, prior))];
        let mut consulted = Vec::new();
        let mut steps = 0;
        let mut tool_calls = 0;
        let mut state = LoopState::Thinking;

        info!("╠──────────────────────────────────────────────────────────────");
        info!("║ SPECIALIST: {} ({} tools, max {} steps)", self.definition.name, schemas.len(), self.max_steps);

        loop {
            state = match state {
                LoopState::Thinking => {
                    if steps == self.max_steps {
                        warn!("║     ⚠ {} hit the step limit ({})", self.definition.name, self.max_steps);
                        return Err(AgentError::StepLimitExceeded(self.max_steps));
                    }
                    steps += 1;
                    match self.think(steps, &turns, &schemas).await? {
                        Generation::Final(text) => LoopState::Finished(text),
                        Generation::ToolCalls(calls) => LoopState::Acting(calls),
                    }
                }
                LoopState::Acting(calls) => {
                    info!(
                        "║     [{}] ← Tool calls: {:?}",
                        steps,
                        calls.iter().map(|c| &c.name).collect::<Vec<_>>()
                    );
                    turns.push(Turn::tool_request(calls.clone()));
                    for call in &calls {
                        tool_calls += 1;
                        let content = self.act(call, &mut consulted).await;
                        turns.push(Turn::tool_result(&call.id, content));
                    }
                    LoopState::Thinking
                }
                LoopState::Finished(text) => {
                    info!(
                        "║     ✓ {} finished in {:?}: {} chars after {} steps",
                        self.definition.name,
                        start.elapsed(),
                        text.len(),
                        steps
                    );
                    let final_text = attach_further_reading(text, &consulted, tool_calls);
                    return Ok(SpecialistReport {
                        role: self.role,
                        final_text,
                        consulted,
                        steps,
                        tool_calls,
                    });
                }
            };
        }
    }

    async fn think(
        &self,
        step: usize,
        turns: &[Turn],
        schemas: &[ToolSchema],
    ) -> Result<Generation, AgentError> {
        debug!("║     [{}] → {} thinking ({} turns)", step, self.definition.name, turns.len());
        let generation = self
            .model
            .generate(&self.definition.system_prompt, turns, schemas);

        tokio::time::timeout(self.step_timeout, generation)
            .await
            .map_err(|_| {
                AgentError::timeout(
                    format!("{} step {}", self.definition.name, step),
                    self.step_timeout.as_secs(),
                )
            })?
    }

    /// Executes one tool call; the returned text is what the model sees.
    async fn act(&self, call: &ToolCall, consulted: &mut Vec<SourceRef>) -> String {
        let Some(tool) = self.definition.tool(&call.name) else {
            warn!("║       ⚠ {} asked for unregistered tool '{}'", self.definition.name, call.name);
            return format!("Error: {}", AgentError::ToolNotFound(call.name.clone()));
        };

        info!("║       → Executing tool: {}", call.name);
        match tool.execute(call.arguments.clone()).await {
            Ok(output) => {
                info!(
                    "║       ← Tool result: {} chars, {} sources",
                    output.content.len(),
                    output.sources.len()
                );
                consulted.extend(output.sources);
                output.content
            }
            Err(e) => {
                warn!("║       ⚠ Tool '{}' failed: {}", call.name, e);
                format!("Error: {}. Continue without this result.", e)
            }
        }
    }
}

/// The opening user turn for a specialist.
fn briefing(task: &Task, prior: Option<PriorFindings<'_>>) -> String {
    let mut text = format!("## Question\n\n{}\n", task.question);

    let history = task.recent_history(BRIEFING_HISTORY);
    if !history.is_empty() {
        text.push_str("\n## Conversation so far\n\n");
        for msg in history {
            let speaker = match msg.role {
                MessageRole::User => "User",
                MessageRole::Assistant => "Assistant",
                MessageRole::System => "System",
            };
            text.push_str(&format!("{}: {}\n", speaker, msg.content));
        }
    }

    if let Some(prior) = prior {
        text.push_str(&format!(
            "\n## Findings from the {}\n\n{}\n",
            prior.role.name(),
            prior.text
        ));
    }

    text.push('\n');
    text.push_str(prompts::LANGUAGE_INSTRUCTION);
    text
}

/// Lists consulted results when a specialist searched but linked nothing.
fn attach_further_reading(text: String, consulted: &[SourceRef], tool_calls: usize) -> String {
    if tool_calls == 0 || !citations::extract_links(&text).is_empty() {
        return text;
    }
    match citations::further_reading(consulted) {
        Some(line) => format!("{}\n\n{}", text.trim_end(), line),
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use health_core::Message;

    #[test]
    fn role_names_are_stable() {
        assert_eq!(SpecialistRole::Doctor.name(), "doctor-agent");
        assert_eq!(SpecialistRole::Coach.to_string(), "coach-agent");
        assert!(SpecialistRole::Doctor.system_prompt().contains("doctor-agent"));
    }

    #[test]
    fn briefing_carries_history_findings_and_language() {
        let task = Task {
            question: "Should I train today?".into(),
            history: vec![Message::user("I slept 4 hours"), Message::assistant("Noted.")],
        };
        let text = briefing(
            &task,
            Some(PriorFindings { role: SpecialistRole::Doctor, text: "Recovery is lagging." }),
        );
        assert!(text.starts_with("## Question\n\nShould I train today?"));
        assert!(text.contains("User: I slept 4 hours"));
        assert!(text.contains("Findings from the doctor-agent"));
        assert!(text.ends_with(prompts::LANGUAGE_INSTRUCTION));
    }

    #[test]
    fn further_reading_only_when_nothing_cited() {
        let consulted = vec![SourceRef::new("Sleep", "https://sleep.org")];

        let plain = attach_further_reading("Sleep more.".into(), &consulted, 1);
        assert!(plain.ends_with("Further reading: [Sleep](https://sleep.org)"));

        let cited = attach_further_reading("See [CDC](https://cdc.gov).".into(), &consulted, 1);
        assert!(!cited.contains("Further reading"));

        let no_search = attach_further_reading("Sleep more.".into(), &[], 0);
        assert_eq!(no_search, "Sleep more.");
    }
}
