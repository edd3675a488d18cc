//! Scripted [`LanguageModel`] double for deterministic agent tests.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use health_core::{AgentError, ToolCall, ToolSchema, Turn};
use serde_json::Value;

use crate::{Generation, LanguageModel};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Step {
    /// Answer with this text.
    Final(String),
    /// Request these tool calls.
    Tools(Vec<ToolCall>),
    /// Fail as an unreachable backend would.
    Fail(String),
    /// Wait, then play the inner step.
    Delay(Duration, Box<Step>),
    /// Never answer.
    Stall,
}

impl Step {
    pub fn final_text(text: impl Into<String>) -> Self {
        Step::Final(text.into())
    }

    /// A single `internet_search` call with the given arguments.
    pub fn search(id: impl Into<String>, arguments: Value) -> Self {
        Step::Tools(vec![ToolCall { id: id.into(), name: "internet_search".into(), arguments }])
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Step::Fail(message.into())
    }

    pub fn delayed(delay: Duration, step: Step) -> Self {
        Step::Delay(delay, Box::new(step))
    }
}

/// A call the model received, kept for assertions.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub system_prompt: String,
    pub turns: Vec<Turn>,
    pub tool_names: Vec<String>,
}

type Observer = Arc<dyn Fn(&RecordedCall) + Send + Sync>;

struct Script {
    key: String,
    steps: Vec<Step>,
}

/// Replays scripted steps, choosing the script whose key appears in the system prompt.
///
/// Scripts are matched in registration order; an empty key matches any prompt.
/// When a matching script runs out of steps the model reports an error.
#[derive(Default)]
pub struct ScriptedModel {
    scripts: Mutex<Vec<Script>>,
    calls: Mutex<Vec<RecordedCall>>,
    observer: Option<Observer>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a script for system prompts containing `key`.
    pub fn on(self, key: impl Into<String>, steps: Vec<Step>) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.push(Script { key: key.into(), steps });
        }
        self
    }

    /// Calls `observer` synchronously at the start of every generation.
    pub fn with_observer(mut self, observer: impl Fn(&RecordedCall) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn next_step(&self, system_prompt: &str) -> Option<Step> {
        let mut scripts = self.scripts.lock().ok()?;
        let script = scripts
            .iter_mut()
            .find(|s| system_prompt.contains(&s.key) && !s.steps.is_empty())?;
        Some(script.steps.remove(0))
    }
}

async fn play(step: Step) -> Result<Generation, AgentError> {
    match step {
        Step::Final(text) => Ok(Generation::Final(text)),
        Step::Tools(calls) => Ok(Generation::ToolCalls(calls)),
        Step::Fail(message) => Err(AgentError::ExternalService(message)),
        Step::Delay(delay, inner) => {
            tokio::time::sleep(delay).await;
            Box::pin(play(*inner)).await
        }
        Step::Stall => {
            std::future::pending::<()>().await;
            Err(AgentError::Llm("stalled".into()))
        }
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        tools: &[ToolSchema],
    ) -> Result<Generation, AgentError> {
        let call = RecordedCall {
            system_prompt: system_prompt.to_string(),
            turns: turns.to_vec(),
            tool_names: tools.iter().map(|t| t.name.clone()).collect(),
        };
        if let Some(observer) = &self.observer {
            observer(&call);
        }
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }

        let step = self
            .next_step(system_prompt)
            .ok_or_else(|| AgentError::Llm("script exhausted".into()))?;
        play(step).await
    }
}
