//! Data transfer objects for HTTP message serialization.

use health_agents::{CoordinatorResponse, Language, RoutingDecision, SpecialistRole};
use health_core::Message;
use serde::{Deserialize, Serialize};

/// Conversation sent by the caller.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AgentInput {
    pub messages: Vec<Message>,
}

/// Body of `/health-agent/invoke` and `/health-agent/stream`.
#[derive(Debug, Deserialize)]
pub struct InvokeRequest {
    pub input: AgentInput,
}

/// Body of `/health-agent/batch`.
#[derive(Debug, Deserialize)]
pub struct BatchRequest {
    pub inputs: Vec<AgentInput>,
}

/// Run details reported alongside the answer.
#[derive(Debug, Clone, Serialize)]
pub struct RunMetadata {
    pub run_id: String,
    pub routing: RoutingDecision,
    pub degraded: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing: Vec<SpecialistRole>,
    pub sources: usize,
    pub synthesized: bool,
    /// Language code of the fixed notices, e.g. `"en"`.
    pub language: Language,
    pub elapsed_ms: u64,
}

/// The caller's messages with the assistant's reply appended.
#[derive(Debug, Clone, Serialize)]
pub struct AgentOutput {
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvokeResponse {
    pub output: AgentOutput,
    pub metadata: RunMetadata,
}

impl InvokeResponse {
    pub fn new(mut messages: Vec<Message>, response: CoordinatorResponse, run_id: String, elapsed_ms: u64) -> Self {
        let metadata = RunMetadata {
            run_id,
            routing: response.routing,
            degraded: response.degraded,
            missing: response.missing,
            sources: response.sources.len(),
            synthesized: response.synthesized,
            language: response.language,
            elapsed_ms,
        };
        messages.push(Message::assistant(response.content));
        Self { output: AgentOutput { messages }, metadata }
    }

    /// The assistant reply.
    pub fn answer(&self) -> &str {
        self.output.messages.last().map_or("", |m| m.content.as_str())
    }
}

/// One batch entry: an answer, or the error for that input.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchItem {
    Ok(InvokeResponse),
    Err { error: String },
}

#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub outputs: Vec<BatchItem>,
}
