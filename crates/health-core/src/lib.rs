//! Core domain types and error definitions for the health agent.
//!
//! This crate provides the fundamental types shared across the workspace:
//!
//! - [`AgentError`] — Error taxonomy for model, tool, and coordinator operations
//! - [`Message`] and [`MessageRole`] — Chat messages as they arrive over HTTP
//! - [`Task`] — A question plus its conversation history, immutable once issued
//! - [`Turn`] — Conversation entries exchanged with the language model
//! - [`ToolCall`], [`ToolSchema`] — Tool interaction types
//! - [`SourceRef`] — Reference metadata used for citation assembly
//! - [`ModelConfig`] — Language model endpoint configuration
//!
//! # Example
//!
//! ```rust
//! use health_core::{Message, Task};
//!
//! let task = Task::from_messages(&[
//!     Message::user("I slept badly this week."),
//!     Message::assistant("How many hours per night?"),
//!     Message::user("About five. Should I still train today?"),
//! ])
//! .unwrap();
//!
//! assert_eq!(task.question, "About five. Should I still train today?");
//! assert_eq!(task.history.len(), 2);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while answering a task.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Language model request failed.
    #[error("LLM request failed: {0}")]
    Llm(String),

    /// Failed to parse structured output (tool arguments, JSON bodies).
    #[error("Failed to parse structured output: {0}")]
    Parse(String),

    /// Search or model backend unreachable or rejected the request.
    #[error("External service error: {0}")]
    ExternalService(String),

    /// Output violates the structural contract (citations, sections).
    #[error("Malformed output: {0}")]
    MalformedOutput(String),

    /// A specialist kept calling tools past its step budget.
    #[error("Step limit of {0} exceeded without a final answer")]
    StepLimitExceeded(usize),

    /// An operation exceeded its time bound.
    #[error("Timed out after {secs}s: {what}")]
    Timeout { what: String, secs: u64 },

    /// The model asked for a tool the agent was not registered with.
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// The request itself is unusable.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Writing an audit artifact failed.
    #[error("Audit write failed: {0}")]
    Audit(String),

    /// Every dispatched specialist failed.
    #[error("All specialists failed: {0}")]
    SpecialistsFailed(String),

    /// The request was cancelled by the caller.
    #[error("Request cancelled")]
    Cancelled,
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Parse(err.to_string())
    }
}

impl AgentError {
    /// Creates a timeout error for the named operation.
    pub fn timeout(what: impl Into<String>, secs: u64) -> Self {
        Self::Timeout { what: what.into(), secs }
    }
}

/// Role of a message in a conversation.
///
/// Accepts the LangChain-style aliases `human` and `ai` on input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// Instructions supplied by the caller.
    System,
    /// Message from the user.
    #[serde(alias = "human")]
    User,
    /// Message from the assistant.
    #[serde(alias = "ai")]
    Assistant,
}

/// A single message in a conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender.
    pub role: MessageRole,
    /// The content of the message.
    pub content: String,
}

impl Message {
    /// Creates a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    /// Creates a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }

    /// Creates a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: MessageRole::System, content: content.into() }
    }
}

/// A natural-language request plus the conversation that preceded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// The latest user message.
    pub question: String,
    /// Every message before the question, in order.
    pub history: Vec<Message>,
}

impl Task {
    /// Creates a task with no prior history.
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), history: Vec::new() }
    }

    /// Builds a task from a chat transcript.
    ///
    /// The last user message becomes the question; everything before it is
    /// history. Messages after the last user message are ignored.
    pub fn from_messages(messages: &[Message]) -> Result<Self, AgentError> {
        let idx = messages
            .iter()
            .rposition(|m| m.role == MessageRole::User)
            .ok_or_else(|| AgentError::InvalidInput("no user message in request".into()))?;

        let question = messages[idx].content.trim();
        if question.is_empty() {
            return Err(AgentError::InvalidInput("user message is empty".into()));
        }

        Ok(Self {
            question: question.to_string(),
            history: messages[..idx].to_vec(),
        })
    }

    /// Returns at most `n` of the most recent history messages.
    pub fn recent_history(&self, n: usize) -> &[Message] {
        let start = self.history.len().saturating_sub(n);
        &self.history[start..]
    }

    /// Question and history joined into one lowercase haystack for keyword matching.
    pub fn searchable_text(&self) -> String {
        let mut text = self.question.to_lowercase();
        for msg in self.recent_history(2).iter().filter(|m| m.role == MessageRole::User) {
            text.push('\n');
            text.push_str(&msg.content.to_lowercase());
        }
        text
    }
}

// ============================================================================
// Tool Types
// ============================================================================

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call (used to match results).
    pub id: String,
    /// Name of the tool to execute.
    pub name: String,
    /// Arguments to pass to the tool (JSON object).
    pub arguments: serde_json::Value,
}

/// JSON schema describing a tool for function calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// One entry of the conversation exchanged with the language model.
#[derive(Debug, Clone, PartialEq)]
pub enum Turn {
    /// Text from the user side (the briefing, or earlier user messages).
    User(String),
    /// Assistant output; carries the tool calls it requested, if any.
    Assistant {
        content: Option<String>,
        tool_calls: Vec<ToolCall>,
    },
    /// Result of a tool call, matched by id.
    Tool { call_id: String, content: String },
}

impl Turn {
    /// Creates a user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Turn::User(content.into())
    }

    /// Creates an assistant turn holding only text.
    pub fn assistant(content: impl Into<String>) -> Self {
        Turn::Assistant { content: Some(content.into()), tool_calls: Vec::new() }
    }

    /// Creates an assistant turn that requested tool calls.
    pub fn tool_request(calls: Vec<ToolCall>) -> Self {
        Turn::Assistant { content: None, tool_calls: calls }
    }

    /// Creates a tool result turn.
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Turn::Tool { call_id: call_id.into(), content: content.into() }
    }
}

/// Title and URL of a document an agent consulted or cited.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub title: String,
    pub url: String,
}

impl SourceRef {
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self { title: title.into(), url: url.into() }
    }
}

/// Configuration for the language model endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// The model identifier (e.g., "gemini-2.0-flash", "gpt-4o").
    pub model: String,
    /// Optional API base URL for OpenAI-compatible endpoints.
    pub api_base: Option<String>,
    /// Credential sent as the bearer token.
    #[serde(skip_serializing)]
    pub api_key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_accept_langchain_aliases() {
        let msgs: Vec<Message> = serde_json::from_str(
            r#"[{"role":"human","content":"hi"},{"role":"ai","content":"hello"},{"role":"system","content":"s"}]"#,
        )
        .unwrap();
        assert_eq!(msgs[0].role, MessageRole::User);
        assert_eq!(msgs[1].role, MessageRole::Assistant);
        assert_eq!(msgs[2].role, MessageRole::System);
    }

    #[test]
    fn task_uses_last_user_message_as_question() {
        let task = Task::from_messages(&[
            Message::system("be brief"),
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("  second  "),
        ])
        .unwrap();
        assert_eq!(task.question, "second");
        assert_eq!(task.history.len(), 3);
    }

    #[test]
    fn task_requires_non_empty_user_message() {
        let err = Task::from_messages(&[Message::assistant("hello")]).unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));

        let err = Task::from_messages(&[Message::user("   ")]).unwrap_err();
        assert!(matches!(err, AgentError::InvalidInput(_)));
    }

    #[test]
    fn recent_history_is_bounded() {
        let history: Vec<Message> = (0..10).map(|i| Message::user(i.to_string())).collect();
        let task = Task { question: "q".into(), history };
        let recent = task.recent_history(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].content, "7");
    }
}
