//! Language model contract and the OpenAI-compatible implementation.
//!
//! The rest of the workspace treats the model as an opaque capability:
//!
//! - [`LanguageModel`] — `generate(system_prompt, turns, tools)`
//! - [`Generation`] — either tool calls to run or a final message
//! - [`LlmClient`] — OpenAI-compatible endpoint (OpenAI, Gemini, local servers)
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use health_core::{ModelConfig, Turn};
//! use health_llm::{Generation, LanguageModel, LlmClient};
//!
//! let client = LlmClient::new(&ModelConfig {
//!     model: "gemini-2.0-flash".into(),
//!     api_base: Some("https://generativelanguage.googleapis.com/v1beta/openai".into()),
//!     api_key: std::env::var("GOOGLE_API_KEY")?,
//! });
//!
//! match client.generate("You are helpful.", &[Turn::user("Hi")], &[]).await? {
//!     Generation::Final(text) => println!("{text}"),
//!     Generation::ToolCalls(calls) => println!("{} calls", calls.len()),
//! }
//! ```

mod client;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

use async_trait::async_trait;
use health_core::{AgentError, ToolCall, ToolSchema, Turn};

pub use client::{LlmClient, LlmMetrics};

/// What the model produced for one step of a conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Generation {
    /// The model wants these tools run before it continues.
    ToolCalls(Vec<ToolCall>),
    /// The model's answer; terminal for the conversation.
    Final(String),
}

/// A chat model that can optionally request tool calls.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &str;

    /// Runs one step of the conversation.
    async fn generate(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        tools: &[ToolSchema],
    ) -> Result<Generation, AgentError>;
}
