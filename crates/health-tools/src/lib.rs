//! Tool registry and the internet search tool.
//!
//! This crate provides the tool abstraction for model function calling:
//!
//! - [`Tool`] — Trait for implementing tools
//! - [`ToolOutput`] — Text for the model plus source metadata for citations
//! - [`ToolRegistry`] — Registry for managing available tools
//! - [`InternetSearchTool`] — Web search backed by the Tavily API
//!
//! # Implementing a Custom Tool
//!
//! ```rust,ignore
//! use health_tools::{Tool, ToolError, ToolOutput};
//! use async_trait::async_trait;
//!
//! struct HeartRateZonesTool;
//!
//! #[async_trait]
//! impl Tool for HeartRateZonesTool {
//!     fn name(&self) -> &str { "heart_rate_zones" }
//!     fn description(&self) -> &str { "Computes training zones from age" }
//!     fn parameters(&self) -> serde_json::Value {
//!         serde_json::json!({
//!             "type": "object",
//!             "properties": { "age": { "type": "integer" } },
//!             "required": ["age"]
//!         })
//!     }
//!     async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
//!         Ok(ToolOutput::text("zone 2: 114-133 bpm"))
//!     }
//! }
//! ```

mod search;

pub use search::{InternetSearchTool, SearchParams, SearchResult, Topic};

use async_trait::async_trait;
use health_core::{AgentError, SourceRef};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

pub use health_core::{ToolCall, ToolSchema};

/// Errors that can occur during tool execution.
#[derive(Error, Debug)]
pub enum ToolError {
    /// Tool execution failed with a message.
    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    /// Invalid arguments were passed to the tool.
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Network request failed.
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The upstream service answered with a non-success status.
    #[error("Upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The upstream call did not finish in time.
    #[error("Tool timed out after {0}s")]
    Timeout(u64),

    /// Requested tool was not found in the registry.
    #[error("Tool not found: {0}")]
    NotFound(String),
}

impl From<ToolError> for AgentError {
    fn from(err: ToolError) -> Self {
        match err {
            ToolError::NotFound(name) => AgentError::ToolNotFound(name),
            ToolError::InvalidArguments(msg) => AgentError::InvalidInput(msg),
            ToolError::Timeout(secs) => AgentError::timeout("tool call", secs),
            other => AgentError::ExternalService(other.to_string()),
        }
    }
}

/// What a tool hands back: text for the model, and the documents it drew on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolOutput {
    pub content: String,
    pub sources: Vec<SourceRef>,
}

impl ToolOutput {
    /// Output with no source metadata.
    pub fn text(content: impl Into<String>) -> Self {
        Self { content: content.into(), sources: Vec::new() }
    }
}

/// Trait for implementing tools that can be called by models.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the unique name of this tool.
    fn name(&self) -> &str;

    /// Returns a description of what this tool does.
    fn description(&self) -> &str;

    /// Returns the JSON Schema for this tool's parameters.
    fn parameters(&self) -> serde_json::Value;

    /// Executes the tool with the given arguments.
    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError>;

    /// Generates the schema for this tool (default implementation).
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters(),
        }
    }
}

/// Registry of tools available to agents.
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    /// Creates an empty tool registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Registers a tool in the registry.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.tools.insert(tool.name().to_string(), Arc::new(tool));
    }

    /// Gets a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Gets a tool by name, or a `NotFound` error.
    pub fn require(&self, name: &str) -> Result<Arc<dyn Tool>, ToolError> {
        self.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Returns the number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns true if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes its input"
        }
        fn parameters(&self) -> serde_json::Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
            Ok(ToolOutput::text(args.to_string()))
        }
    }

    #[test]
    fn registry_lookup() {
        let mut registry = ToolRegistry::new();
        assert!(registry.is_empty());
        registry.register(Echo);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.require("echo").unwrap().schema().name, "echo");
        assert!(matches!(registry.require("nope"), Err(ToolError::NotFound(_))));
    }

    #[test]
    fn tool_errors_map_into_agent_taxonomy() {
        let err: AgentError = ToolError::Upstream { status: 429, body: "slow down".into() }.into();
        assert!(matches!(err, AgentError::ExternalService(ref m) if m.contains("429")));

        let err: AgentError = ToolError::Timeout(20).into();
        assert!(matches!(err, AgentError::Timeout { secs: 20, .. }));
    }
}
