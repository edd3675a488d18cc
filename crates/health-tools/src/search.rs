use std::time::Duration;

use async_trait::async_trait;
use health_core::SourceRef;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::{Tool, ToolError, ToolOutput};

pub const DEFAULT_MAX_RESULTS: u32 = 5;

/// Search vertical understood by the upstream service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    #[default]
    General,
    News,
    Finance,
}

/// Validated search arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
    #[serde(default)]
    pub topic: Topic,
    #[serde(default)]
    pub include_raw_content: bool,
}

fn default_max_results() -> u32 {
    DEFAULT_MAX_RESULTS
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            max_results: DEFAULT_MAX_RESULTS,
            topic: Topic::General,
            include_raw_content: false,
        }
    }

    /// Parses tool-call arguments, applying defaults and preconditions.
    pub fn from_args(args: serde_json::Value) -> Result<Self, ToolError> {
        let params: SearchParams =
            serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        params.validate()?;
        Ok(params)
    }

    fn validate(&self) -> Result<(), ToolError> {
        if self.query.trim().is_empty() {
            return Err(ToolError::InvalidArguments("'query' must not be empty".into()));
        }
        if self.max_results == 0 {
            return Err(ToolError::InvalidArguments("'max_results' must be positive".into()));
        }
        Ok(())
    }
}

/// One search hit, in upstream relevance order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_content: Option<String>,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: u32,
    topic: Topic,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Web search tool using the Tavily API.
///
/// No caching, filtering, or retries happen here; failures surface to the caller.
pub struct InternetSearchTool {
    api_key: String,
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl InternetSearchTool {
    /// Creates a search tool against `api_base` (e.g. `https://api.tavily.com`).
    pub fn new(api_key: impl Into<String>, api_base: &str, timeout: Duration) -> Result<Self, ToolError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key: api_key.into(),
            endpoint: format!("{}/search", api_base.trim_end_matches('/')),
            timeout,
            client,
        })
    }

    /// Runs a search and returns at most `max_results` hits in upstream order.
    pub async fn search(&self, params: &SearchParams) -> Result<Vec<SearchResult>, ToolError> {
        params.validate()?;

        let request = TavilyRequest {
            api_key: &self.api_key,
            query: params.query.trim(),
            max_results: params.max_results,
            topic: params.topic,
            include_raw_content: params.include_raw_content,
        };

        info!("Search: '{}' (max {}, {:?})", request.query, request.max_results, request.topic);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ToolError::Upstream { status, body });
        }

        let tavily_response: TavilyResponse = response.json().await.map_err(|e| {
            ToolError::ExecutionFailed(format!("Failed to parse Tavily response: {}", e))
        })?;

        let mut results = tavily_response.results;
        results.truncate(params.max_results as usize);
        debug!("Search returned {} results", results.len());

        Ok(results)
    }

    fn transport_error(&self, e: reqwest::Error) -> ToolError {
        if e.is_timeout() {
            return ToolError::Timeout(self.timeout.as_secs());
        }
        ToolError::NetworkError(e)
    }
}

#[async_trait]
impl Tool for InternetSearchTool {
    fn name(&self) -> &str {
        "internet_search"
    }

    fn description(&self) -> &str {
        "Run a web search. Returns relevant results with titles, URLs, and content snippets."
    }

    fn parameters(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5)",
                    "minimum": 1,
                    "default": DEFAULT_MAX_RESULTS
                },
                "topic": {
                    "type": "string",
                    "enum": ["general", "news", "finance"],
                    "default": "general"
                },
                "include_raw_content": {
                    "type": "boolean",
                    "description": "Include the full page content of each result",
                    "default": false
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: serde_json::Value) -> Result<ToolOutput, ToolError> {
        let params = SearchParams::from_args(args)?;
        let results = self.search(&params).await?;

        let sources = results
            .iter()
            .map(|r| SourceRef::new(r.title.clone(), r.url.clone()))
            .collect();

        Ok(ToolOutput {
            content: serde_json::to_string(&json!({ "results": results }))
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?,
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arguments_take_defaults() {
        let params = SearchParams::from_args(json!({"query": "zone 2 training"})).unwrap();
        assert_eq!(params, SearchParams::new("zone 2 training"));
    }

    #[test]
    fn arguments_are_validated() {
        assert!(SearchParams::from_args(json!({})).is_err());
        assert!(SearchParams::from_args(json!({"query": "  "})).is_err());
        assert!(SearchParams::from_args(json!({"query": "q", "max_results": 0})).is_err());
        assert!(SearchParams::from_args(json!({"query": "q", "topic": "sports"})).is_err());
    }

    #[test]
    fn topic_parses_lowercase() {
        let params = SearchParams::from_args(json!({"query": "q", "topic": "news"})).unwrap();
        assert_eq!(params.topic, Topic::News);
    }
}
