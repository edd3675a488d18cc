//! OpenAI-compatible chat client with tool calling.
//!
//! Works with the OpenAI API and any compatible endpoint, including Gemini's
//! `/v1beta/openai` surface used by the default configuration.

use std::time::Instant;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolType, CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, FunctionCall, FunctionObject,
    },
    Client,
};
use async_trait::async_trait;
use health_core::{AgentError, ModelConfig, ToolCall, ToolSchema, Turn};
use tracing::{debug, info};

use crate::{Generation, LanguageModel};

/// Token usage and timing metrics from a model call.
#[derive(Debug, Clone, Default)]
pub struct LlmMetrics {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub elapsed_ms: u64,
}

/// Converts any error into an AgentError::ExternalService.
///
/// Transport, auth, and rate-limit failures all surface through here.
fn llm_err(e: impl ToString) -> AgentError {
    AgentError::ExternalService(e.to_string())
}

/// Converts a builder error into an AgentError::Llm.
fn build_err(e: impl ToString) -> AgentError {
    AgentError::Llm(e.to_string())
}

/// Client for OpenAI-compatible chat completion APIs.
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    default_model: String,
}

impl LlmClient {
    /// Creates a new client from model configuration.
    pub fn new(model: &ModelConfig) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(model.api_key.clone());
        if let Some(base) = &model.api_base {
            config = config.with_api_base(base.trim_end_matches('/'));
        }

        Self {
            client: Client::with_config(config),
            default_model: model.model.clone(),
        }
    }

    /// Translates the conversation into request messages, system prompt first.
    fn build_messages(
        system_prompt: &str,
        turns: &[Turn],
    ) -> Result<Vec<ChatCompletionRequestMessage>, AgentError> {
        let mut messages = Vec::with_capacity(turns.len() + 1);
        messages.push(ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_prompt)
                .build()
                .map_err(build_err)?,
        ));

        for turn in turns {
            messages.push(Self::turn_message(turn)?);
        }

        Ok(messages)
    }

    fn turn_message(turn: &Turn) -> Result<ChatCompletionRequestMessage, AgentError> {
        let message = match turn {
            Turn::User(content) => ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(content.as_str())
                    .build()
                    .map_err(build_err)?,
            ),
            Turn::Assistant { content, tool_calls } => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if let Some(text) = content {
                    args.content(text.as_str());
                }
                if !tool_calls.is_empty() {
                    args.tool_calls(tool_calls.iter().map(to_openai_call).collect::<Vec<_>>());
                }
                ChatCompletionRequestMessage::Assistant(args.build().map_err(build_err)?)
            }
            Turn::Tool { call_id, content } => ChatCompletionRequestMessage::Tool(
                ChatCompletionRequestToolMessageArgs::default()
                    .tool_call_id(call_id.as_str())
                    .content(content.as_str())
                    .build()
                    .map_err(build_err)?,
            ),
        };
        Ok(message)
    }
}

fn to_openai_call(call: &ToolCall) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.to_string(),
        },
    }
}

fn to_openai_tool(schema: &ToolSchema) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: schema.name.clone(),
            description: Some(schema.description.clone()),
            parameters: Some(schema.parameters.clone()),
            strict: None,
        },
    }
}

/// Extracts either tool calls or final content from a completion response.
fn extract_generation(
    response: CreateChatCompletionResponse,
    elapsed_ms: u64,
) -> Result<(Generation, LlmMetrics), AgentError> {
    let (input_tokens, output_tokens) = response
        .usage
        .as_ref()
        .map(|u| (u.prompt_tokens, u.completion_tokens))
        .unwrap_or((0, 0));

    info!(
        "LLM: {}ms, tokens: {}/{} (in/out)",
        elapsed_ms, input_tokens, output_tokens
    );

    let metrics = LlmMetrics { input_tokens, output_tokens, elapsed_ms };

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::Llm("No response choices".into()))?;

    if let Some(tool_calls) = choice.message.tool_calls.filter(|c| !c.is_empty()) {
        let calls = tool_calls
            .into_iter()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments).map_err(|e| {
                    AgentError::Parse(format!(
                        "arguments for '{}': {} - raw: {}",
                        tc.function.name, e, tc.function.arguments
                    ))
                })?;
                Ok(ToolCall { id: tc.id, name: tc.function.name, arguments })
            })
            .collect::<Result<Vec<_>, AgentError>>()?;
        return Ok((Generation::ToolCalls(calls), metrics));
    }

    let content = choice
        .message
        .content
        .filter(|c| !c.trim().is_empty())
        .ok_or_else(|| AgentError::Llm("No response content".into()))?;

    Ok((Generation::Final(content), metrics))
}

#[async_trait]
impl LanguageModel for LlmClient {
    fn name(&self) -> &str {
        &self.default_model
    }

    async fn generate(
        &self,
        system_prompt: &str,
        turns: &[Turn],
        tools: &[ToolSchema],
    ) -> Result<Generation, AgentError> {
        let start = Instant::now();
        let messages = Self::build_messages(system_prompt, turns)?;

        let mut request_builder = CreateChatCompletionRequestArgs::default();
        request_builder.model(&self.default_model).messages(messages);

        if !tools.is_empty() {
            request_builder.tools(tools.iter().map(to_openai_tool).collect::<Vec<_>>());
        }

        let request = request_builder.build().map_err(build_err)?;
        let response = self.client.chat().create(request).await.map_err(llm_err)?;
        let (generation, metrics) = extract_generation(response, start.elapsed().as_millis() as u64)?;

        debug!(
            "Generation: {} ({} ms)",
            match &generation {
                Generation::Final(text) => format!("final, {} chars", text.len()),
                Generation::ToolCalls(calls) => format!("{} tool call(s)", calls.len()),
            },
            metrics.elapsed_ms
        );

        Ok(generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(message: serde_json::Value) -> CreateChatCompletionResponse {
        serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 0,
            "model": "gemini-2.0-flash",
            "choices": [{ "index": 0, "message": message, "finish_reason": "stop" }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        }))
        .unwrap()
    }

    #[test]
    fn extracts_final_content() {
        let (generation, metrics) =
            extract_generation(response(json!({"role": "assistant", "content": "Rest today."})), 7).unwrap();
        assert_eq!(generation, Generation::Final("Rest today.".into()));
        assert_eq!(metrics.input_tokens, 10);
        assert_eq!(metrics.elapsed_ms, 7);
    }

    #[test]
    fn extracts_tool_calls_with_parsed_arguments() {
        let message = json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": { "name": "internet_search", "arguments": "{\"query\":\"sleep hygiene\"}" }
            }]
        });
        let (generation, _) = extract_generation(response(message), 1).unwrap();
        let Generation::ToolCalls(calls) = generation else { panic!("expected tool calls") };
        assert_eq!(calls[0].name, "internet_search");
        assert_eq!(calls[0].arguments["query"], "sleep hygiene");
    }

    #[test]
    fn malformed_arguments_are_parse_errors() {
        let message = json!({
            "role": "assistant",
            "tool_calls": [{
                "id": "call_1",
                "type": "function",
                "function": { "name": "internet_search", "arguments": "{not json" }
            }]
        });
        let err = extract_generation(response(message), 1).unwrap_err();
        assert!(matches!(err, AgentError::Parse(_)));
    }

    #[test]
    fn empty_content_is_an_error() {
        let err = extract_generation(response(json!({"role": "assistant", "content": "  "})), 1).unwrap_err();
        assert!(matches!(err, AgentError::Llm(_)));
    }

    #[test]
    fn conversation_keeps_system_prompt_first_and_tool_ids() {
        let turns = vec![
            Turn::user("question"),
            Turn::tool_request(vec![ToolCall {
                id: "call_9".into(),
                name: "internet_search".into(),
                arguments: json!({"query": "q"}),
            }]),
            Turn::tool_result("call_9", "[]"),
        ];
        let messages = LlmClient::build_messages("system", &turns).unwrap();
        assert_eq!(messages.len(), 4);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        let ChatCompletionRequestMessage::Assistant(assistant) = &messages[2] else {
            panic!("expected assistant message")
        };
        assert_eq!(assistant.tool_calls.as_ref().unwrap()[0].id, "call_9");
        let ChatCompletionRequestMessage::Tool(tool) = &messages[3] else { panic!("expected tool message") };
        assert_eq!(tool.tool_call_id, "call_9");
    }
}
