//! OpenAI-compatible provider implementation.
//!
//! Works with Ollama (`/v1`), vLLM, llama.cpp server, OpenAI and any other
//! endpoint exposing `/chat/completions`.
//!
//! Supports:
//! - Chat completions (non-streaming and streaming SSE)
//! - Tool use / function calling
//! - Health checks

use actloop_config::ProviderConfig;
use actloop_core::error::ProviderError;
use actloop_core::message::{Message, MessageToolCall, Role};
use actloop_core::provider::*;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};

use crate::sse::SseDecoder;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }

    /// Create an Ollama provider (convenience constructor).
    pub fn ollama(base_url: Option<&str>) -> Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            None,
            Duration::from_secs(120),
        )
    }

    /// Build from the `[provider]` config section.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        Self::new(
            config.name.clone(),
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    fn post(&self, url: &str) -> reqwest::RequestBuilder {
        let builder = self.client.post(url).header("Content-Type", "application/json");
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {key}")),
            None => builder,
        }
    }

    /// Build the JSON body shared by both request modes.
    fn request_body(request: &ProviderRequest, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": stream,
        });

        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        body
    }

    /// Map non-success statuses to provider errors.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
        let status = response.status().as_u16();
        match status {
            200..=299 => Ok(response),
            401 | 403 => Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            )),
            404 => {
                let body = response.text().await.unwrap_or_default();
                Err(ProviderError::ModelNotFound(body))
            }
            _ => {
                let error_body = response.text().await.unwrap_or_default();
                warn!(status, body = %error_body, "Provider returned error");
                Err(ProviderError::ApiError {
                    status_code: status,
                    message: error_body,
                })
            }
        }
    }

    /// Convert our Message types to OpenAI API format.
    ///
    /// A tool result is only sent with role `tool` when an earlier assistant
    /// message declared its call id. Results of text directives have no
    /// such declaration and go out as user-role observations instead.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        let mut declared: HashSet<&str> = HashSet::new();
        let mut api_messages = Vec::with_capacity(messages.len());

        for m in messages {
            declared.extend(m.tool_calls.iter().map(|tc| tc.id.as_str()));

            if m.role == Role::Tool {
                let matched = m
                    .tool_call_id
                    .as_deref()
                    .is_some_and(|id| declared.contains(id));
                if !matched {
                    let tool = m.tool_name.as_deref().unwrap_or("tool");
                    api_messages.push(ApiMessage {
                        role: "user".into(),
                        content: Some(format!("Observation from {tool}: {}", m.content)),
                        tool_calls: None,
                        tool_call_id: None,
                        name: None,
                    });
                    continue;
                }
            }

            api_messages.push(ApiMessage {
                role: match m.role {
                    Role::User => "user".into(),
                    Role::Assistant => "assistant".into(),
                    Role::System => "system".into(),
                    Role::Tool => "tool".into(),
                },
                content: Some(m.content.clone()),
                tool_calls: if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                },
                tool_call_id: m.tool_call_id.clone(),
                name: m.tool_name.clone(),
            });
        }

        api_messages
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }
}

#[async_trait]
impl actloop_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, false);

        debug!(provider = %self.name, model = %request.model, "Sending completion request");

        let response = self
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let api_response: ApiResponse =
            response.json().await.map_err(|e| ProviderError::ApiError {
                status_code: 200,
                message: format!("Failed to parse response: {e}"),
            })?;

        let choice =
            api_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                })?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let content = choice.message.content.unwrap_or_default();
        let message = Message::assistant_with_calls(content, tool_calls);

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model,
        })
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let mut builder = self.client.get(&url);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        let response = builder
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }

    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ChunkReceiver, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::request_body(&request, true);

        debug!(provider = %self.name, model = %request.model, "Sending streaming request");

        let response = self
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        let response = Self::check_status(response).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);

        // Read the SSE byte stream and forward decoded chunks
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut decoder = SseDecoder::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for chunk in decoder.feed(&bytes) {
                    if tx.send(Ok(chunk)).await.is_err() {
                        return; // receiver dropped
                    }
                }

                if decoder.is_finished() {
                    return;
                }
            }

            // Stream ended without [DONE], send final chunk
            let _ = tx.send(Ok(decoder.finish())).await;
        });

        Ok(rx)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    model: String,
    choices: Vec<ApiChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use actloop_core::Provider;

    #[test]
    fn ollama_constructor() {
        let provider = OpenAiCompatProvider::ollama(None).unwrap();
        assert_eq!(provider.name(), "ollama");
        assert!(provider.base_url.contains("localhost:11434"));
        assert!(provider.api_key.is_none());
    }

    #[test]
    fn from_config_trims_trailing_slash() {
        let config = ProviderConfig {
            base_url: "http://gpu-box:11434/v1/".into(),
            ..ProviderConfig::default()
        };
        let provider = OpenAiCompatProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "http://gpu-box:11434/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are precise"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_tool_response() {
        let messages = vec![
            Message::user("What is 5 plus 3?"),
            Message::assistant_with_calls(
                "",
                vec![MessageToolCall {
                    id: "call_1".into(),
                    name: "add".into(),
                    arguments: r#"{"x":5,"y":3}"#.into(),
                }],
            ),
            Message::tool_result("add", "call_1", "8"),
        ];
        let api_msgs = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_msgs[2].role, "tool");
        assert_eq!(api_msgs[2].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(api_msgs[2].name.as_deref(), Some("add"));
    }

    #[test]
    fn text_directive_result_is_sent_as_observation() {
        let messages = vec![
            Message::user("What is 5 plus 3?"),
            Message::assistant("Action: add\nAction Input: {\"x\": 5, \"y\": 3}"),
            Message::tool_result("add", "call_abc", "8"),
        ];
        let api_msgs = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_msgs.len(), 3);
        assert_eq!(api_msgs[1].role, "assistant");
        assert!(api_msgs[1].tool_calls.is_none());
        assert_eq!(api_msgs[2].role, "user");
        assert_eq!(api_msgs[2].content.as_deref(), Some("Observation from add: 8"));
        assert!(api_msgs[2].tool_call_id.is_none());
        assert!(api_msgs[2].name.is_none());

        let json = serde_json::to_string(&api_msgs).unwrap();
        assert!(!json.contains(r#""role":"tool""#));
        assert!(!json.contains("call_abc"));
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let msg = Message::assistant_with_calls(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "search_orders".into(),
                arguments: r#"{"query":"ORD12345"}"#.into(),
            }],
        );
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc.len(), 1);
        assert_eq!(tc[0].function.name, "search_orders");
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![ToolDefinition {
            name: "add".into(),
            description: "Add two integers".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let api_tools = OpenAiCompatProvider::to_api_tools(&tools);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].function.name, "add");
        assert_eq!(api_tools[0].r#type, "function");
    }

    #[test]
    fn streaming_body_requests_usage() {
        let request = ProviderRequest {
            model: "llama3.2".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.0,
            max_tokens: Some(256),
            tools: vec![],
            stop: vec![],
        };
        let body = OpenAiCompatProvider::request_body(&request, true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["stream_options"]["include_usage"], true);
        assert_eq!(body["max_tokens"], 256);
        assert!(body.get("tools").is_none());

        let body = OpenAiCompatProvider::request_body(&request, false);
        assert!(body.get("stream_options").is_none());
    }

    #[test]
    fn parse_completion_response() {
        let data = r#"{
            "model": "llama3.2",
            "choices": [{"message": {"role": "assistant", "content": "Action: add"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Action: add"));
        assert_eq!(parsed.usage.unwrap().total_tokens, 5);
    }

    #[tokio::test]
    async fn unreachable_service_is_a_network_error() {
        let provider = OpenAiCompatProvider::new(
            "dead",
            "http://127.0.0.1:1/v1",
            None,
            Duration::from_secs(2),
        )
        .unwrap();
        let request = ProviderRequest {
            model: "m".into(),
            messages: vec![Message::user("hi")],
            temperature: 0.0,
            max_tokens: None,
            tools: vec![],
            stop: vec![],
        };
        let err = provider.stream(request).await.unwrap_err();
        assert!(matches!(err, ProviderError::Network(_)));
    }
}
