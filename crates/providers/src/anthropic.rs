//! Anthropic Messages API adapter.
//!
//! Translates between the runtime's internal types and Anthropic's wire
//! format, including the Anthropic-specific structure where system
//! messages go in a separate top-level `system` field rather than in the
//! `messages` array. Streaming responses are translated chunk-for-chunk
//! into [`ProviderChunk`] with no buffering — assembling `input_json_delta`
//! fragments into parsed tool-call arguments is the Stream Parser's job,
//! not this adapter's.

use crate::traits::{ChatRequest, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use review_domain::config::LlmConfig;
use review_domain::error::{Error, Result};
use review_domain::stream::{BlockDelta, BlockStart, BoxStream, ProviderChunk, Usage};
use review_domain::tool::{ContentPart, Message, MessageContent, Role, ToolDefinition};
use serde_json::Value;

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.api_key_env)?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.request_timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "anthropic".to_string(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model: cfg.default_model.clone(),
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
    }

    fn build_messages_body(&self, req: &ChatRequest) -> Value {
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        // Filter out internal system-role messages; pass them separately.
        let mut system_parts: Vec<String> = Vec::new();
        let mut api_messages: Vec<Value> = Vec::new();

        for msg in &req.messages {
            match msg.role {
                Role::System => system_parts.push(msg.content.extract_all_text()),
                Role::User => api_messages.push(user_msg_to_anthropic(msg)),
                Role::Assistant => api_messages.push(assistant_msg_to_anthropic(msg)),
            }
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": api_messages,
            "stream": true,
        });

        if !system_parts.is_empty() {
            body["system"] = Value::String(system_parts.join("\n\n"));
        }

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_anthropic).collect();
            body["tools"] = Value::Array(tools);
        }

        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        body["max_tokens"] = serde_json::json!(req.max_tokens.unwrap_or(4096));

        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn user_msg_to_anthropic(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Text(t) => serde_json::json!({"role": "user", "content": t}),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(serde_json::json!({
                        "type": "text",
                        "text": text,
                    })),
                    ContentPart::ToolResult {
                        tool_use_id,
                        content,
                        is_error,
                    } => Some(serde_json::json!({
                        "type": "tool_result",
                        "tool_use_id": tool_use_id,
                        "content": content,
                        "is_error": is_error,
                    })),
                    ContentPart::ToolUse { .. } => None,
                })
                .collect();
            serde_json::json!({"role": "user", "content": content})
        }
    }
}

fn assistant_msg_to_anthropic(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Text(t) => serde_json::json!({
            "role": "assistant",
            "content": [{"type": "text", "text": t}],
        }),
        MessageContent::Parts(parts) => {
            let content: Vec<Value> = parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(serde_json::json!({
                        "type": "text",
                        "text": text,
                    })),
                    ContentPart::ToolUse { id, name, input } => Some(serde_json::json!({
                        "type": "tool_use",
                        "id": id,
                        "name": name,
                        "input": input,
                    })),
                    ContentPart::ToolResult { .. } => None,
                })
                .collect();
            serde_json::json!({"role": "assistant", "content": content})
        }
    }
}

fn tool_to_anthropic(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "name": tool.name,
        "description": tool.description,
        "input_schema": tool.parameters,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Streaming: translate Anthropic SSE events 1:1 onto ProviderChunk
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Usage accumulates across `message_start` and `message_delta`; nothing
/// else needs to be carried between SSE payloads at this layer.
#[derive(Default)]
struct StreamState {
    usage: Option<Usage>,
}

fn parse_anthropic_sse(data: &str, state: &mut StreamState) -> Vec<Result<ProviderChunk>> {
    let mut chunks = Vec::new();

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            chunks.push(Err(Error::Json(e)));
            return chunks;
        }
    };

    let event_type = v.get("type").and_then(|v| v.as_str()).unwrap_or("");

    match event_type {
        "message_start" => {
            let message_id = v
                .get("message")
                .and_then(|m| m.get("id"))
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            state.usage = v
                .get("message")
                .and_then(|m| m.get("usage"))
                .and_then(parse_anthropic_usage);
            chunks.push(Ok(ProviderChunk::MessageStart { message_id }));
        }

        "content_block_start" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some(block) = v.get("content_block") {
                let block_type = block.get("type").and_then(|v| v.as_str()).unwrap_or("");
                let start = match block_type {
                    "tool_use" => {
                        let id = block
                            .get("id")
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string();
                        let name = block
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or("")
                            .to_string();
                        Some(BlockStart::ToolUse { id, name })
                    }
                    "text" => Some(BlockStart::Text),
                    _ => None,
                };
                if let Some(block) = start {
                    chunks.push(Ok(ProviderChunk::ContentBlockStart { index: idx, block }));
                }
            }
        }

        "content_block_delta" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            if let Some(delta) = v.get("delta") {
                let delta_type = delta.get("type").and_then(|v| v.as_str()).unwrap_or("");
                let delta = match delta_type {
                    "text_delta" => delta
                        .get("text")
                        .and_then(|v| v.as_str())
                        .map(|t| BlockDelta::Text { text: t.to_string() }),
                    "input_json_delta" => delta.get("partial_json").and_then(|v| v.as_str()).map(
                        |p| BlockDelta::InputJson {
                            partial_json: p.to_string(),
                        },
                    ),
                    _ => None,
                };
                if let Some(delta) = delta {
                    chunks.push(Ok(ProviderChunk::ContentBlockDelta { index: idx, delta }));
                }
            }
        }

        "content_block_stop" => {
            let idx = v.get("index").and_then(|v| v.as_u64()).unwrap_or(0);
            chunks.push(Ok(ProviderChunk::ContentBlockStop { index: idx }));
        }

        "message_delta" => {
            if let Some(output) = v
                .get("usage")
                .and_then(|u| u.get("output_tokens"))
                .and_then(|v| v.as_u64())
            {
                if let Some(ref mut u) = state.usage {
                    u.completion_tokens = output as u32;
                    u.total_tokens = u.prompt_tokens + u.completion_tokens;
                }
            }
            let stop_reason = v
                .get("delta")
                .and_then(|d| d.get("stop_reason"))
                .and_then(|v| v.as_str())
                .map(|s| match s {
                    "end_turn" => "stop".to_string(),
                    "tool_use" => "tool_calls".to_string(),
                    other => other.to_string(),
                });
            chunks.push(Ok(ProviderChunk::MessageDelta {
                usage: state.usage.clone(),
                stop_reason,
            }));
        }

        "message_stop" => {
            chunks.push(Ok(ProviderChunk::MessageStop));
        }

        "error" => {
            let msg = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|v| v.as_str())
                .unwrap_or("unknown error");
            chunks.push(Ok(ProviderChunk::Error {
                message: msg.to_string(),
            }));
        }

        _ => {
            // ping, or an event type we don't need — ignore.
        }
    }

    chunks
}

fn parse_anthropic_usage(v: &Value) -> Option<Usage> {
    let input = v.get("input_tokens")?.as_u64()? as u32;
    let output = v.get("output_tokens").and_then(|v| v.as_u64()).unwrap_or(0) as u32;
    Some(Usage {
        prompt_tokens: input,
        completion_tokens: output,
        total_tokens: input + output,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<ProviderChunk>>> {
        let url = format!("{}/v1/messages", self.base_url);
        let body = self.build_messages_body(&req);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, %url, "anthropic stream request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: provider_id,
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        let mut state = StreamState::default();
        Ok(crate::sse::sse_response_stream(resp, move |data| {
            parse_anthropic_sse(data, &mut state)
        }))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_go_to_top_level_field() {
        let req = ChatRequest {
            messages: vec![
                Message::system("You are a careful reviewer."),
                Message::user("review this diff"),
            ],
            ..Default::default()
        };
        let cfg = LlmConfig::default();
        let provider = AnthropicProvider {
            id: "anthropic".into(),
            base_url: cfg.base_url.clone(),
            api_key: "test-key".into(),
            default_model: cfg.default_model.clone(),
            client: reqwest::Client::new(),
        };
        let body = provider.build_messages_body(&req);
        assert_eq!(body["system"], "You are a careful reviewer.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn text_delta_parses_to_content_block_delta() {
        let mut state = StreamState::default();
        let data = r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"hi"}}"#;
        let chunks = parse_anthropic_sse(data, &mut state);
        assert_eq!(chunks.len(), 1);
        match chunks.into_iter().next().unwrap().unwrap() {
            ProviderChunk::ContentBlockDelta { index, delta } => {
                assert_eq!(index, 0);
                assert!(matches!(delta, BlockDelta::Text { text } if text == "hi"));
            }
            other => panic!("unexpected chunk: {other:?}"),
        }
    }

    #[test]
    fn input_json_delta_is_forwarded_unbuffered() {
        let mut state = StreamState::default();
        let data = r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"path\":"}}"#;
        let chunks = parse_anthropic_sse(data, &mut state);
        match chunks.into_iter().next().unwrap().unwrap() {
            ProviderChunk::ContentBlockDelta { delta, .. } => {
                assert!(matches!(delta, BlockDelta::InputJson { partial_json } if partial_json == "{\"path\":"));
            }
            other => panic!("unexpected chunk: {other:?}"),
        }
    }

    #[test]
    fn message_stop_produces_stop_chunk() {
        let mut state = StreamState::default();
        let chunks = parse_anthropic_sse(r#"{"type":"message_stop"}"#, &mut state);
        assert!(matches!(chunks[0], Ok(ProviderChunk::MessageStop)));
    }

    #[test]
    fn error_event_parses_to_error_chunk() {
        let mut state = StreamState::default();
        let data = r#"{"type":"error","error":{"message":"overloaded"}}"#;
        let chunks = parse_anthropic_sse(data, &mut state);
        match chunks.into_iter().next().unwrap().unwrap() {
            ProviderChunk::Error { message } => assert_eq!(message, "overloaded"),
            other => panic!("unexpected chunk: {other:?}"),
        }
    }
}
