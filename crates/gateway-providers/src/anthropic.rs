//! Anthropic Messages API adapter.

use crate::client::ProviderClient;
use crate::{AdapterError, FinishReason, GenerateOptions, GenerateResult, Message, Role, ToolCall, Usage};
use async_trait::async_trait;
use gateway_models::ModelDescriptor;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
}

impl AnthropicClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn build_request(&self, model: &ModelDescriptor, messages: &[Message], opts: &GenerateOptions) -> Value {
        let system: String = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");

        let turns: Vec<Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| match m.role {
                Role::User => json!({"role": "user", "content": m.content}),
                Role::Assistant => json!({"role": "assistant", "content": m.content}),
                Role::Tool => json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": m.tool_call_id.clone().unwrap_or_default(),
                        "content": m.content,
                    }]
                }),
                Role::System => unreachable!("filtered above"),
            })
            .collect();

        let mut body = json!({
            "model": model.id,
            "max_tokens": opts.max_tokens.unwrap_or(4096),
            "messages": turns,
        });
        if !system.is_empty() {
            body["system"] = json!(system);
        }
        if let Some(t) = opts.temperature {
            body["temperature"] = json!(t);
        }

        let mut tools: Vec<Value> = opts
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.input_schema,
                })
            })
            .collect();
        if let Some(native) = &opts.native_tool {
            tools.push(native.clone());
        }
        if !tools.is_empty() {
            body["tools"] = json!(tools);
        }

        body
    }

    fn map_error(status: reqwest::StatusCode, body: &str) -> AdapterError {
        match status.as_u16() {
            401 => AdapterError::Unauthorized,
            403 => AdapterError::ForbiddenModel(body.to_string()),
            404 => AdapterError::NotFound(body.to_string()),
            429 => AdapterError::RateLimited { retry_after_secs: None },
            400..=499 => AdapterError::BadRequest(body.to_string()),
            _ => AdapterError::Upstream(body.to_string()),
        }
    }
}

#[async_trait]
impl ProviderClient for AnthropicClient {
    fn provider_name(&self) -> &'static str {
        "anthropic"
    }

    async fn generate(
        &self,
        api_key: &str,
        model: &ModelDescriptor,
        messages: &[Message],
        opts: &GenerateOptions,
    ) -> Result<GenerateResult, AdapterError> {
        let body = self.build_request(model, messages, opts);

        let response = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AdapterError::Timeout
                } else {
                    AdapterError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::map_error(status, &text));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        parse_response(&payload)
    }
}

fn parse_response(payload: &Value) -> Result<GenerateResult, AdapterError> {
    let blocks = payload["content"].as_array().cloned().unwrap_or_default();

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in &blocks {
        match block["type"].as_str() {
            Some("text") => {
                if let Some(t) = block["text"].as_str() {
                    text.push_str(t);
                }
            }
            Some("tool_use") => {
                tool_calls.push(ToolCall {
                    id: block["id"].as_str().unwrap_or_default().to_string(),
                    name: block["name"].as_str().unwrap_or_default().to_string(),
                    arguments: block["input"].clone(),
                });
            }
            _ => {}
        }
    }

    // Vendor field names: `input_tokens`/`output_tokens`, no `total` field
    // at all — this is exactly the "vendors use differing field names"
    // case the normalization routine exists for.
    let usage = Usage::normalize(
        payload["usage"]["input_tokens"].as_u64().map(|n| n as u32),
        payload["usage"]["output_tokens"].as_u64().map(|n| n as u32),
        None,
    );

    let finish_reason = match payload["stop_reason"].as_str() {
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    };

    Ok(GenerateResult {
        text,
        usage,
        finish_reason,
        tool_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_text_and_usage_without_total_field() {
        let payload = json!({
            "content": [{"type": "text", "text": "hello"}],
            "usage": {"input_tokens": 10, "output_tokens": 5},
            "stop_reason": "end_turn",
        });
        let result = parse_response(&payload).unwrap();
        assert_eq!(result.text, "hello");
        assert_eq!(result.usage.total, 15);
        assert_eq!(result.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn parses_tool_use_blocks() {
        let payload = json!({
            "content": [{"type": "tool_use", "id": "t1", "name": "search", "input": {"q": "rust"}}],
            "usage": {"input_tokens": 1, "output_tokens": 1},
            "stop_reason": "tool_use",
        });
        let result = parse_response(&payload).unwrap();
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "search");
        assert_eq!(result.finish_reason, FinishReason::ToolCalls);
    }

    #[test]
    fn maps_401_to_unauthorized() {
        let err = AnthropicClient::map_error(reqwest::StatusCode::UNAUTHORIZED, "bad key");
        assert!(matches!(err, AdapterError::Unauthorized));
    }

    #[test]
    fn maps_429_to_rate_limited() {
        let err = AnthropicClient::map_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(matches!(err, AdapterError::RateLimited { .. }));
    }
}
