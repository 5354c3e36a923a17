//! OpenAI-compatible chat-completions adapter (also used for any vendor
//! whose API mirrors OpenAI's wire shape, e.g. self-hosted OpenAI-compatible
//! gateways configured with `type = "openai-compatible"`).

use crate::client::ProviderClient;
use crate::{AdapterError, FinishReason, GenerateOptions, GenerateResult, Message, Role, ToolCall, Usage};
use async_trait::async_trait;
use gateway_models::ModelDescriptor;
use serde_json::{json, Value};

const DEFAULT_BASE_URL: &str = "https://api.openai.com";

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiClient {
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
        let turns: Vec<Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                    Role::Tool => "tool",
                };
                let mut turn = json!({"role": role, "content": m.content});
                if let Some(id) = &m.tool_call_id {
                    turn["tool_call_id"] = json!(id);
                }
                turn
            })
            .collect();

        let mut body = json!({
            "model": model.id,
            "messages": turns,
        });
        if let Some(max_tokens) = opts.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        if let Some(t) = opts.temperature {
            body["temperature"] = json!(t);
        }
        if !opts.tools.is_empty() {
            let tools: Vec<Value> = opts
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.input_schema,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }
        match opts.tool_choice {
            Some(crate::ToolChoice::None) => body["tool_choice"] = json!("none"),
            Some(crate::ToolChoice::Auto) => body["tool_choice"] = json!("auto"),
            _ => {}
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
impl ProviderClient for OpenAiClient {
    fn provider_name(&self) -> &'static str {
        "openai"
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
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(api_key)
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
    let choice = payload["choices"].get(0).cloned().unwrap_or(Value::Null);
    let message = &choice["message"];

    let text = message["content"].as_str().unwrap_or_default().to_string();

    let tool_calls = message["tool_calls"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .into_iter()
        .filter_map(|tc| {
            let name = tc["function"]["name"].as_str()?.to_string();
            let args_str = tc["function"]["arguments"].as_str().unwrap_or("{}");
            let arguments: Value = serde_json::from_str(args_str).unwrap_or(json!({}));
            Some(ToolCall {
                id: tc["id"].as_str().unwrap_or_default().to_string(),
                name,
                arguments,
            })
        })
        .collect();

    // Vendor field names: `prompt_tokens`/`completion_tokens`/`total_tokens`
    // — here the vendor *does* send `total`, unlike Anthropic.
    let usage = Usage::normalize(
        payload["usage"]["prompt_tokens"].as_u64().map(|n| n as u32),
        payload["usage"]["completion_tokens"].as_u64().map(|n| n as u32),
        payload["usage"]["total_tokens"].as_u64().map(|n| n as u32),
    );

    let finish_reason = match choice["finish_reason"].as_str() {
        Some("length") => FinishReason::Length,
        Some("tool_calls") => FinishReason::ToolCalls,
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
    fn parses_plain_text_response() {
        let payload = json!({
            "choices": [{"message": {"content": "hi there"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5},
        });
        let result = parse_response(&payload).unwrap();
        assert_eq!(result.text, "hi there");
        assert_eq!(result.usage.total, 5);
    }

    #[test]
    fn parses_tool_calls_with_string_encoded_arguments() {
        let payload = json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "function": {"name": "search", "arguments": "{\"q\":\"rust\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5},
        });
        let result = parse_response(&payload).unwrap();
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].arguments, json!({"q": "rust"}));
        assert_eq!(result.finish_reason, FinishReason::ToolCalls);
    }
}
