//! Request/response shapes for the `generateText`-style procedure that
//! drives the executor.

use chrono::{DateTime, Utc};
use gateway_protocol::Principal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebSearchPreference {
    Native,
    External,
    Never,
}

impl Default for WebSearchPreference {
    fn default() -> Self {
        Self::Never
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateMetadata {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    #[serde(default)]
    pub use_web_search: bool,
    #[serde(default)]
    pub web_search_preference: WebSearchPreference,
    #[serde(default = "default_max_web_searches")]
    pub max_web_searches: u32,
}

fn default_max_web_searches() -> u32 {
    1
}

/// Inputs to one `generate` call (spec §4.G). Exactly one of `prompt_id` /
/// `system_prompt` must be set; validated in [`crate::AiExecutor::generate`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub content: String,
    pub prompt_id: Option<String>,
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub context: std::collections::HashMap<String, String>,
    #[serde(default)]
    pub metadata: GenerateMetadata,
    /// BYOK: a caller-supplied API key that bypasses the server-owned
    /// credential for this one request.
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Credits,
    Byok,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub request_id: String,
    pub user_id: Option<String>,
    pub provider: String,
    pub model: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
    pub cost_cents: Option<i64>,
    pub platform_fee_cents: Option<i64>,
    pub payment_method: PaymentMethod,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateResponse {
    pub content: String,
    pub usage: UsageSummary,
    pub model: String,
    pub provider: String,
    pub request_id: String,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct UsageSummary {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

pub(crate) fn estimate_prompt_tokens(text: &str) -> u32 {
    // Crude character-based heuristic per spec §4.G step 5 and §9 open
    // question: `prompt_tokens ≈ ceil(chars/4)`.
    ((text.chars().count() as f64) / 4.0).ceil() as u32
}

/// Bundles the principal alongside the request so call sites don't need to
/// thread two arguments through every helper.
pub struct GenerateCall {
    pub principal: Principal,
    pub request: GenerateRequest,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_estimate_rounds_up() {
        assert_eq!(estimate_prompt_tokens("abcd"), 1);
        assert_eq!(estimate_prompt_tokens("abcde"), 2);
        assert_eq!(estimate_prompt_tokens(""), 0);
    }
}
