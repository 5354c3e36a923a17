//! The uniform call surface every vendor adapter implements (spec §4.F).

use crate::{AdapterError, GenerateOptions, GenerateResult, Message};
use async_trait::async_trait;
use gateway_models::ModelDescriptor;

/// One `generate` call, dispatched with a caller-resolved API key (either
/// BYOK or the server-owned key for that provider — resolution happens
/// one layer up, in `gateway-executor`).
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Provider name this client answers for, e.g. `"anthropic"`.
    fn provider_name(&self) -> &'static str;

    async fn generate(
        &self,
        api_key: &str,
        model: &ModelDescriptor,
        messages: &[Message],
        opts: &GenerateOptions,
    ) -> Result<GenerateResult, AdapterError>;
}
