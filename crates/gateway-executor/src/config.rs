//! Server-owned configuration the executor needs at request time: which
//! providers exist, their server-owned keys, and the default provider.

use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// The server-owned key for this provider, used when the caller
    /// supplies neither a BYOK key nor has one stored (spec §4.G step 3).
    pub server_api_key: Option<String>,
    pub default_model: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    pub providers: HashMap<String, ProviderConfig>,
    /// The first configured provider; used when neither `metadata.provider`
    /// nor the principal's preference is set (spec §4.G step 2).
    pub default_provider: Option<String>,
    pub platform_fee_percent: f64,
    /// `None` disables monthly quota enforcement entirely.
    pub monthly_cap_tokens: Option<i64>,
}

impl ExecutorConfig {
    pub fn provider(&self, name: &str) -> Option<&ProviderConfig> {
        self.providers.get(name)
    }
}
