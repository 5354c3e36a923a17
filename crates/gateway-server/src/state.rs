//! The top-level server object: every shared component, owned once and
//! handed down to handlers as `Arc`-cloned state (spec Design Note 2:
//! "references flow downward only").

use crate::config::ServerConfig;
use crate::ratelimit::RateLimiter;
use gateway_auth::AuthStore;
use gateway_catalog::ProcedureCatalog;
use gateway_executor::AiExecutor;
use gateway_ledger::VirtualTokenLedger;
use gateway_mcp::McpSurface;
use gateway_secrets::SecretStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub catalog: ProcedureCatalog,
    pub auth: Arc<AuthStore>,
    pub executor: Arc<AiExecutor>,
    pub ledger: Arc<dyn VirtualTokenLedger>,
    pub secrets: Arc<dyn SecretStore>,
    pub mcp: Arc<McpSurface>,
    pub rate_limiter: Arc<RateLimiter>,
    /// Stricter-window limiter applied to the OAuth endpoints (spec §5:
    /// "Auth endpoints use a stricter window than generate endpoints").
    pub auth_rate_limiter: Arc<RateLimiter>,
    pub started_at: std::time::Instant,
}

impl AppState {
    pub fn base_url(&self) -> String {
        self.config
            .oauth
            .base_url
            .clone()
            .unwrap_or_else(|| format!("http://localhost:{}", self.config.port))
    }
}
