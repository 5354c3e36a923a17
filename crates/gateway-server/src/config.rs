//! Server configuration surface (spec §6 "Configuration surface").
//!
//! Layered TOML + environment via the `config` crate, matching the
//! teacher's `turbomcp-server::config` layering approach: a file provides
//! the base, environment variables prefixed `GATEWAY__` override it (double
//! underscore as the `config` crate's nested-key separator).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolsConfig {
    pub envelope: bool,
    pub typed: bool,
}

impl Default for ProtocolsConfig {
    fn default() -> Self {
        Self { envelope: true, typed: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub rpc: String,
    pub trpc: String,
    pub health: String,
    pub webhook: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            rpc: "/rpc".to_string(),
            trpc: "/trpc".to_string(),
            health: "/health".to_string(),
            webhook: "/webhooks".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ModelRestrictionsConfig {
    #[serde(default)]
    pub allowed_models: Vec<String>,
    #[serde(default)]
    pub allowed_patterns: Vec<String>,
    #[serde(default)]
    pub blocked_models: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderEntryConfig {
    pub name: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub system_prompts: HashMap<String, String>,
    #[serde(default)]
    pub model_restrictions: ModelRestrictionsConfig,
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpTransportsConfig {
    pub http: bool,
    pub stdio: bool,
    pub sse: bool,
}

impl Default for McpTransportsConfig {
    fn default() -> Self {
        Self { http: true, stdio: false, sse: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct McpAuthConfig {
    #[serde(default)]
    pub require_for_list: bool,
    #[serde(default)]
    pub require_for_call: bool,
    #[serde(default)]
    pub public_tools: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub enabled: bool,
    pub transports: McpTransportsConfig,
    pub auth: McpAuthConfig,
    #[serde(default)]
    pub admin_users: Vec<String>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            transports: McpTransportsConfig::default(),
            auth: McpAuthConfig::default(),
            admin_users: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionStorageConfig {
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OAuthConfig {
    #[serde(default)]
    pub enabled: bool,
    /// This gateway's own OAuth client id/secret, used only when it is
    /// itself acting as a client of an upstream identity provider during
    /// federated login (spec §4.C); unrelated to the dynamically
    /// registered clients this server issues credentials to.
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    /// Master key for the secret store (spec §4.D: "the master key is
    /// supplied at startup"); recognized here because spec §6 groups it
    /// under the `oauth` config object alongside the rest of the auth
    /// surface rather than as its own top-level key.
    #[serde(default)]
    pub encryption_key: Option<String>,
    #[serde(default)]
    pub session_storage: SessionStorageConfig,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
}

/// `jwt.{secret, issuer, audience}` (spec §6). Recognized for
/// configuration-surface completeness; this gateway's own bearer tokens
/// are opaque values from [`gateway_auth::AuthStore`] rather than JWTs, so
/// these fields are only consulted by a deployment that additionally
/// wants to accept externally-issued JWTs as bearer tokens — not required
/// by the in-memory token store used here.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct JwtConfig {
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub audience: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max: u32,
    /// Stricter window applied to auth endpoints (spec §5: "Auth endpoints
    /// use a stricter window than generate endpoints").
    pub auth_max: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { window_ms: 60_000, max: 120, auth_max: 20 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub origin: String,
    pub credentials: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self { origin: "*".to_string(), credentials: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TokenTrackingConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub platform_fee_percent: f64,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
    #[serde(default)]
    pub monthly_cap_tokens: Option<i64>,
}

fn default_webhook_path() -> String {
    "/webhooks".to_string()
}

/// One entry of `remote_mcp_servers.servers[]` (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemoteMcpServerEntry {
    pub name: String,
    /// `"stdio" | "container" | "http_sse"`.
    pub transport: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub startup_retries: u32,
    #[serde(default)]
    pub startup_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RemoteMcpServersConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub prefix_tool_names: bool,
    #[serde(default)]
    pub servers: Vec<RemoteMcpServerEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub trust_proxy: bool,
    pub protocols: ProtocolsConfig,
    pub paths: PathsConfig,
    pub providers: Vec<ProviderEntryConfig>,
    pub system_prompts: HashMap<String, String>,
    pub model_restrictions: HashMap<String, ModelRestrictionsConfig>,
    pub mcp: McpConfig,
    pub oauth: OAuthConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub cors: CorsConfig,
    pub token_tracking: TokenTrackingConfig,
    pub remote_mcp_servers: RemoteMcpServersConfig,
    pub require_auth_for_generate: bool,
    pub development_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8787,
            trust_proxy: false,
            protocols: ProtocolsConfig::default(),
            paths: PathsConfig::default(),
            providers: Vec::new(),
            system_prompts: HashMap::new(),
            model_restrictions: HashMap::new(),
            mcp: McpConfig::default(),
            oauth: OAuthConfig::default(),
            jwt: JwtConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            token_tracking: TokenTrackingConfig::default(),
            remote_mcp_servers: RemoteMcpServersConfig::default(),
            require_auth_for_generate: false,
            development_mode: false,
        }
    }
}

impl ServerConfig {
    /// Loads layered config: defaults, then an optional file at `path`,
    /// then `GATEWAY__`-prefixed environment variables. Missing file is not
    /// an error — a bare-env or bare-default deployment is legitimate.
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("GATEWAY")
                .separator("__")
                .try_parsing(true),
        );
        builder.build()?.try_deserialize()
    }
}
