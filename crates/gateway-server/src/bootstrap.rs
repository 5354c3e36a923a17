//! Turns a loaded [`ServerConfig`] into a constructed [`AppState`]: picks
//! in-memory vs. Postgres backends, builds the provider map and the remote
//! tool-server manager, and registers the built-in procedure catalog (spec
//! §6 "Persisted state" table: wallets/debits/payments and user_keys may
//! share one database, selected by `token_tracking.database_url`).

use crate::config::ServerConfig;
use crate::procedures::{self, ProcedureDeps};
use crate::ratelimit::RateLimiter;
use crate::state::AppState;
use gateway_auth::AuthStore;
use gateway_catalog::ProcedureCatalogBuilder;
use gateway_executor::{AiExecutor, ExecutorConfig, ProviderConfig as ExecutorProviderConfig, PromptCatalog};
use gateway_ledger::{InMemoryLedger, PostgresLedger, VirtualTokenLedger};
use gateway_mcp::{McpConfig as McpSurfaceConfig, McpSurface, ServerInfo};
use gateway_models::ModelRegistry;
use gateway_providers::{AnthropicClient, OpenAiClient, ProviderClient};
use gateway_secrets::{InMemorySecretStore, MasterKey, PostgresSecretStore, SecretStore};
use gateway_toolservers::{ContainerTransport, HttpSseTransport, RemoteToolServerManager, StdioChildTransport, ToolServerSpec, ToolServerTransport};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    Database(String),
    #[error("catalog registration failed: {0}")]
    Catalog(#[from] gateway_catalog::CatalogError),
    #[error("master key error: {0}")]
    MasterKey(String),
    #[error("remote tool server '{name}' is misconfigured: {reason}")]
    ToolServerSpec { name: String, reason: String },
}

/// Derives the secret store's 32-byte master key from `oauth.encryption_key`
/// (spec §6 groups it there; see [`crate::config::OAuthConfig::encryption_key`]).
/// A configured key is stretched to 32 bytes via SHA-256 so operators may
/// supply any passphrase rather than exact key bytes. Missing entirely, a
/// fixed all-zero key is used with a loud warning — acceptable only for
/// `development_mode`, never for a real deployment.
fn derive_master_key(config: &ServerConfig) -> Result<MasterKey, BootstrapError> {
    let key_bytes = match &config.oauth.encryption_key {
        Some(passphrase) => {
            let mut hasher = Sha256::new();
            hasher.update(passphrase.as_bytes());
            let digest = hasher.finalize();
            let mut bytes = [0u8; 32];
            bytes.copy_from_slice(&digest);
            bytes
        }
        None => {
            tracing::warn!(
                "oauth.encryption_key is unset; using an insecure fixed master key. \
                 This is only acceptable in development_mode."
            );
            [0u8; 32]
        }
    };
    MasterKey::from_bytes(&key_bytes).map_err(|e| BootstrapError::MasterKey(e.to_string()))
}

async fn connect_pool(database_url: &str) -> Result<sqlx::PgPool, BootstrapError> {
    sqlx::PgPool::connect(database_url)
        .await
        .map_err(|e| BootstrapError::Database(e.to_string()))
}

/// Builds every shared component from config and freezes the procedure
/// catalog. This is the single place the in-memory/Postgres choice is made
/// for both the ledger and the secret store, so the two backends can never
/// drift independently of each other's availability.
pub async fn build_app_state(config: ServerConfig) -> Result<AppState, BootstrapError> {
    let config = Arc::new(config);
    let started_at = Instant::now();

    let database_url = config.token_tracking.database_url.clone();
    let pool = match &database_url {
        Some(url) => Some(connect_pool(url).await?),
        None => None,
    };

    let ledger: Arc<dyn VirtualTokenLedger> = match &pool {
        Some(pool) => Arc::new(PostgresLedger::new(pool.clone())),
        None => Arc::new(InMemoryLedger::new()),
    };

    let master_key = derive_master_key(&config)?;
    let secrets: Arc<dyn SecretStore> = match &pool {
        Some(pool) => Arc::new(PostgresSecretStore::new(pool.clone(), master_key)),
        None => Arc::new(InMemorySecretStore::new(master_key)),
    };

    let auth = Arc::new(AuthStore::new());

    let mut default_models = HashMap::new();
    let mut executor_providers = HashMap::new();
    let mut provider_clients: HashMap<String, Arc<dyn ProviderClient>> = HashMap::new();
    let http = reqwest::Client::new();

    for provider in &config.providers {
        if let Some(model) = &provider.default_model {
            default_models.insert(provider.name.clone(), model.clone());
        }
        executor_providers.insert(
            provider.name.clone(),
            ExecutorProviderConfig {
                server_api_key: provider.api_key.clone(),
                default_model: provider.default_model.clone(),
            },
        );

        let client: Arc<dyn ProviderClient> = match provider.r#type.as_deref().unwrap_or(provider.name.as_str()) {
            "openai" => match &provider.base_url {
                Some(base_url) => Arc::new(OpenAiClient::with_base_url(http.clone(), base_url.clone())),
                None => Arc::new(OpenAiClient::new(http.clone())),
            },
            _ => match &provider.base_url {
                Some(base_url) => Arc::new(AnthropicClient::with_base_url(http.clone(), base_url.clone())),
                None => Arc::new(AnthropicClient::new(http.clone())),
            },
        };
        provider_clients.insert(provider.name.clone(), client);
    }

    let models = Arc::new(ModelRegistry::new(default_models));
    let mut restriction_overrides = HashMap::new();
    for (provider_name, restrictions) in &config.model_restrictions {
        restriction_overrides.insert(
            provider_name.clone(),
            gateway_models::ModelRestrictions {
                allowed_models: restrictions.allowed_models.clone(),
                allowed_patterns: restrictions.allowed_patterns.clone(),
                blocked_models: restrictions.blocked_models.clone(),
            },
        );
    }
    for provider in &config.providers {
        if !provider.model_restrictions.allowed_models.is_empty()
            || !provider.model_restrictions.allowed_patterns.is_empty()
            || !provider.model_restrictions.blocked_models.is_empty()
        {
            restriction_overrides.insert(
                provider.name.clone(),
                gateway_models::ModelRestrictions {
                    allowed_models: provider.model_restrictions.allowed_models.clone(),
                    allowed_patterns: provider.model_restrictions.allowed_patterns.clone(),
                    blocked_models: provider.model_restrictions.blocked_models.clone(),
                },
            );
        }
    }
    if !restriction_overrides.is_empty() {
        models.set_restrictions(restriction_overrides);
    }

    let mut prompts = config.system_prompts.clone();
    for provider in &config.providers {
        prompts.extend(provider.system_prompts.clone());
    }
    let prompt_catalog = PromptCatalog::new(prompts);

    let executor_config = ExecutorConfig {
        providers: executor_providers,
        default_provider: config.providers.first().map(|p| p.name.clone()),
        platform_fee_percent: config.token_tracking.platform_fee_percent,
        monthly_cap_tokens: config.token_tracking.monthly_cap_tokens,
    };

    let tool_servers = Arc::new(RemoteToolServerManager::new(config.remote_mcp_servers.prefix_tool_names));
    if config.remote_mcp_servers.enabled {
        for entry in &config.remote_mcp_servers.servers {
            if !entry.auto_start {
                continue;
            }
            let transport = build_transport(entry)?;
            tool_servers
                .add_server(ToolServerSpec::new(entry.name.clone(), transport).with_startup_retry(entry.startup_retries, entry.startup_delay_ms))
                .await;
        }
    }

    let executor = Arc::new(
        AiExecutor::new(
            executor_config,
            prompt_catalog,
            provider_clients,
            models,
            ledger.clone(),
            secrets.clone(),
            tool_servers,
        )
        .with_request_deadline(Duration::from_secs(120)),
    );

    let mut builder = ProcedureCatalogBuilder::new();
    let deps = ProcedureDeps {
        executor: executor.clone(),
        ledger: ledger.clone(),
        secrets: secrets.clone(),
        config: config.clone(),
        started_at,
    };
    procedures::register_all(&mut builder, &deps)?;
    let catalog = builder.freeze();

    let mcp = Arc::new(McpSurface::new(
        catalog.clone(),
        McpSurfaceConfig {
            require_for_list: config.mcp.auth.require_for_list,
            require_for_call: config.mcp.auth.require_for_call,
            public_tools: config.mcp.auth.public_tools.iter().cloned().collect(),
        },
        ServerInfo {
            name: "ai-gateway".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    ));

    let rate_limiter = Arc::new(RateLimiter::new(
        Duration::from_millis(config.rate_limit.window_ms),
        config.rate_limit.max,
    ));
    let auth_rate_limiter = Arc::new(RateLimiter::new(
        Duration::from_millis(config.rate_limit.window_ms),
        config.rate_limit.auth_max,
    ));

    Ok(AppState {
        config,
        catalog,
        auth,
        executor,
        ledger,
        secrets,
        mcp,
        rate_limiter,
        auth_rate_limiter,
        started_at,
    })
}

/// Builds the transport for one `remote_mcp_servers.servers[]` entry. The
/// required fields vary by `transport`: `stdio` needs `command`,
/// `container` needs `image`, `http_sse` needs `url`.
fn build_transport(entry: &crate::config::RemoteMcpServerEntry) -> Result<Box<dyn ToolServerTransport>, BootstrapError> {
    match entry.transport.as_str() {
        "stdio" => {
            let command_line = entry.command.as_deref().ok_or_else(|| BootstrapError::ToolServerSpec {
                name: entry.name.clone(),
                reason: "stdio transport requires 'command'".to_string(),
            })?;
            let mut parts = command_line.split_whitespace();
            let program = parts.next().ok_or_else(|| BootstrapError::ToolServerSpec {
                name: entry.name.clone(),
                reason: "'command' must not be empty".to_string(),
            })?;
            let mut command = Command::new(program);
            command.args(parts);
            command.args(&entry.args);
            let transport =
                StdioChildTransport::spawn(command).map_err(|e| BootstrapError::Database(e.to_string()))?;
            Ok(Box::new(transport))
        }
        "container" => {
            let image = entry.image.as_deref().ok_or_else(|| BootstrapError::ToolServerSpec {
                name: entry.name.clone(),
                reason: "container transport requires 'image'".to_string(),
            })?;
            let transport = ContainerTransport::spawn("docker", image, &entry.args, None)
                .map_err(|e| BootstrapError::Database(e.to_string()))?;
            Ok(Box::new(transport))
        }
        "http_sse" => {
            let url = entry.url.as_deref().ok_or_else(|| BootstrapError::ToolServerSpec {
                name: entry.name.clone(),
                reason: "http_sse transport requires 'url'".to_string(),
            })?;
            Ok(Box::new(HttpSseTransport::new(url.to_string())))
        }
        other => Err(BootstrapError::ToolServerSpec {
            name: entry.name.clone(),
            reason: format!("unknown transport kind '{other}'"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_a_deterministic_key_from_a_configured_passphrase() {
        let mut config = ServerConfig::default();
        config.oauth.encryption_key = Some("correct horse battery staple".to_string());
        let a = derive_master_key(&config).unwrap();
        let b = derive_master_key(&config).unwrap();
        // Same passphrase must derive the same key so restarts can still
        // decrypt previously sealed secrets.
        assert_eq!(a.seal("probe").unwrap().ciphertext.len() > 0, true);
        let sealed = a.seal("probe").unwrap();
        assert_eq!(b.open(&sealed).unwrap(), "probe");
    }

    #[tokio::test]
    async fn unconfigured_remote_mcp_servers_leave_the_manager_empty() {
        let config = ServerConfig::default();
        let state = build_app_state(config).await.unwrap();
        assert!(state.executor.tool_servers().all_status().await.is_empty());
    }
}
