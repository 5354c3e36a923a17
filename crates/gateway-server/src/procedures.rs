//! Populates the procedure catalog (spec §4.A) with the gateway's built-in
//! operations. This is the one place that turns the generic catalog
//! mechanism into the concrete method list both protocol surfaces expose.

use crate::config::ServerConfig;
use gateway_catalog::{CatalogError, ProcedureCatalogBuilder, ProcedureKind, ProcedureSpec, ToolVisibility};
use gateway_executor::{AiExecutor, GenerateRequest};
use gateway_ledger::VirtualTokenLedger;
use gateway_protocol::{GatewayError, Principal, ScopeRequirement};
use gateway_secrets::SecretStore;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

pub struct ProcedureDeps {
    pub executor: Arc<AiExecutor>,
    pub ledger: Arc<dyn VirtualTokenLedger>,
    pub secrets: Arc<dyn SecretStore>,
    pub config: Arc<ServerConfig>,
    pub started_at: Instant,
}

pub fn register_all(builder: &mut ProcedureCatalogBuilder, deps: &ProcedureDeps) -> Result<(), CatalogError> {
    register_health(builder, deps)?;
    register_generate_text(builder, deps)?;
    register_wallet_get(builder, deps)?;
    register_secrets(builder, deps)?;
    Ok(())
}

fn register_health(builder: &mut ProcedureCatalogBuilder, deps: &ProcedureDeps) -> Result<(), CatalogError> {
    let started_at = deps.started_at;
    builder
        .register(
            ProcedureSpec::new("health", ProcedureKind::Query, move |_principal: Principal, _params: Value| {
                let uptime = started_at.elapsed().as_secs();
                async move {
                    Ok(json!({
                        "status": "healthy",
                        "timestamp": chrono::Utc::now().to_rfc3339(),
                        "uptime_seconds": uptime,
                        "protocols": { "envelope": true, "typed": true, "mcp": true },
                        "version": env!("CARGO_PKG_VERSION"),
                    }))
                }
            })
            .with_tool_visibility(ToolVisibility::Public)
            .with_description("Liveness and version check; never requires authentication."),
        )?
        .register(
            ProcedureSpec::new("ping", ProcedureKind::Query, |_principal: Principal, _params: Value| async move {
                Ok(json!({ "pong": true }))
            })
            .with_tool_visibility(ToolVisibility::Public),
        )?;
    Ok(())
}

fn register_generate_text(builder: &mut ProcedureCatalogBuilder, deps: &ProcedureDeps) -> Result<(), CatalogError> {
    let executor = deps.executor.clone();
    let require_auth = deps.config.require_auth_for_generate;
    builder.register(
        ProcedureSpec::new(
            "generateText",
            ProcedureKind::Mutation,
            move |principal: Principal, params: Value| {
                let executor = executor.clone();
                async move {
                    if require_auth && principal.is_anonymous() {
                        return Err(GatewayError::unauthorized(
                            "authentication is required for generateText",
                        ));
                    }
                    let request: GenerateRequest = serde_json::from_value(params)
                        .map_err(|e| GatewayError::invalid_params(e.to_string()))?;
                    let response = executor
                        .generate(&principal, request, CancellationToken::new())
                        .await
                        .map_err(GatewayError::from)?;
                    serde_json::to_value(response).map_err(|e| GatewayError::internal(e.to_string()))
                }
            },
        )
        .with_required_scopes(ScopeRequirement::all_of(["ai:generate"]))
        .with_tool_visibility(ToolVisibility::Scoped)
        .with_input_schema(json!({
            "type": "object",
            "required": ["content"],
            "properties": {
                "content": { "type": "string" },
                "prompt_id": { "type": "string" },
                "system_prompt": { "type": "string" },
                "context": { "type": "object" },
                "metadata": { "type": "object" },
            }
        }))
        .with_description("Resolve a prompt, select a provider/model, and generate a response."),
    )?;
    Ok(())
}

fn register_wallet_get(builder: &mut ProcedureCatalogBuilder, deps: &ProcedureDeps) -> Result<(), CatalogError> {
    let ledger = deps.ledger.clone();
    builder.register(
        ProcedureSpec::new("wallet.get", ProcedureKind::Query, move |principal: Principal, _params: Value| {
            let ledger = ledger.clone();
            async move {
                let user_id = principal
                    .user_id()
                    .ok_or_else(|| GatewayError::unauthorized("wallet.get requires an authenticated user"))?
                    .to_string();
                let wallet = ledger.wallet(&user_id).await.map_err(|e| GatewayError::internal(e.to_string()))?;
                serde_json::to_value(wallet).map_err(|e| GatewayError::internal(e.to_string()))
            }
        })
        .with_required_scopes(ScopeRequirement::all_of(["wallet:read"]))
        .with_tool_visibility(ToolVisibility::Hidden)
        .with_description("Read the caller's own virtual-token wallet balance."),
    )?;
    Ok(())
}

fn register_secrets(builder: &mut ProcedureCatalogBuilder, deps: &ProcedureDeps) -> Result<(), CatalogError> {
    let secrets_put = deps.secrets.clone();
    let secrets_get = deps.secrets.clone();
    let secrets_list = deps.secrets.clone();
    let secrets_delete = deps.secrets.clone();

    builder
        .register(
            ProcedureSpec::new("secrets.put", ProcedureKind::Mutation, move |principal: Principal, params: Value| {
                let secrets = secrets_put.clone();
                async move {
                    let user_id = require_user(&principal)?;
                    let provider = params["provider"].as_str().ok_or_else(|| invalid("provider"))?;
                    let plaintext = params["api_key"].as_str().ok_or_else(|| invalid("api_key"))?;
                    secrets
                        .put(&user_id, provider, plaintext)
                        .await
                        .map_err(|e| GatewayError::internal(e.to_string()))?;
                    Ok(json!({ "ok": true }))
                }
            })
            .with_required_scopes(ScopeRequirement::all_of(["secrets:manage"]))
            .with_tool_visibility(ToolVisibility::Hidden),
        )?
        .register(
            ProcedureSpec::new("secrets.list", ProcedureKind::Query, move |principal: Principal, _params: Value| {
                let secrets = secrets_list.clone();
                async move {
                    let user_id = require_user(&principal)?;
                    let providers = secrets
                        .list_providers(&user_id)
                        .await
                        .map_err(|e| GatewayError::internal(e.to_string()))?;
                    Ok(json!({ "providers": providers }))
                }
            })
            .with_required_scopes(ScopeRequirement::all_of(["secrets:manage"]))
            .with_tool_visibility(ToolVisibility::Hidden),
        )?
        .register(
            ProcedureSpec::new("secrets.delete", ProcedureKind::Mutation, move |principal: Principal, params: Value| {
                let secrets = secrets_delete.clone();
                async move {
                    let user_id = require_user(&principal)?;
                    let provider = params["provider"].as_str().ok_or_else(|| invalid("provider"))?;
                    secrets
                        .delete(&user_id, provider)
                        .await
                        .map_err(|e| GatewayError::internal(e.to_string()))?;
                    Ok(json!({ "ok": true }))
                }
            })
            .with_required_scopes(ScopeRequirement::all_of(["secrets:manage"]))
            .with_tool_visibility(ToolVisibility::Hidden),
        )?;

    // `secrets.get` is intentionally absent from the catalog: the contract
    // (spec §4.D) exposes decrypted plaintext only to the executor's own
    // key-resolution step, never to a caller over either protocol surface.
    let _ = secrets_get;
    Ok(())
}

fn require_user(principal: &Principal) -> Result<String, GatewayError> {
    principal
        .user_id()
        .map(str::to_string)
        .ok_or_else(|| GatewayError::unauthorized("this procedure requires an authenticated user"))
}

fn invalid(field: &str) -> GatewayError {
    GatewayError::invalid_params(format!("'{field}' is required"))
}
