//! MCP tool-discovery-and-invocation surface (spec §4.H), adapted from the
//! teacher's `tools/list` + `tools/call` routing pair and generalized so
//! the "tool list" is the procedure catalog (§4.A) filtered by
//! `tool_visibility` instead of a macro-registered handler set.
//!
//! Three operations: `initialize`, `tools/list`, `tools/call`. Errors reuse
//! the envelope surface's [`ErrorKind`] codes (spec §4.H: "Errors are
//! envelope-protocol codes").

use gateway_catalog::{ProcedureCatalog, ToolVisibility};
use gateway_protocol::{GatewayError, Principal};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct McpConfig {
    pub require_for_list: bool,
    pub require_for_call: bool,
    /// Procedure names that bypass the normal scope policy for read-only
    /// discovery or sample tools (spec §4.B/§4.H: "a public-tools list in
    /// server config may override per-procedure scopes").
    pub public_tools: HashSet<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitializeResult {
    /// Echoed back verbatim; the spec is explicit that "version echoing is
    /// lax (accept any)" so this carries whatever the client sent with no
    /// validation.
    pub protocol_version: String,
    pub capabilities: Value,
    pub server_info: ServerInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolsListResult {
    pub tools: Vec<McpTool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolsCallResult {
    pub result: Value,
}

pub struct McpSurface {
    catalog: ProcedureCatalog,
    config: McpConfig,
    server_info: ServerInfo,
}

impl McpSurface {
    pub fn new(catalog: ProcedureCatalog, config: McpConfig, server_info: ServerInfo) -> Self {
        Self {
            catalog,
            config,
            server_info,
        }
    }

    /// `initialize` accepts any protocol version string the client sends
    /// and never rejects the handshake on that basis (spec §9 open
    /// question: "the source's MCP 'initialize' accepts any protocol
    /// version string. This laxity is preserved.").
    pub fn initialize(&self, requested_protocol_version: &str) -> InitializeResult {
        InitializeResult {
            protocol_version: requested_protocol_version.to_string(),
            capabilities: serde_json::json!({ "tools": { "listChanged": false } }),
            server_info: self.server_info.clone(),
        }
    }

    pub fn tools_list(&self, principal: &Principal) -> Result<ToolsListResult, GatewayError> {
        if self.config.require_for_list && principal.is_anonymous() {
            return Err(GatewayError::unauthorized(
                "authentication is required to list tools",
            ));
        }

        let tools = self
            .catalog
            .tool_visible_procedures()
            .into_iter()
            .map(|p| McpTool {
                name: p.name.clone(),
                description: p.description.clone(),
                input_schema: p.input_schema.clone(),
            })
            .collect();
        Ok(ToolsListResult { tools })
    }

    pub async fn tools_call(
        &self,
        principal: &Principal,
        name: &str,
        arguments: Value,
    ) -> Result<ToolsCallResult, GatewayError> {
        if self.config.require_for_call && principal.is_anonymous() {
            return Err(GatewayError::unauthorized(
                "authentication is required to call tools",
            ));
        }

        let procedure = self
            .catalog
            .lookup(name)
            .map_err(|_| GatewayError::not_found(format!("unknown tool '{name}'")))?;

        if procedure.tool_visibility == ToolVisibility::Hidden {
            return Err(GatewayError::not_found(format!("unknown tool '{name}'")));
        }

        let bypasses_scopes =
            procedure.tool_visibility == ToolVisibility::Public || self.config.public_tools.contains(name);
        if !bypasses_scopes && !procedure.required_scopes.satisfied_by(principal.scopes()) {
            return Err(gateway_catalog::forbidden_for(name));
        }

        if !arguments.is_object() && !arguments.is_null() {
            return Err(GatewayError::invalid_params(
                "tool arguments must be a JSON object",
            ));
        }
        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments
        };

        let result = procedure.invoke(principal.clone(), arguments).await?;
        Ok(ToolsCallResult { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_catalog::{ProcedureCatalogBuilder, ProcedureHandler, ProcedureKind, ProcedureSpec};
    use gateway_catalog::HandlerFuture;
    use gateway_protocol::ScopeRequirement;

    struct Echo;
    impl ProcedureHandler for Echo {
        fn call(&self, _principal: Principal, params: Value) -> HandlerFuture {
            Box::pin(async move { Ok(params) })
        }
    }

    fn surface(config: McpConfig) -> McpSurface {
        let mut builder = ProcedureCatalogBuilder::new();
        builder
            .register(
                ProcedureSpec::new("search", ProcedureKind::Query, Echo)
                    .with_tool_visibility(ToolVisibility::Scoped)
                    .with_required_scopes(ScopeRequirement::all_of(["mcp:tools"])),
            )
            .unwrap();
        builder
            .register(
                ProcedureSpec::new("ping", ProcedureKind::Query, Echo)
                    .with_tool_visibility(ToolVisibility::Public),
            )
            .unwrap();
        builder
            .register(ProcedureSpec::new("internal_only", ProcedureKind::Query, Echo))
            .unwrap();
        McpSurface::new(
            builder.freeze(),
            config,
            ServerInfo {
                name: "gateway".into(),
                version: "0.1.0".into(),
            },
        )
    }

    #[test]
    fn initialize_echoes_any_protocol_version() {
        let surface = surface(McpConfig::default());
        let result = surface.initialize("2099-01-01");
        assert_eq!(result.protocol_version, "2099-01-01");
    }

    #[test]
    fn tools_list_excludes_hidden_procedures() {
        let surface = surface(McpConfig::default());
        let result = surface.tools_list(&Principal::Anonymous).unwrap();
        let names: Vec<_> = result.tools.iter().map(|t| t.name.as_str()).collect();
        assert!(names.contains(&"search"));
        assert!(names.contains(&"ping"));
        assert!(!names.contains(&"internal_only"));
    }

    #[tokio::test]
    async fn scoped_tool_requires_matching_scope() {
        let surface = surface(McpConfig::default());
        let err = surface
            .tools_call(&Principal::Anonymous, "search", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, gateway_protocol::ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn public_tool_bypasses_scope_check() {
        let surface = surface(McpConfig::default());
        let result = surface
            .tools_call(&Principal::Anonymous, "ping", serde_json::json!({}))
            .await
            .unwrap();
        assert_eq!(result.result, serde_json::json!({}));
    }

    #[tokio::test]
    async fn config_public_tools_overrides_scoped_requirement() {
        let mut config = McpConfig::default();
        config.public_tools.insert("search".to_string());
        let surface = surface(config);
        let result = surface
            .tools_call(&Principal::Anonymous, "search", serde_json::json!({"q":"x"}))
            .await
            .unwrap();
        assert_eq!(result.result, serde_json::json!({"q":"x"}));
    }

    #[tokio::test]
    async fn hidden_procedure_is_not_callable_as_a_tool() {
        let surface = surface(McpConfig::default());
        let err = surface
            .tools_call(&Principal::Anonymous, "internal_only", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, gateway_protocol::ErrorKind::MethodNotFound);
    }

    #[tokio::test]
    async fn require_for_call_rejects_anonymous() {
        let config = McpConfig {
            require_for_call: true,
            ..Default::default()
        };
        let surface = surface(config);
        let err = surface
            .tools_call(&Principal::Anonymous, "ping", serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.kind, gateway_protocol::ErrorKind::Unauthorized);
    }
}
