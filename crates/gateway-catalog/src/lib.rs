//! The procedure catalog: a single registry of callable operations that both
//! protocol surfaces (envelope and typed) dispatch into.
//!
//! Registration happens once, at server build time, through
//! [`ProcedureCatalogBuilder`]. Calling [`ProcedureCatalogBuilder::freeze`]
//! turns the builder into an immutable, `Arc`-shared [`ProcedureCatalog`];
//! there is no path back to a mutable builder, so "the catalog changed after
//! the server started accepting requests" is not a state this type can
//! represent.

mod handler;

pub use handler::{HandlerFuture, HandlerResult, ProcedureHandler};

use gateway_protocol::{GatewayError, Principal, ScopeRequirement};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Whether a procedure is idempotent (`query`) or not (`mutation`); mirrors
/// the typed surface's idempotent/non-idempotent request distinction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcedureKind {
    Query,
    Mutation,
}

/// Whether a procedure is exposed on the MCP tool surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolVisibility {
    Hidden,
    Public,
    Scoped,
}

/// A registered operation: metadata plus the handler that both surfaces call.
#[derive(Clone)]
pub struct Procedure {
    pub name: String,
    pub kind: ProcedureKind,
    pub input_schema: Value,
    pub required_scopes: ScopeRequirement,
    pub tool_visibility: ToolVisibility,
    pub description: Option<String>,
    handler: Arc<dyn ProcedureHandler>,
}

impl std::fmt::Debug for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedure")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("tool_visibility", &self.tool_visibility)
            .finish_non_exhaustive()
    }
}

impl Procedure {
    /// Invoke this procedure's handler directly. Callers on both surfaces
    /// funnel through this one method so there is no way for the two
    /// surfaces to diverge in behavior.
    pub fn invoke(&self, principal: Principal, params: Value) -> HandlerFuture {
        self.handler.call(principal, params)
    }
}

/// A procedure awaiting registration. Built with [`ProcedureSpec::new`] and
/// handed to [`ProcedureCatalogBuilder::register`].
pub struct ProcedureSpec {
    pub name: String,
    pub kind: ProcedureKind,
    pub input_schema: Value,
    pub required_scopes: ScopeRequirement,
    pub tool_visibility: ToolVisibility,
    pub description: Option<String>,
    pub handler: Arc<dyn ProcedureHandler>,
}

impl ProcedureSpec {
    pub fn new(
        name: impl Into<String>,
        kind: ProcedureKind,
        handler: impl ProcedureHandler + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            input_schema: Value::Object(Default::default()),
            required_scopes: ScopeRequirement::none(),
            tool_visibility: ToolVisibility::Hidden,
            description: None,
            handler: Arc::new(handler),
        }
    }

    pub fn with_input_schema(mut self, schema: Value) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_required_scopes(mut self, scopes: ScopeRequirement) -> Self {
        self.required_scopes = scopes;
        self
    }

    pub fn with_tool_visibility(mut self, visibility: ToolVisibility) -> Self {
        self.tool_visibility = visibility;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("procedure name '{0}' does not match ^[A-Za-z0-9._]+$")]
    InvalidName(String),
    #[error("procedure '{0}' is already registered")]
    DuplicateProcedure(String),
    #[error("catalog is already frozen; no further registration is possible")]
    AlreadyFrozen,
    #[error("procedure '{0}' not found")]
    NotFound(String),
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

/// Accumulates [`ProcedureSpec`]s before the server starts accepting
/// requests. Not `Clone`; once [`freeze`](Self::freeze) is called the
/// builder is consumed.
#[derive(Default)]
pub struct ProcedureCatalogBuilder {
    procedures: HashMap<String, Procedure>,
}

impl ProcedureCatalogBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, spec: ProcedureSpec) -> Result<&mut Self, CatalogError> {
        if !valid_name(&spec.name) {
            return Err(CatalogError::InvalidName(spec.name));
        }
        if self.procedures.contains_key(&spec.name) {
            return Err(CatalogError::DuplicateProcedure(spec.name));
        }
        self.procedures.insert(
            spec.name.clone(),
            Procedure {
                name: spec.name,
                kind: spec.kind,
                input_schema: spec.input_schema,
                required_scopes: spec.required_scopes,
                tool_visibility: spec.tool_visibility,
                description: spec.description,
                handler: spec.handler,
            },
        );
        Ok(self)
    }

    pub fn freeze(self) -> ProcedureCatalog {
        ProcedureCatalog {
            inner: Arc::new(CatalogInner {
                procedures: self.procedures,
            }),
        }
    }
}

struct CatalogInner {
    procedures: HashMap<String, Procedure>,
}

/// The frozen, shareable catalog every request-handling component holds a
/// clone of. Cloning is an `Arc` bump; there is no interior mutability, so
/// no lock is needed for lookups: the catalog is frozen after
/// startup and reads never contend with a writer.
#[derive(Clone)]
pub struct ProcedureCatalog {
    inner: Arc<CatalogInner>,
}

impl ProcedureCatalog {
    pub fn list_procedures(&self) -> Vec<&Procedure> {
        self.inner.procedures.values().collect()
    }

    pub fn lookup(&self, name: &str) -> Result<&Procedure, CatalogError> {
        self.inner
            .procedures
            .get(name)
            .ok_or_else(|| CatalogError::NotFound(name.to_string()))
    }

    /// Procedures eligible for the MCP tool surface, i.e. everything whose
    /// `tool_visibility != hidden`.
    pub fn tool_visible_procedures(&self) -> Vec<&Procedure> {
        self.inner
            .procedures
            .values()
            .filter(|p| p.tool_visibility != ToolVisibility::Hidden)
            .collect()
    }

    /// Discovery document consumed by the `/openrpc.json` endpoint and by
    /// `tools/list`.
    pub fn describe_for_discovery(&self) -> CatalogSchema {
        CatalogSchema {
            methods: self
                .inner
                .procedures
                .values()
                .map(|p| MethodSchema {
                    name: p.name.clone(),
                    kind: p.kind,
                    input_schema: p.input_schema.clone(),
                    description: p.description.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MethodSchema {
    pub name: String,
    pub kind: ProcedureKind,
    pub input_schema: Value,
    pub description: Option<String>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CatalogSchema {
    pub methods: Vec<MethodSchema>,
}

/// Convenience conversion used by handlers that want to return `forbidden`
/// directly when `required_scopes` isn't satisfied. Kept here rather than in
/// `gateway-protocol` since it is catalog-specific phrasing.
pub fn forbidden_for(procedure_name: &str) -> GatewayError {
    GatewayError::forbidden(format!(
        "principal lacks required scopes for '{procedure_name}'"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_protocol::ErrorKind;

    struct Echo;

    impl ProcedureHandler for Echo {
        fn call(&self, _principal: Principal, params: Value) -> HandlerFuture {
            Box::pin(async move { Ok(params) })
        }
    }

    #[test]
    fn rejects_invalid_names() {
        let mut builder = ProcedureCatalogBuilder::new();
        let spec = ProcedureSpec::new("bad name!", ProcedureKind::Query, Echo);
        assert!(matches!(
            builder.register(spec),
            Err(CatalogError::InvalidName(_))
        ));
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut builder = ProcedureCatalogBuilder::new();
        builder
            .register(ProcedureSpec::new("health", ProcedureKind::Query, Echo))
            .unwrap();
        let dup = builder.register(ProcedureSpec::new("health", ProcedureKind::Query, Echo));
        assert!(matches!(dup, Err(CatalogError::DuplicateProcedure(_))));
    }

    #[test]
    fn frozen_catalog_looks_up_by_name() {
        let mut builder = ProcedureCatalogBuilder::new();
        builder
            .register(ProcedureSpec::new("health", ProcedureKind::Query, Echo))
            .unwrap();
        let catalog = builder.freeze();
        assert!(catalog.lookup("health").is_ok());
        assert!(matches!(
            catalog.lookup("missing"),
            Err(CatalogError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn both_surfaces_invoke_the_identical_handler() {
        let mut builder = ProcedureCatalogBuilder::new();
        builder
            .register(ProcedureSpec::new("echo", ProcedureKind::Query, Echo))
            .unwrap();
        let catalog = builder.freeze();
        let procedure = catalog.lookup("echo").unwrap();

        let via_envelope = procedure
            .invoke(Principal::Anonymous, serde_json::json!({"a": 1}))
            .await
            .unwrap();
        let via_typed = procedure
            .invoke(Principal::Anonymous, serde_json::json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(via_envelope, via_typed);
    }

    #[test]
    fn forbidden_error_has_forbidden_kind() {
        let err = forbidden_for("generateText");
        assert_eq!(err.kind, ErrorKind::Forbidden);
    }
}
