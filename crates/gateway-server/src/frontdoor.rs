//! The dual-protocol front door (spec §4.B): the envelope surface (one POST
//! handler keyed by `method`) and the typed surface (one route per
//! procedure name). Both call `ProcedureCatalog::Procedure::invoke`
//! directly, so there is no path for them to diverge in behavior.

use crate::error::{http_status_for, TypedError};
use crate::principal::PrincipalExtractor;
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gateway_catalog::CatalogSchema;
use gateway_protocol::{
    EnvelopeError, EnvelopeRequest, EnvelopeResponse, ErrorKind, GatewayError, Principal, RequestId, ResponseId,
};
use serde_json::Value;

fn valid_method_charset(method: &str) -> bool {
    !method.is_empty() && method.chars().all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_')
}

/// Validation order per spec §4.B: shape (handled by the `Json` extractor
/// itself; a body that doesn't even parse never reaches this function) ->
/// method charset -> params is object-or-absent -> method exists -> scopes
/// satisfied -> dispatch.
async fn dispatch(state: &AppState, principal: Principal, method: &str, params: Option<Value>) -> Result<Value, GatewayError> {
    if !valid_method_charset(method) {
        return Err(GatewayError::invalid_request(
            "method must match ^[A-Za-z0-9._]+$",
        ));
    }
    let params = match params {
        None => Value::Object(Default::default()),
        Some(Value::Object(map)) => Value::Object(map),
        Some(_) => return Err(GatewayError::invalid_request("params must be an object when present")),
    };

    let procedure = state
        .catalog
        .lookup(method)
        .map_err(|_| GatewayError::not_found(format!("unknown method '{method}'")))?;

    if !procedure.required_scopes.satisfied_by(principal.scopes()) {
        if principal.is_anonymous() && !procedure.required_scopes.is_empty() {
            return Err(GatewayError::unauthorized(format!(
                "authentication is required to call '{method}'"
            )));
        }
        return Err(gateway_catalog::forbidden_for(method));
    }

    procedure.invoke(principal, params).await
}

/// `POST /rpc`: `{version, id, method, params}` -> `{id, result}` or
/// `{id, error}`. Always HTTP 200 except for bodies that fail to parse at
/// all (spec §4.B).
async fn envelope_handler(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    body: axum::body::Bytes,
) -> Response {
    let request: EnvelopeRequest = match serde_json::from_slice(&body) {
        Ok(req) => req,
        Err(err) => {
            let error = EnvelopeError::new(ErrorKind::Parse, format!("invalid envelope body: {err}"));
            return (axum::http::StatusCode::BAD_REQUEST, Json(EnvelopeResponse::error(ResponseId::null(), error)))
                .into_response();
        }
    };

    if request.version != gateway_protocol::envelope::ENVELOPE_VERSION {
        let error = EnvelopeError::new(ErrorKind::InvalidRequest, "unsupported envelope version");
        return Json(EnvelopeResponse::error(ResponseId::from_request(request.id), error)).into_response();
    }

    match dispatch(&state, principal, &request.method, request.params).await {
        Ok(result) => Json(EnvelopeResponse::success(request.id, result)).into_response(),
        Err(err) => {
            let mut error = EnvelopeError::new(err.kind, err.message);
            if let Some(data) = err.data {
                error = error.with_data(data);
            }
            Json(EnvelopeResponse::error(ResponseId::from_request(request.id), error)).into_response()
        }
    }
}

/// `GET /openrpc.json`: the discovery document the bridge compiles from the
/// frozen catalog (spec §4.B "thin bridge").
async fn discovery_handler(State(state): State<AppState>) -> Json<CatalogSchema> {
    Json(state.catalog.describe_for_discovery())
}

/// One path-per-procedure handler for the typed surface (spec §4.B). The
/// procedure name arrives as a path parameter rather than a `method` field,
/// but reaches the exact same [`dispatch`] function as the envelope surface.
async fn typed_handler(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(name): Path<String>,
    body: axum::body::Bytes,
) -> Result<Json<Value>, TypedError> {
    let params: Option<Value> = if body.is_empty() {
        None
    } else {
        Some(serde_json::from_slice(&body).map_err(|e| TypedError {
            error: GatewayError::invalid_request(format!("invalid JSON body: {e}")),
            development_mode: state.config.development_mode,
        })?)
    };

    dispatch(&state, principal, &name, params)
        .await
        .map(Json)
        .map_err(|error| TypedError {
            error,
            development_mode: state.config.development_mode,
        })
}

/// Builds the envelope-surface router: `POST <rpc_path>` plus the discovery
/// document. Mounted at the configured path (default `/rpc`); discovery is
/// always served at the fixed well-known path regardless of `paths.rpc`.
pub fn envelope_router(rpc_path: &str) -> Router<AppState> {
    Router::new()
        .route(rpc_path, post(envelope_handler))
        .route("/openrpc.json", get(discovery_handler))
}

/// Builds the typed-surface router: one path per registered procedure name
/// under `<trpc_prefix>/<name>`, built once at server-construction time by
/// iterating the frozen catalog (spec §4.B: "generated by iterating the
/// frozen catalog at server-build time").
pub fn typed_router(catalog: &gateway_catalog::ProcedureCatalog, trpc_prefix: &str) -> Router<AppState> {
    let mut router = Router::new();
    for procedure in catalog.list_procedures() {
        let path = format!("{trpc_prefix}/{}", procedure.name);
        let route = match procedure.kind {
            gateway_catalog::ProcedureKind::Query => get(typed_handler),
            gateway_catalog::ProcedureKind::Mutation => post(typed_handler),
        };
        router = router.route(&path, route);
    }
    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_method_with_invalid_characters() {
        assert!(!valid_method_charset("bad method!"));
        assert!(valid_method_charset("generateText"));
        assert!(valid_method_charset("secrets.put"));
        assert!(valid_method_charset("wallet_get"));
    }
}
