//! `POST /mcp` (spec §4.H/§6): `initialize`, `tools/list`, `tools/call`,
//! `ping`, `notifications/progress`. Errors reuse the envelope-protocol
//! codes via [`gateway_protocol::GatewayError`].

use crate::principal::PrincipalExtractor;
use crate::state::AppState;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use gateway_protocol::{ErrorKind, GatewayError};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct McpRequest {
    #[serde(default)]
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

fn mcp_error_response(id: Option<Value>, kind: ErrorKind, message: String) -> Json<Value> {
    Json(json!({
        "id": id,
        "error": { "code": kind.envelope_code(), "message": message },
    }))
}

fn mcp_success(id: Option<Value>, result: Value) -> Json<Value> {
    Json(json!({ "id": id, "result": result }))
}

async fn mcp_handler(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Json(request): Json<McpRequest>,
) -> Response {
    match request.method.as_str() {
        "initialize" => {
            let requested_version = request
                .params
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let result = state.mcp.initialize(requested_version);
            mcp_success(request.id, serde_json::to_value(result).unwrap_or_default()).into_response()
        }
        "ping" => mcp_success(request.id, json!({})).into_response(),
        "notifications/progress" => {
            // Fire-and-forget acknowledgement; the gateway does not track
            // tool-server-side progress state beyond relaying it.
            mcp_success(request.id, json!({})).into_response()
        }
        "tools/list" => match state.mcp.tools_list(&principal) {
            Ok(result) => mcp_success(request.id, serde_json::to_value(result).unwrap_or_default()).into_response(),
            Err(err) => mcp_error_response(request.id, err.kind, err.message).into_response(),
        },
        "tools/call" => {
            let name = match request.params.get("name").and_then(Value::as_str) {
                Some(n) => n.to_string(),
                None => {
                    return mcp_error_response(
                        request.id,
                        ErrorKind::InvalidParams,
                        "tools/call requires a 'name' field".to_string(),
                    )
                    .into_response()
                }
            };
            let arguments = request.params.get("arguments").cloned().unwrap_or(Value::Null);
            match state.mcp.tools_call(&principal, &name, arguments).await {
                Ok(result) => mcp_success(request.id, serde_json::to_value(result).unwrap_or_default()).into_response(),
                Err(err) => mcp_error_response(request.id, err.kind, err.message).into_response(),
            }
        }
        other => {
            let err = GatewayError::not_found(format!("unknown MCP method '{other}'"));
            mcp_error_response(request.id, err.kind, err.message).into_response()
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/mcp", post(mcp_handler))
}
