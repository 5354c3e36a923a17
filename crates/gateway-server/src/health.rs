//! `GET /health` (spec §6): a plain, unauthenticated liveness endpoint
//! mounted at the configured `paths.health`, distinct from the catalog's
//! `health` RPC method — this one never goes through scope checks or
//! either protocol surface, so a load balancer can hit it with nothing
//! but a bare GET.

use crate::state::AppState;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

async fn health_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "protocols": {
            "envelope": state.config.protocols.envelope,
            "typed": state.config.protocols.typed,
            "mcp": state.config.mcp.enabled,
        },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub fn router(health_path: &str) -> Router<AppState> {
    Router::new().route(health_path, get(health_handler))
}
