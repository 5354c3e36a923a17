//! `POST /webhooks/<provider>` (spec §4.J/§6): HMAC-verified payment
//! notifications that credit the virtual-token ledger. Signature
//! verification happens before any ledger call; a mismatch is a hard 401
//! with no mutation (spec §8).

use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use gateway_ledger::webhook::verify_signature;
use serde::Deserialize;
use serde_json::json;

/// Payload shape this gateway expects from a payment provider's webhook.
/// Field names are illustrative (spec §6 leaves the body provider-specific)
/// but the idempotency contract (`payment_id`) and ledger inputs
/// (`amount_cents`, `currency`, `tokens`) are normative.
#[derive(Debug, Deserialize)]
struct WebhookPayload {
    user_id: String,
    payment_id: String,
    amount_cents: i64,
    #[serde(default = "default_currency")]
    currency: String,
    tokens: i64,
}

fn default_currency() -> String {
    "usd".to_string()
}

async fn webhook_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let Some(secret) = state.config.token_tracking.webhook_secret.as_ref() else {
        tracing::error!(provider = %provider, "webhook received but no webhook_secret is configured");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "webhooks are not configured" }))).into_response();
    };

    let signature_header = headers.get("x-signature").and_then(|v| v.to_str().ok());
    if let Err(err) = verify_signature(secret.as_bytes(), &body, signature_header) {
        tracing::warn!(provider = %provider, error = %err, "webhook signature verification failed");
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "signature verification failed" }))).into_response();
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(p) => p,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("malformed webhook payload: {err}") })),
            )
                .into_response()
        }
    };

    let raw: serde_json::Value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    match state
        .ledger
        .credit(
            &payload.user_id,
            payload.tokens,
            &payload.payment_id,
            payload.amount_cents,
            &payload.currency,
            raw,
        )
        .await
    {
        Ok(outcome) => Json(json!({ "ok": true, "first_time": outcome.first_time })).into_response(),
        Err(err) => {
            tracing::error!(provider = %provider, error = %err, "ledger credit failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "internal error" }))).into_response()
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{provider}", post(webhook_handler))
}
