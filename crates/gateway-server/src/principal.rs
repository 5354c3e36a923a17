//! Extracts a [`Principal`] from the `Authorization` header on every route
//! that needs one (spec §4.C: "Middleware extracts `Authorization: Bearer
//! <token>`, resolves it to a `Principal`, attaches it to the request").

use crate::state::AppState;
use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use gateway_auth::bearer;
use gateway_protocol::{GatewayError, Principal};

/// An extractor wrapper so handlers can take `PrincipalExtractor` as an
/// argument and get back a resolved [`Principal`] (or an error response)
/// without repeating the header lookup.
pub struct PrincipalExtractor(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for PrincipalExtractor {
    type Rejection = crate::error::TypedError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header_value = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());
        let principal = resolve(header_value, &state.auth).map_err(|error| crate::error::TypedError {
            error,
            development_mode: state.config.development_mode,
        })?;
        Ok(PrincipalExtractor(principal))
    }
}

fn resolve(header_value: Option<&str>, store: &gateway_auth::AuthStore) -> Result<Principal, GatewayError> {
    bearer::resolve_header(header_value, store)
}

/// Best-effort client identity for rate limiting: the first
/// `X-Forwarded-For` hop when `trust_proxy` is set, else the immediate peer
/// address, else the principal's own identity as a fallback key.
pub fn rate_limit_identity(
    headers: &axum::http::HeaderMap,
    trust_proxy: bool,
    peer: Option<std::net::SocketAddr>,
    principal: &Principal,
) -> String {
    if trust_proxy {
        if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
            if let Some(first) = forwarded.split(',').next() {
                return first.trim().to_string();
            }
        }
    }
    if let Some(addr) = peer {
        return addr.ip().to_string();
    }
    match principal {
        Principal::OAuth { user_id, .. } => user_id.clone(),
        Principal::Service { key_id, .. } => key_id.clone(),
        Principal::Anonymous => "anonymous".to_string(),
    }
}
