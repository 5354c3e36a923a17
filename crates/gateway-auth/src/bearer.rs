//! Bearer-token extraction and resolution to a [`Principal`] (spec §4.C:
//! "Middleware extracts `Authorization: Bearer <token>`, resolves it to a
//! `Principal`, attaches it to the request, and never leaks tokens in
//! logs.").

use crate::store::AuthStore;
use gateway_protocol::{GatewayError, Principal};

/// Pulls the token out of an `Authorization` header value. Returns `None`
/// for anything that isn't exactly `Bearer <token>` so the caller can treat
/// "absent" and "malformed" identically as anonymous/unauthorized per
/// call-site policy (spec §8: "Bearer present but malformed -> unauthorized").
pub fn extract(header_value: &str) -> Option<&str> {
    let rest = header_value.strip_prefix("Bearer ")?;
    let token = rest.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Resolves a bearer token to a [`Principal`]. Never includes the token
/// itself in the returned error so call sites can log the error safely.
pub fn resolve(token: &str, store: &AuthStore) -> Result<Principal, GatewayError> {
    let access = store
        .lookup_token(token)
        .map_err(|_| GatewayError::unauthorized("invalid or expired bearer token"))?;
    Ok(Principal::OAuth {
        user_id: access.user_id,
        email: access.email,
        scopes: access.scopes,
        preferred_provider: None,
    })
}

/// Resolves the raw `Authorization` header, treating a missing or malformed
/// header as [`Principal::Anonymous`] rather than an error — callers that
/// require auth enforce that via [`crate::scope::require`] or an explicit
/// check on the resulting principal.
pub fn resolve_header(header_value: Option<&str>, store: &AuthStore) -> Result<Principal, GatewayError> {
    match header_value.and_then(extract) {
        None => Ok(Principal::Anonymous),
        Some(token) => resolve(token, store),
    }
}
