//! The authorization-code + PKCE flow itself: `/authorize` issuance and
//! `/token` exchange (spec §4.C).

use crate::error::AuthError;
use crate::pkce;
use crate::store::AuthStore;
use crate::types::{PkceMethod, TokenResponse};
use base64::Engine;
use std::collections::BTreeSet;

pub struct AuthorizeRequest {
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: BTreeSet<String>,
    pub code_challenge: String,
    pub code_challenge_method: String,
    /// Resolved by whatever authenticated the end user (a federated login
    /// callback, a dev-mode auto-login, etc); this module does not perform
    /// the login itself.
    pub user_id: String,
    pub email: Option<String>,
}

pub struct AuthorizeResult {
    pub redirect_uri: String,
    pub code: String,
}

/// Issues an `AuthCode` after validating the client and its redirect URI.
/// Does not perform the actual end-user login; callers invoke this once a
/// principal has already been established for the browser session.
pub fn authorize(store: &AuthStore, request: AuthorizeRequest) -> Result<AuthorizeResult, AuthError> {
    let client = store.get_client(&request.client_id)?;
    if !client.allows_redirect(&request.redirect_uri) {
        return Err(AuthError::RedirectUriMismatch);
    }
    let method = PkceMethod::parse(&request.code_challenge_method)
        .ok_or(AuthError::InvalidRequest("unsupported code_challenge_method"))?;
    if request.code_challenge.is_empty() {
        return Err(AuthError::InvalidRequest("code_challenge must not be empty"));
    }

    let code = store.issue_code(
        request.client_id,
        request.redirect_uri.clone(),
        request.scopes,
        request.code_challenge,
        method,
        request.user_id,
        request.email,
    );
    Ok(AuthorizeResult {
        redirect_uri: request.redirect_uri,
        code: code.code,
    })
}

pub struct TokenExchangeRequest {
    pub code: String,
    pub redirect_uri: String,
    pub client_id: String,
    pub code_verifier: String,
}

/// Exchanges a single-use `AuthCode` for an access/refresh token pair.
/// Verifier mismatch, wrong `redirect_uri`, or a second exchange of the same
/// code all surface as `invalid_grant` (spec §4.C).
pub fn exchange_code(store: &AuthStore, request: TokenExchangeRequest) -> Result<TokenResponse, AuthError> {
    let code = store.consume_code(&request.code)?;
    if code.client_id != request.client_id || code.redirect_uri != request.redirect_uri {
        return Err(AuthError::InvalidGrant("client_id or redirect_uri mismatch"));
    }
    if !pkce::verify(code.code_challenge_method, &request.code_verifier, &code.code_challenge) {
        return Err(AuthError::InvalidGrant("code_verifier does not match code_challenge"));
    }

    let access = store.issue_token(code.user_id, code.email, code.scopes, code.client_id);
    Ok(TokenResponse {
        access_token: access.token,
        token_type: "Bearer",
        expires_in: (access.expires_at - access.created_at).num_seconds(),
        refresh_token: access.refresh_token,
        scope: access.scopes.iter().cloned().collect::<Vec<_>>().join(" "),
    })
}

pub fn refresh_token(store: &AuthStore, refresh_token: &str) -> Result<TokenResponse, AuthError> {
    let access = store.rotate(refresh_token)?;
    Ok(TokenResponse {
        access_token: access.token,
        token_type: "Bearer",
        expires_in: (access.expires_at - access.created_at).num_seconds(),
        refresh_token: access.refresh_token,
        scope: access.scopes.iter().cloned().collect::<Vec<_>>().join(" "),
    })
}

/// Decodes and sanity-checks a federated-login `state` payload (spec §4.C:
/// "`state` must be validated (non-empty, decodes cleanly) before any side
/// effect is applied"). The decoded bytes are returned verbatim to the
/// caller, who owns interpreting them; this function only guards against a
/// blank or corrupt parameter reaching that point.
pub fn validate_state(state: &str) -> Result<Vec<u8>, AuthError> {
    if state.is_empty() {
        return Err(AuthError::InvalidState);
    }
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(state)
        .map_err(|_| AuthError::InvalidState)
}
