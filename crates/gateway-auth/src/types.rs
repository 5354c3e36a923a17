//! Data model for the authorization server: clients, authorization codes and
//! issued tokens.

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

/// A dynamically registered OAuth client (RFC 7591). Confidential vs public
/// is distinguished by `secret` being present.
#[derive(Debug, Clone)]
pub struct OAuthClient {
    pub client_id: String,
    pub secret: Option<String>,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub client_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl OAuthClient {
    pub fn allows_redirect(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|u| u == redirect_uri)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PkceMethod {
    S256,
    Plain,
}

impl PkceMethod {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "S256" => Some(Self::S256),
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }
}

/// A one-shot authorization code, issued at `/authorize` and consumed at
/// `/token`. `consumed` makes the second exchange of the same code a hard
/// failure rather than silently re-issuing a token.
#[derive(Debug, Clone)]
pub struct AuthCode {
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub scopes: BTreeSet<String>,
    pub code_challenge: String,
    pub code_challenge_method: PkceMethod,
    pub user_id: String,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
}

impl AuthCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// An issued access token. Lookup is by `token` string, kept as the map key
/// in [`crate::store::AuthStore`] rather than a field here.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub user_id: String,
    pub email: Option<String>,
    pub scopes: BTreeSet<String>,
    pub client_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: String,
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug, Clone)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub refresh_token: String,
    pub scope: String,
}
