//! Dynamic Client Registration, server side (RFC 7591). Unlike a client-side
//! DCR library, this module *issues* registrations rather than consuming
//! someone else's endpoint.

use crate::error::AuthError;
use crate::store::AuthStore;
use crate::types::OAuthClient;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationRequest {
    pub redirect_uris: Vec<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub grant_types: Option<Vec<String>>,
    #[serde(default)]
    pub token_endpoint_auth_method: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationResponse {
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    pub client_id_issued_at: i64,
    pub redirect_uris: Vec<String>,
    pub grant_types: Vec<String>,
    pub token_endpoint_auth_method: String,
}

fn valid_redirect_uri(uri: &str) -> bool {
    let Ok(parsed) = Url::parse(uri) else {
        return false;
    };
    let loopback = matches!(parsed.host_str(), Some("localhost") | Some("127.0.0.1"));
    parsed.scheme() == "https" || loopback
}

/// Registers a new client. Every `redirect_uri` must parse as an absolute
/// URL (spec §4.C: "redirect-URI allow-list enforced"); public clients (no
/// secret) are created when `token_endpoint_auth_method` is `"none"`.
pub fn register(store: &AuthStore, request: RegistrationRequest) -> Result<RegistrationResponse, AuthError> {
    if request.redirect_uris.is_empty() {
        return Err(AuthError::InvalidRequest("redirect_uris must not be empty"));
    }
    if !request.redirect_uris.iter().all(|u| valid_redirect_uri(u)) {
        return Err(AuthError::InvalidRequest("redirect_uris contains an invalid URI"));
    }

    let auth_method = request
        .token_endpoint_auth_method
        .unwrap_or_else(|| "client_secret_basic".to_string());
    let is_public = auth_method == "none";

    let client_id = uuid::Uuid::new_v4().to_string();
    let secret = if is_public {
        None
    } else {
        Some(uuid::Uuid::new_v4().to_string())
    };
    let grant_types = request
        .grant_types
        .unwrap_or_else(|| vec!["authorization_code".to_string(), "refresh_token".to_string()]);

    let client = OAuthClient {
        client_id: client_id.clone(),
        secret: secret.clone(),
        redirect_uris: request.redirect_uris.clone(),
        grant_types: grant_types.clone(),
        client_name: request.client_name,
        created_at: Utc::now(),
    };
    let issued_at = client.created_at.timestamp();
    store.register_client(client);

    Ok(RegistrationResponse {
        client_id,
        client_secret: secret,
        client_id_issued_at: issued_at,
        redirect_uris: request.redirect_uris,
        grant_types,
        token_endpoint_auth_method: auth_method,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registers_a_confidential_client_by_default() {
        let store = AuthStore::new();
        let response = register(
            &store,
            RegistrationRequest {
                redirect_uris: vec!["https://app.example/callback".into()],
                client_name: Some("Test App".into()),
                grant_types: None,
                token_endpoint_auth_method: None,
            },
        )
        .unwrap();
        assert!(response.client_secret.is_some());
        let stored = store.get_client(&response.client_id).unwrap();
        assert!(stored.allows_redirect("https://app.example/callback"));
    }

    #[test]
    fn public_client_has_no_secret() {
        let store = AuthStore::new();
        let response = register(
            &store,
            RegistrationRequest {
                redirect_uris: vec!["http://127.0.0.1:8080/callback".into()],
                client_name: None,
                grant_types: None,
                token_endpoint_auth_method: Some("none".into()),
            },
        )
        .unwrap();
        assert!(response.client_secret.is_none());
    }

    #[test]
    fn rejects_non_url_redirect_uris() {
        let store = AuthStore::new();
        let err = register(
            &store,
            RegistrationRequest {
                redirect_uris: vec!["not a url".into()],
                client_name: None,
                grant_types: None,
                token_endpoint_auth_method: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, AuthError::InvalidRequest(_)));
    }
}
