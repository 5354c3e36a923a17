//! The four well-known discovery documents plus JWKS (spec §4.C/§6).
//! Handlers in `gateway-server` are responsible for CORS preflight on these
//! routes; this module only builds the document bodies.

use serde_json::{json, Value};

pub fn authorization_server_metadata(base_url: &str) -> Value {
    json!({
        "issuer": base_url,
        "authorization_endpoint": format!("{base_url}/authorize"),
        "token_endpoint": format!("{base_url}/token"),
        "registration_endpoint": format!("{base_url}/oauth/register"),
        "response_types_supported": ["code"],
        "grant_types_supported": ["authorization_code", "refresh_token"],
        "code_challenge_methods_supported": ["S256", "plain"],
        "token_endpoint_auth_methods_supported": ["client_secret_basic", "none"],
    })
}

pub fn protected_resource_metadata(base_url: &str) -> Value {
    json!({
        "resource": base_url,
        "authorization_servers": [base_url],
        "bearer_methods_supported": ["header"],
    })
}

pub fn openid_configuration(base_url: &str) -> Value {
    let mut metadata = authorization_server_metadata(base_url);
    if let Value::Object(ref mut map) = metadata {
        map.insert("jwks_uri".into(), json!(format!("{base_url}/.well-known/jwks.json")));
        map.insert("subject_types_supported".into(), json!(["public"]));
        map.insert("id_token_signing_alg_values_supported".into(), json!(["none"]));
    }
    metadata
}

/// The gateway issues opaque, server-stored access tokens rather than
/// self-contained signed JWTs, so there is no signing key material to
/// publish; an empty key set is the correct document, not a placeholder.
pub fn jwks() -> Value {
    json!({ "keys": [] })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorization_server_metadata_points_at_the_root_level_endpoints() {
        let doc = authorization_server_metadata("https://gateway.example");
        assert_eq!(doc["token_endpoint"], "https://gateway.example/token");
        assert_eq!(doc["authorization_endpoint"], "https://gateway.example/authorize");
    }

    #[test]
    fn jwks_is_an_empty_key_set() {
        assert_eq!(jwks()["keys"].as_array().unwrap().len(), 0);
    }
}
