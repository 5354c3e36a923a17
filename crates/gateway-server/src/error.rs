//! HTTP rendering of [`GatewayError`]. The envelope surface (§4.B) renders
//! every error as HTTP 200 with a JSON-RPC-shaped body except parse
//! failures; the typed surface renders the same [`ErrorKind`] as an HTTP
//! status code instead, per spec §4.B: "a difference in any behavior
//! between them is a bug" — only the *encoding* differs, never the kind.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use gateway_protocol::{ErrorKind, GatewayError};
use serde_json::json;

/// Maps an [`ErrorKind`] to the HTTP status the typed surface (and any
/// non-envelope route) renders it as.
pub fn http_status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Parse => StatusCode::BAD_REQUEST,
        ErrorKind::InvalidRequest => StatusCode::BAD_REQUEST,
        ErrorKind::MethodNotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidParams => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::QuotaExceeded => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::ModelNotAllowed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::NoCredentials => StatusCode::UNAUTHORIZED,
        ErrorKind::UpstreamUnauthorized => StatusCode::BAD_GATEWAY,
        ErrorKind::UpstreamRateLimited => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::UpstreamError => StatusCode::BAD_GATEWAY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Wraps a [`GatewayError`] so it can be returned directly from a typed
/// handler. Internal-error messages are redacted unless `development_mode`
/// is set (spec §7: "data may carry the detail only when the server is
/// configured for development mode").
pub struct TypedError {
    pub error: GatewayError,
    pub development_mode: bool,
}

impl IntoResponse for TypedError {
    fn into_response(self) -> Response {
        let status = http_status_for(self.error.kind);
        let message = if self.error.kind == ErrorKind::Internal && !self.development_mode {
            "internal server error".to_string()
        } else {
            self.error.message.clone()
        };
        let body = json!({
            "error": {
                "kind": self.error.kind,
                "message": message,
                "data": if self.development_mode { self.error.data } else { None },
            }
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_401() {
        assert_eq!(http_status_for(ErrorKind::Unauthorized), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn quota_exceeded_maps_to_402() {
        assert_eq!(http_status_for(ErrorKind::QuotaExceeded), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn rate_limited_maps_to_429() {
        assert_eq!(http_status_for(ErrorKind::RateLimited), StatusCode::TOO_MANY_REQUESTS);
    }
}
