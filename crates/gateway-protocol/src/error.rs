//! Error taxonomy shared across every surface.
//!
//! Each component crate defines its own `thiserror` enum for its internal
//! failure modes, then converts into an [`ErrorKind`] at the boundary. The
//! envelope surface maps an `ErrorKind` to a numeric code; the typed surface
//! maps it to itself (it *is* the typed variant).

use serde::{Deserialize, Serialize};

/// The complete set of error kinds a caller can observe, independent of
/// which surface (envelope or typed) they used to reach the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Parse,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    Unauthorized,
    Forbidden,
    RateLimited,
    QuotaExceeded,
    ModelNotAllowed,
    NoCredentials,
    UpstreamUnauthorized,
    UpstreamRateLimited,
    UpstreamTimeout,
    UpstreamError,
    Internal,
}

impl ErrorKind {
    /// Numeric code used by the envelope surface.
    pub const fn envelope_code(self) -> i32 {
        match self {
            Self::Parse => -32700,
            Self::InvalidRequest => -32600,
            Self::MethodNotFound => -32601,
            Self::InvalidParams => -32602,
            Self::Internal => -32603,
            Self::Unauthorized => -32001,
            Self::Forbidden => -32002,
            Self::RateLimited => -32003,
            Self::QuotaExceeded => -32010,
            Self::ModelNotAllowed => -32011,
            Self::NoCredentials => -32012,
            Self::UpstreamUnauthorized => -32020,
            Self::UpstreamRateLimited => -32021,
            Self::UpstreamTimeout => -32022,
            Self::UpstreamError => -32023,
        }
    }

    /// Whether this kind is safe to retry automatically (used by the
    /// provider adapter's backoff and by callers deciding whether to retry
    /// the whole request).
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::UpstreamRateLimited | Self::UpstreamTimeout
        )
    }
}

/// A thin, cloneable error value that every layer can produce and that the
/// front door can render on either surface without knowing the origin
/// component. Component crates keep their own richer `thiserror` enums and
/// convert into this at the boundary (see each crate's `error.rs`).
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl GatewayError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            data: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidParams, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidRequest, message)
    }

    /// Alias kept for call sites that speak in terms of "this value failed
    /// validation" rather than "this parameter was invalid" — both map to
    /// the same [`ErrorKind::InvalidParams`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::invalid_params(message)
    }

    /// Alias for [`Self::unauthorized`] used by call sites phrased in terms
    /// of "authentication failed" rather than "the caller is unauthorized".
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::unauthorized(message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotFound, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RateLimited, message)
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_codes_match_json_rpc_convention() {
        assert_eq!(ErrorKind::Parse.envelope_code(), -32700);
        assert_eq!(ErrorKind::InvalidRequest.envelope_code(), -32600);
        assert_eq!(ErrorKind::MethodNotFound.envelope_code(), -32601);
        assert_eq!(ErrorKind::InvalidParams.envelope_code(), -32602);
        assert_eq!(ErrorKind::Internal.envelope_code(), -32603);
        assert_eq!(ErrorKind::Unauthorized.envelope_code(), -32001);
        assert_eq!(ErrorKind::Forbidden.envelope_code(), -32002);
        assert_eq!(ErrorKind::RateLimited.envelope_code(), -32003);
    }

    #[test]
    fn retryable_kinds_are_exactly_transport_transients() {
        assert!(ErrorKind::UpstreamTimeout.is_retryable());
        assert!(ErrorKind::RateLimited.is_retryable());
        assert!(!ErrorKind::ModelNotAllowed.is_retryable());
        assert!(!ErrorKind::Internal.is_retryable());
    }
}
