use gateway_protocol::GatewayError;

/// Authorization-server-specific failure modes. These sit behind the OAuth
/// wire vocabulary (`invalid_grant`, `invalid_client`, ...) rather than the
/// gateway's own error taxonomy; [`From`] below maps them onto it for
/// callers that need a [`GatewayError`] (the bearer validator, mainly).
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("unknown client '{0}'")]
    UnknownClient(String),
    #[error("redirect_uri is not registered for this client")]
    RedirectUriMismatch,
    #[error("invalid_grant: {0}")]
    InvalidGrant(&'static str),
    #[error("invalid_request: {0}")]
    InvalidRequest(&'static str),
    #[error("token is unknown, expired or revoked")]
    InvalidToken,
    #[error("state payload failed validation")]
    InvalidState,
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::UnknownClient(_)
            | AuthError::RedirectUriMismatch
            | AuthError::InvalidGrant(_)
            | AuthError::InvalidRequest(_)
            | AuthError::InvalidState => GatewayError::invalid_request(err.to_string()),
            AuthError::InvalidToken => GatewayError::unauthorized("invalid or expired token"),
        }
    }
}
