//! Per-vendor error taxonomy (spec §4.F).

use thiserror::Error;

/// The small taxonomy every vendor's errors are mapped into. The executor
/// (`gateway-executor`) maps these onto the envelope error kinds
/// (`upstream_unauthorized`, `upstream_rate_limited`, `upstream_error`,
/// `upstream_timeout`).
#[derive(Debug, Error, Clone)]
pub enum AdapterError {
    #[error("upstream rejected credentials (401)")]
    Unauthorized,
    #[error("model not permitted by upstream (403): {0}")]
    ForbiddenModel(String),
    #[error("upstream resource not found (404): {0}")]
    NotFound(String),
    #[error("upstream rate limited (429), retry after {retry_after_secs:?}s")]
    RateLimited { retry_after_secs: Option<u64> },
    #[error("upstream rejected request (4xx): {0}")]
    BadRequest(String),
    #[error("upstream error (5xx): {0}")]
    Upstream(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request exceeded its deadline")]
    Timeout,
}

impl AdapterError {
    /// `bad_request` is never retried; `transport`/`upstream` may be
    /// retried by the caller with backoff; everything else is terminal.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Upstream(_) | Self::RateLimited { .. }
        )
    }
}
