//! Per-source sliding-window rate limiter (spec §5: "A counter per source
//! identity (IP or principal) over a sliding window; exceeding the window
//! returns `rate_limited` with `retry_after_seconds`").

use crate::state::AppState;
use axum::extract::{ConnectInfo, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use dashmap::DashMap;
use gateway_protocol::ErrorKind;
use serde_json::json;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

struct Window {
    count: u32,
    started_at: Instant,
}

pub struct RateLimiter {
    window: Duration,
    max: u32,
    buckets: DashMap<String, Window>,
}

pub enum Verdict {
    Allow,
    Deny { retry_after_seconds: u64 },
}

impl RateLimiter {
    pub fn new(window: Duration, max: u32) -> Self {
        Self {
            window,
            max,
            buckets: DashMap::new(),
        }
    }

    /// Checks and records one hit for `identity`. A new window starts the
    /// first time an identity is seen, or once the previous window has
    /// fully elapsed.
    pub fn check(&self, identity: &str) -> Verdict {
        let now = Instant::now();
        let mut entry = self.buckets.entry(identity.to_string()).or_insert_with(|| Window {
            count: 0,
            started_at: now,
        });

        if now.duration_since(entry.started_at) >= self.window {
            entry.count = 0;
            entry.started_at = now;
        }

        if entry.count >= self.max {
            let elapsed = now.duration_since(entry.started_at);
            let remaining = self.window.saturating_sub(elapsed);
            return Verdict::Deny {
                retry_after_seconds: remaining.as_secs().max(1),
            };
        }

        entry.count += 1;
        Verdict::Allow
    }
}

fn denied_response(verdict_retry_after: u64) -> Response {
    let body = json!({
        "error": {
            "code": ErrorKind::RateLimited.envelope_code(),
            "message": "rate limit exceeded",
            "data": { "retry_after_seconds": verdict_retry_after },
        }
    });
    (axum::http::StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response()
}

fn identity(headers: &axum::http::HeaderMap, config: &crate::config::ServerConfig, peer: Option<SocketAddr>) -> String {
    crate::principal::rate_limit_identity(headers, config.trust_proxy, peer, &gateway_protocol::Principal::Anonymous)
}

/// General-purpose rate-limit middleware for the front door and MCP
/// surfaces (spec §5). Identity resolution does not re-run bearer
/// validation here — a request over quota is rejected the same way
/// regardless of whether its token would also have failed auth, and the
/// handler's own `PrincipalExtractor` still runs the real check downstream.
pub async fn enforce_general(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let id = identity(request.headers(), &state.config, peer);
    match state.rate_limiter.check(&id) {
        Verdict::Allow => next.run(request).await,
        Verdict::Deny { retry_after_seconds } => denied_response(retry_after_seconds),
    }
}

/// Stricter-window variant applied to the OAuth endpoints.
pub async fn enforce_auth(
    State(state): State<AppState>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let id = identity(request.headers(), &state.config, peer);
    match state.auth_rate_limiter.check(&id) {
        Verdict::Allow => next.run(request).await,
        Verdict::Deny { retry_after_seconds } => denied_response(retry_after_seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_max_then_denies() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);
        assert!(matches!(limiter.check("ip1"), Verdict::Allow));
        assert!(matches!(limiter.check("ip1"), Verdict::Allow));
        assert!(matches!(limiter.check("ip1"), Verdict::Deny { .. }));
    }

    #[test]
    fn separate_identities_have_independent_windows() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        assert!(matches!(limiter.check("ip1"), Verdict::Allow));
        assert!(matches!(limiter.check("ip2"), Verdict::Allow));
    }
}
