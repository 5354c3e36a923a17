//! Hand-rolled exponential backoff with jitter, mirroring the teacher's
//! own retry-with-jitter helper for token refresh (the workspace carries
//! no dedicated backoff crate, so this is intentionally small and local
//! rather than a new dependency).

use crate::AdapterError;
use std::future::Future;
use std::time::Duration;

/// Retries `op` up to `max_attempts` times total. Only
/// [`AdapterError::is_retryable`] failures are retried; `bad_request` and
/// similar terminal errors return on the first attempt (spec §4.F: "the
/// adapter MUST NOT retry on bad_request").
pub async fn with_backoff<F, Fut, T>(max_attempts: u32, base: Duration, mut op: F) -> Result<T, AdapterError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AdapterError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < max_attempts && err.is_retryable() => {
                let backoff = base * 2u32.pow(attempt - 1);
                let jitter = Duration::from_millis(fastrand_millis(backoff.as_millis() as u64 / 4));
                tracing::warn!(attempt, error = %err, "retrying upstream call after backoff");
                tokio::time::sleep(backoff + jitter).await;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Deterministic-enough jitter without pulling in a `rand` dependency for
/// one call site: a cheap hash of the current instant's subsecond bits.
fn fastrand_millis(bound: u64) -> u64 {
    if bound == 0 {
        return 0;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transport_errors_until_success() {
        let attempts = AtomicU32::new(0);
        let result = with_backoff(3, Duration::from_millis(1), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AdapterError::Transport("flaky".into()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_bad_request() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(3, Duration::from_millis(1), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(AdapterError::BadRequest("nope".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_backoff(2, Duration::from_millis(1), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(AdapterError::Upstream("down".into())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
