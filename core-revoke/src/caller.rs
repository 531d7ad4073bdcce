//! Rate-Limited API Caller
//!
//! Every remote read or write made by the revocation engine goes through
//! [`ApiCaller::call`]. Transient failures are retried with exponential
//! backoff; anything else fails on the first attempt. A fixed pause follows
//! every success to stay under steady-state rate limits.

use std::future::Future;
use std::time::Duration;

use bridge_traits::error::Result;
use core_runtime::config::RevokeConfig;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry and pacing settings for remote calls.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, first try included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_multiplier: f64,
    pub max_delay: Duration,
    /// Pause after each successful call
    pub success_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            backoff_multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            success_delay: Duration::from_millis(100),
        }
    }
}

impl From<&RevokeConfig> for RetryPolicy {
    fn from(config: &RevokeConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay,
            backoff_multiplier: config.backoff_multiplier,
            max_delay: config.max_delay,
            success_delay: config.success_delay,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `retry` (0 for the first retry), capped at `max_delay`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.backoff_multiplier.powi(retry as i32);
        Duration::try_from_secs_f64(self.base_delay.as_secs_f64() * factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Retry/backoff wrapper for remote operations.
#[derive(Debug, Clone, Default)]
pub struct ApiCaller {
    policy: RetryPolicy,
}

impl ApiCaller {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs `f` until it succeeds, fails permanently or runs out of attempts.
    ///
    /// `operation` names the call in logs only.
    ///
    /// # Errors
    ///
    /// Returns the last error once attempts are exhausted, or the first
    /// non-transient error immediately.
    pub async fn call<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match f().await {
                Ok(value) => {
                    if !self.policy.success_delay.is_zero() {
                        sleep(self.policy.success_delay).await;
                    }
                    return Ok(value);
                }
                Err(e) if e.is_transient() && attempt < max_attempts => {
                    let backoff = self.policy.backoff(attempt - 1);
                    let delay = e
                        .retry_after()
                        .map_or(backoff, |hint| hint.max(backoff))
                        .min(self.policy.max_delay);

                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Remote call failed, retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    debug!(operation, attempt, error = %e, "Remote call failed");
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    fn throttled(retry_after: Option<Duration>) -> BridgeError {
        BridgeError::Throttled {
            message: "rate limit".to_string(),
            retry_after,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_delay: Duration::from_millis(500),
            ..RetryPolicy::default()
        };

        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(3), Duration::from_millis(500));
        assert_eq!(policy.backoff(60), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_errors_are_retried() {
        let caller = ApiCaller::default();
        let calls = Arc::new(AtomicU32::new(0));
        let started = Instant::now();

        let counter = Arc::clone(&calls);
        let result = caller
            .call("list_editors", || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(BridgeError::Unavailable("503".to_string()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 200ms backoff, then the post-success pause
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(400), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(450), "{:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_fails_immediately() {
        let caller = ApiCaller::default();
        let calls = AtomicU32::new(0);

        let result: Result<()> = caller
            .call("remove_viewer", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(BridgeError::Remote {
                        status: 403,
                        message: "insufficient permissions".to_string(),
                    })
                }
            })
            .await;

        assert!(matches!(result, Err(BridgeError::Remote { status: 403, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempts_are_bounded() {
        let caller = ApiCaller::new(RetryPolicy {
            max_attempts: 3,
            ..RetryPolicy::default()
        });
        let calls = AtomicU32::new(0);

        let result: Result<()> = caller
            .call("fetch_page", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(throttled(None)) }
            })
            .await;

        assert!(matches!(result, Err(BridgeError::Throttled { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_lengthens_backoff() {
        let caller = ApiCaller::new(RetryPolicy {
            success_delay: Duration::ZERO,
            ..RetryPolicy::default()
        });
        let calls = AtomicU32::new(0);
        let started = Instant::now();

        caller
            .call("get_sharing_access", || {
                let first = calls.fetch_add(1, Ordering::SeqCst) == 0;
                async move {
                    if first {
                        Err(throttled(Some(Duration::from_secs(3))))
                    } else {
                        Ok(())
                    }
                }
            })
            .await
            .unwrap();

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(3), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(3050), "{:?}", elapsed);
    }
}
