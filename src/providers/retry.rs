use crate::core::config::RetryConfig;
use crate::core::price::FetchError;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{error, warn};

/// Bounded exponential backoff: retry `n` (0-based) waits `base_delay * 2^n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        (&RetryConfig::default()).into()
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetryStats {
    pub total_calls: u64,
    pub retries: u64,
    pub failures: u64,
}

impl RetryStats {
    pub fn success_rate(&self) -> f64 {
        if self.total_calls == 0 {
            return 100.0;
        }
        (self.total_calls - self.failures) as f64 / self.total_calls as f64 * 100.0
    }
}

/// Runs remote calls under a [`RetryPolicy`] and counts what happened.
///
/// Backoff sleeps hold the calling task, so a worker slot in a bounded
/// pool stays occupied for the whole retry window.
#[derive(Debug, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
    total_calls: AtomicU64,
    retries: AtomicU64,
    failures: AtomicU64,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            total_calls: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Runs `operation` until it succeeds, fails non-transiently, or the
    /// retry budget is spent. The last error is returned, never panicked on.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let mut retry = 0;
        loop {
            self.total_calls.fetch_add(1, Ordering::Relaxed);
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && retry < self.policy.max_retries => {
                    let delay = self.policy.delay_for(retry);
                    warn!(
                        %label,
                        error = %err,
                        attempt = retry + 1,
                        max_retries = self.policy.max_retries,
                        "Transient failure, retrying in {:?}",
                        delay
                    );
                    self.retries.fetch_add(1, Ordering::Relaxed);
                    tokio::time::sleep(delay).await;
                    retry += 1;
                }
                Err(err) => {
                    self.failures.fetch_add(1, Ordering::Relaxed);
                    if err.is_transient() {
                        error!(%label, error = %err, "Giving up after {} attempts", retry + 1);
                    } else {
                        warn!(%label, error = %err, "Request failed");
                    }
                    return Err(err);
                }
            }
        }
    }

    pub fn stats(&self) -> RetryStats {
        RetryStats {
            total_calls: self.total_calls.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    fn fast_executor(max_retries: u32) -> RetryExecutor {
        RetryExecutor::new(RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(1),
        })
    }

    #[test]
    fn test_default_delays_double() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let executor = fast_executor(3);
        let result = executor.execute("ok", || async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(
            executor.stats(),
            RetryStats {
                total_calls: 1,
                retries: 0,
                failures: 0
            }
        );
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let executor = fast_executor(3);
        let calls = AtomicUsize::new(0);
        let result = executor
            .execute("flaky", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(FetchError::Timeout("slow".into()))
                    } else {
                        Ok("done")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        let stats = executor.stats();
        assert_eq!(stats.total_calls, 3);
        assert_eq!(stats.retries, 2);
        assert_eq!(stats.failures, 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fail_once() {
        let executor = fast_executor(3);
        let result: Result<(), _> = executor
            .execute("down", || async {
                Err(FetchError::Connect("refused".into()))
            })
            .await;

        assert!(matches!(result, Err(FetchError::Connect(_))));
        let stats = executor.stats();
        assert_eq!(stats.total_calls, 4);
        assert_eq!(stats.retries, 3);
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.success_rate(), 75.0);
    }

    #[tokio::test]
    async fn test_non_transient_aborts_immediately() {
        let executor = fast_executor(3);
        let result: Result<(), _> = executor
            .execute("missing", || async {
                Err(FetchError::Status {
                    status: 404,
                    target: "AAPL".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
        assert_eq!(
            executor.stats(),
            RetryStats {
                total_calls: 1,
                retries: 0,
                failures: 1
            }
        );
    }

    #[tokio::test]
    async fn test_backoff_blocks_for_cumulative_delay() {
        let executor = RetryExecutor::new(RetryPolicy {
            max_retries: 2,
            base_delay: Duration::from_millis(10),
        });
        let start = Instant::now();
        let _: Result<(), _> = executor
            .execute("down", || async {
                Err(FetchError::Timeout("slow".into()))
            })
            .await;
        // 10ms + 20ms
        assert!(start.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_success_rate_without_calls() {
        assert_eq!(RetryStats::default().success_rate(), 100.0);
    }
}
