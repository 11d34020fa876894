//! # Retry Policy
//!
//! Exponential-backoff retry wrapper used only for transient failures.
//!
//! Non-transient failures propagate immediately with no sleep. After the
//! final attempt the last transient failure is rethrown and the caller
//! treats it as persistent.

use std::future::Future;
use std::time::Duration;

use restyle_common::HostError;

use crate::classify::{classify, FailureClass};

const DEFAULT_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(2),
    Duration::from_secs(4),
];

/// Transient-only retry with a fixed backoff ladder.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: usize,
    delays: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delays: DEFAULT_DELAYS.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delays: Vec<Duration>) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delays,
        }
    }

    /// Policy that never sleeps, for tests that only care about counts.
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, vec![Duration::ZERO])
    }

    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Invoke `op`, retrying transient failures with backoff.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, HostError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, HostError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    attempt += 1;
                    if classify(&error) != FailureClass::Transient {
                        return Err(error);
                    }
                    if attempt >= self.max_attempts {
                        tracing::warn!(attempt, error = %error, "retries exhausted");
                        return Err(error);
                    }

                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "transient host failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        self.delays
            .get(attempt - 1)
            .or_else(|| self.delays.last())
            .copied()
            .unwrap_or(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_two_transient_failures() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let started = Instant::now();
        let result: Result<u32, HostError> = policy
            .run(|| {
                let calls = calls2.clone();
                async move {
                    match calls.fetch_add(1, Ordering::SeqCst) {
                        0 | 1 => Err(HostError::Timeout),
                        _ => Ok(42),
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(42));
        // Never invoked a 4th time.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Slept ~1s then ~2s under paused time.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rethrows_after_final_attempt() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let result: Result<u32, HostError> = policy
            .run(|| {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HostError::RateLimited)
                }
            })
            .await;

        assert_eq!(result, Err(HostError::RateLimited));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_persistent_failure_propagates_immediately() {
        let policy = RetryPolicy::default();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();

        let started = Instant::now();
        let result: Result<u32, HostError> = policy
            .run(|| {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HostError::PermissionDenied("read only".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // No sleep at all.
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_immediate_success_skips_policy() {
        let policy = RetryPolicy::default();
        let result: Result<&str, HostError> = policy.run(|| async { Ok("done") }).await;
        assert_eq!(result, Ok("done"));
    }
}
