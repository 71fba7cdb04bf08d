//! Opt-in retry decorator.
//!
//! The engine itself never retries; callers that want retries wrap an
//! operation in [`RetryExecutor::execute`].

use crate::errors::GitHubResult;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Retry tuning.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay, `Retry-After` included.
    pub max_backoff: Duration,
    /// Backoff growth factor.
    pub multiplier: f64,
    /// Jitter as a fraction of the delay (0.0 to 1.0).
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.1,
        }
    }
}

/// Retry executor with exponential backoff.
///
/// Only errors reporting [`is_retryable`](crate::errors::GitHubError::is_retryable)
/// are retried. `Retry-After`, or a rate limit's reset time, overrides the
/// computed backoff.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Creates a new retry executor.
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Executes an operation with retry logic.
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> GitHubResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = GitHubResult<T>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;

                    if !e.is_retryable() || attempt >= self.policy.max_attempts {
                        return Err(e);
                    }

                    let delay = match e.retry_after() {
                        Some(secs) => Duration::from_secs(secs).min(self.policy.max_backoff),
                        None => self.calculate_backoff(attempt),
                    };

                    tracing::debug!(
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying after error"
                    );

                    sleep(delay).await;
                }
            }
        }
    }

    /// Calculates backoff duration for an attempt.
    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let policy = &self.policy;
        let base = policy.initial_backoff.as_millis() as f64
            * policy.multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = base.min(policy.max_backoff.as_millis() as f64);

        let jitter_range = capped * policy.jitter;
        let jitter_value = rand::random::<f64>() * jitter_range * 2.0 - jitter_range;
        let final_delay = (capped + jitter_value).max(0.0);

        Duration::from_millis(final_delay as u64)
    }
}
