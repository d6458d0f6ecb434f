//! Retry policy with exponential backoff.
//!
//! Connection-class failures during startup and node connect are retried
//! under a policy that comes from configuration, not from hardcoded sleeps.
//! Non-retryable errors surface immediately.

use std::future::Future;
use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::error::{Error, Result};

/// Longest delay between attempts, regardless of growth.
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Configurable backoff policy: attempt count and base delay.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before the given retry (attempt numbers start at 1).
    ///
    /// Doubles per attempt, capped, with up to 25% added jitter so a fleet
    /// of reconcilers does not reconnect in lockstep.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(MAX_DELAY);
        let jitter = rand::thread_rng().gen_range(0.0..0.25);
        base.mul_f64(1.0 + jitter)
    }

    /// Run an operation under this policy.
    ///
    /// Retries only errors classified retryable; anything else propagates
    /// on first occurrence. When attempts run out the last error is wrapped
    /// in `Error::RetriesExhausted`.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut last_error: Option<Error> = None;

        for attempt in 1..=self.max_attempts {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        operation,
                        attempt,
                        self.max_attempts,
                        delay,
                        e
                    );
                    last_error = Some(e);
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        let last_error = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts ran".to_string());
        Err(Error::RetriesExhausted {
            operation: operation.to_string(),
            attempts: self.max_attempts,
            last_error,
        })
    }
}
