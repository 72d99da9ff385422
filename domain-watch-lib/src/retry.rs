//! Retry logic with exponential backoff for WHOIS transport failures.
//!
//! The wait before attempt `i` (0-indexed, `i > 0`) is
//! `base_delay * 2^i` plus a uniformly random jitter in `[0, max_jitter)`.
//! Nothing is slept before the first attempt or after the last one.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::error::WatchError;

/// Exponent cap so large attempt counts cannot overflow the delay.
const MAX_EXPONENT: u32 = 20;

/// Configuration for retry behavior with exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the initial attempt).
    pub max_attempts: usize,
    /// Base delay that is doubled per attempt.
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the random jitter added to every wait.
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
            max_jitter: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with `max_attempts` attempts and `base_delay` backoff.
    pub fn new(max_attempts: usize, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Sets the jitter bound.
    pub fn with_max_jitter(mut self, jitter: Duration) -> Self {
        self.max_jitter = jitter;
        self
    }

    /// Deterministic part of the wait before `attempt`.
    pub fn backoff_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = (attempt as u32).min(MAX_EXPONENT);
        self.base_delay.saturating_mul(1u32 << exponent)
    }

    /// Full wait before `attempt`, jitter included.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..jitter_ms))
        };

        self.backoff_for_attempt(attempt).saturating_add(jitter)
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable error,
    /// or the attempts run out.
    ///
    /// `label` only appears in log lines. The last error is returned when
    /// every attempt failed.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, WatchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WatchError>>,
    {
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = self.delay_for_attempt(attempt);
                debug!(label, attempt = attempt + 1, ?delay, "Backing off before retry");
                tokio::time::sleep(delay).await;
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let attempts_remaining = self.max_attempts.saturating_sub(attempt + 1);

                    if !e.is_retryable() {
                        return Err(e);
                    }
                    if attempts_remaining == 0 {
                        warn!(
                            label,
                            attempts = attempt + 1,
                            error = %e,
                            "Operation failed after retries"
                        );
                        return Err(e);
                    }

                    debug!(label, attempt = attempt + 1, error = %e, "Attempt failed");
                    attempt += 1;
                }
            }
        }
    }
}
