//! Bounded retry with exponential backoff and jitter.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of retries after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 2;
/// Default delay before the first retry.
pub const DEFAULT_BASE_DELAY_MS: u64 = 250;
/// Default ceiling on any single delay.
pub const DEFAULT_MAX_DELAY_MS: u64 = 5_000;
/// Default growth factor between retries.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Errors that know whether another attempt is worthwhile.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Retry schedule for one upstream client.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    multiplier: f64,
    jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (1-based).
    ///
    /// Grows by `multiplier` per retry, is capped at `max_delay`, and gains up
    /// to 25% random jitter when enabled.
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64
            * self.multiplier.powi(retry.saturating_sub(1) as i32);
        let delay_ms = base_ms.min(self.max_delay.as_millis() as f64);

        let final_ms = if self.jitter {
            let jitter: f64 = rand::thread_rng().gen_range(0.0..=0.25);
            delay_ms + delay_ms * jitter
        } else {
            delay_ms
        };

        Duration::from_millis(final_ms as u64)
    }

    /// Runs `operation` until it succeeds, fails permanently, or the retry
    /// budget is spent. The closure receives the 0-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, E>
    where
        E: Retryable + std::fmt::Display,
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match f(attempt).await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(operation, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.delay_for_retry(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Upstream call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_retryable() {
                        warn!(operation, attempts = attempt + 1, error = %e, "Retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}
