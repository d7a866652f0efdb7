use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use super::error::DatabaseResult;
#[cfg(test)]
use super::error::DatabaseError;

/// Retry policy for establishing database connections at startup
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// Delay before the first retry in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound for any single delay in milliseconds
    pub max_delay_ms: u64,

    /// Growth factor applied after each failed attempt
    pub backoff_multiplier: f64,

    /// Scale each delay by a random factor in [0.5, 1.0]
    pub use_jitter: bool,
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_initial_delay(mut self, delay_ms: u64) -> Self {
        self.initial_delay_ms = delay_ms;
        self
    }

    pub fn with_max_delay(mut self, delay_ms: u64) -> Self {
        self.max_delay_ms = delay_ms;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.use_jitter = false;
        self
    }

    /// Delay schedule for this policy
    pub fn backoff(&self) -> Backoff {
        Backoff {
            next_ms: self.initial_delay_ms,
            remaining: self.max_retries,
            config: self.clone(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5000,
            backoff_multiplier: 2.0,
            use_jitter: true,
        }
    }
}

/// Iterator over the delays between attempts; yields `max_retries` items.
#[derive(Debug, Clone)]
pub struct Backoff {
    next_ms: u64,
    remaining: u32,
    config: RetryConfig,
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let base = self.next_ms.min(self.config.max_delay_ms);
        self.next_ms = ((self.next_ms as f64 * self.config.backoff_multiplier) as u64)
            .min(self.config.max_delay_ms);

        let delay = if self.config.use_jitter {
            apply_jitter(base)
        } else {
            base
        };
        Some(Duration::from_millis(delay))
    }
}

/// Retry a connection-style operation with exponential backoff.
///
/// Only transient failures (see [`DatabaseError::is_transient`]) are retried;
/// configuration errors are returned immediately.
pub async fn retry_with_backoff<F, Fut, T>(
    mut operation: F,
    config: RetryConfig,
) -> DatabaseResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DatabaseResult<T>>,
{
    let mut delays = config.backoff();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retrying");
                }
                return Ok(value);
            }
            Err(err) if !err.is_transient() => return Err(err),
            Err(err) => match delays.next() {
                Some(delay) => {
                    debug!(
                        attempt,
                        max_attempts = config.max_retries + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Operation failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    warn!(attempts = attempt, error = %err, "Operation failed, giving up");
                    return Err(err);
                }
            },
        }
    }
}

/// Retry with the default policy: 3 retries starting at 100ms.
pub async fn retry<F, Fut, T>(operation: F) -> DatabaseResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DatabaseResult<T>>,
{
    retry_with_backoff(operation, RetryConfig::default()).await
}

/// Uniform delay in `[delay / 2, delay]`
fn apply_jitter(delay: u64) -> u64 {
    rand::rng().random_range(delay / 2..=delay)
}
