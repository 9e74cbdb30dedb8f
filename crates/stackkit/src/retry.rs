//! Retry logic with exponential backoff for throttled calls.

use crate::error::{Error, ProviderError, Result};
use crate::types::RetryConfig;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Blocks the calling flow between attempts and polls.
///
/// Production code sleeps the thread; tests record the requested delays.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by [`std::thread::sleep`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

/// Wraps provider calls, retrying only throttled ones.
#[derive(Clone)]
pub struct BackoffRetrier {
    config: RetryConfig,
    sleeper: Arc<dyn Sleeper>,
}

impl BackoffRetrier {
    /// Create a retrier with the given config and sleeper.
    pub fn new(config: RetryConfig, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { config, sleeper }
    }

    /// The retry configuration in use.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Sleeper shared with the poll loop.
    pub fn sleeper(&self) -> &Arc<dyn Sleeper> {
        &self.sleeper
    }

    /// Execute an operation, retrying throttled failures with exponential backoff.
    ///
    /// Non-throttling errors return immediately as [`Error::Provider`].
    /// When every attempt is throttled the last error is wrapped in
    /// [`Error::RetryExhausted`].
    pub fn invoke<T, F>(&self, mut operation: F) -> Result<T>
    where
        F: FnMut() -> std::result::Result<T, ProviderError>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            let e = match operation() {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            if !e.category().is_retryable() {
                return Err(Error::Provider(e));
            }

            if attempt + 1 >= max_attempts {
                return Err(Error::RetryExhausted {
                    attempts: max_attempts,
                    source: e,
                });
            }

            let delay = self.config.delay_for_attempt(attempt);
            log::warn!(
                "Attempt {}/{} throttled: {}. Retrying in {}s...",
                attempt + 1,
                max_attempts,
                e,
                delay.as_secs()
            );
            self.sleeper.sleep(delay);
            attempt += 1;
        }
    }
}

impl Default for BackoffRetrier {
    fn default() -> Self {
        Self::new(RetryConfig::default(), Arc::new(ThreadSleeper))
    }
}
