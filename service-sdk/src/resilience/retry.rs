//! Retry with exponential backoff for recoverable errors
//!
//! One reusable policy (max attempts, base delay, multiplier) shared by every
//! upstream call. Delays grow as `base * multiplier^attempt` without jitter.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};

use crate::error::{ErrorContext, Result, ServiceError};

/// Retry policy configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,

    /// Delay before the first retry
    pub base_delay: Duration,

    /// Multiplier for backoff between retries
    pub multiplier: f64,

    /// Upper bound for a single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl fmt::Display for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RetryConfig {{ max_attempts: {}, base_delay: {:?}, multiplier: {}, max_delay: {:?} }}",
            self.max_attempts, self.base_delay, self.multiplier, self.max_delay
        )
    }
}

impl RetryConfig {
    /// Build the backoff schedule for one call
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.base_delay,
            initial_interval: self.base_delay,
            max_interval: self.max_delay,
            multiplier: self.multiplier,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

/// Executor for retry operations with exponential backoff
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    /// Create a new retry executor with the specified configuration
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Execute an operation, retrying errors that are retryable
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.execute_with(operation, ServiceError::is_retryable).await
    }

    /// Execute an operation, retrying while `should_retry` approves the error
    ///
    /// The operation receives the 1-based attempt number. The final error
    /// carries the number of attempts made.
    pub async fn execute_with<F, Fut, T, P>(&self, mut operation: F, should_retry: P) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&ServiceError) -> bool,
    {
        let mut backoff = self.config.backoff();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < max_attempts && should_retry(&err) => {
                    let delay = backoff.next_backoff().unwrap_or(self.config.max_delay);
                    log::warn!(
                        "Operation failed with retryable error, retrying in {:?} (attempt {}/{}): {}",
                        delay,
                        attempt,
                        max_attempts,
                        err
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(err.with_context(ErrorContext::new().attempts(attempt)));
                }
            }
        }
    }

    /// Get the current retry configuration
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
