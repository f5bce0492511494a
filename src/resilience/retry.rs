//! Retry with exponential backoff.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::instrument;

use crate::errors::ClientError;

/// Growth factor applied to the delay after each failed attempt.
pub const BACKOFF_MULTIPLIER: f64 = 1.5;

/// Upper bound for a single backoff delay.
pub const MAX_BACKOFF: Duration = Duration::from_millis(10_000);

/// Errors the executor can reason about.
pub trait RetryableError: Display {
    /// Status code attached to the error, if any.
    fn status(&self) -> Option<u16>;

    /// Returns true if the error must never be retried under default rules.
    fn is_non_retryable(&self) -> bool;

    /// Error reported when the loop ends without any result.
    fn exhausted() -> Self;
}

impl RetryableError for ClientError {
    fn status(&self) -> Option<u16> {
        ClientError::status(self)
    }

    fn is_non_retryable(&self) -> bool {
        ClientError::is_non_retryable(self)
    }

    fn exhausted() -> Self {
        ClientError::timeout()
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay the schedule starts from.
    pub initial_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
    /// Delay multiplier for exponential backoff.
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: MAX_BACKOFF,
            multiplier: BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryConfig {
    /// Creates a configuration with the standard multiplier and cap.
    pub fn new(max_attempts: u32, initial_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            ..Default::default()
        }
    }

    /// Sets the maximum number of attempts.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Creates a configuration that tries exactly once.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Computes the delay that follows `current`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn next_delay(&self, current: Duration) -> Duration {
        let grown = current.as_millis() as f64 * self.multiplier;
        let capped = grown.min(self.max_delay.as_millis() as f64);
        Duration::from_millis(capped as u64)
    }
}

/// A set of status codes, optionally including every 5xx status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StatusSet {
    codes: Vec<u16>,
    server_errors: bool,
}

impl StatusSet {
    /// Creates a set from explicit codes.
    pub fn new(codes: impl IntoIterator<Item = u16>) -> Self {
        Self {
            codes: codes.into_iter().collect(),
            server_errors: false,
        }
    }

    /// Also matches any status of 500 or above.
    #[must_use]
    pub fn with_server_errors(mut self) -> Self {
        self.server_errors = true;
        self
    }

    /// Returns true if the status belongs to the set.
    pub fn contains(&self, status: u16) -> bool {
        self.codes.contains(&status) || (self.server_errors && status >= 500)
    }
}

/// Decides whether a failed attempt is tried again.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RetryPolicy {
    /// Retry everything except the non-retryable set.
    #[default]
    Default,
    /// Retry every error, including the non-retryable set.
    Always,
    /// Never retry.
    Never,
    /// Retry only errors whose status is in the set; the non-retryable set
    /// still wins.
    OnStatus(StatusSet),
}

impl RetryPolicy {
    /// Policy used while polling for extracted content: 202, 429 and 5xx.
    pub fn polling() -> Self {
        RetryPolicy::OnStatus(StatusSet::new([202, 429]).with_server_errors())
    }

    /// Returns true if `error` may be retried.
    pub fn should_retry<E: RetryableError>(&self, error: &E) -> bool {
        match self {
            RetryPolicy::Default => !error.is_non_retryable(),
            RetryPolicy::Always => true,
            RetryPolicy::Never => false,
            RetryPolicy::OnStatus(set) => {
                !error.is_non_retryable() && error.status().is_some_and(|s| set.contains(s))
            }
        }
    }
}

/// Runs an operation until it succeeds, the attempt budget runs out, or the
/// policy declines a retry.
#[derive(Debug, Clone, Default)]
pub struct BackoffExecutor {
    config: RetryConfig,
    policy: RetryPolicy,
}

impl BackoffExecutor {
    /// Creates an executor with the default policy.
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            policy: RetryPolicy::Default,
        }
    }

    /// Replaces the retry policy.
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the retry configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Executes an operation with retries.
    #[instrument(skip(self, operation), fields(max_attempts = self.config.max_attempts))]
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError,
    {
        let mut attempts = 0;
        let mut delay = self.config.initial_delay;

        while attempts < self.config.max_attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => {
                    attempts += 1;

                    if !self.policy.should_retry(&err) {
                        tracing::debug!(attempt = attempts, error = %err, "Error is not retryable");
                        return Err(err);
                    }

                    if attempts >= self.config.max_attempts {
                        tracing::warn!(attempts, error = %err, "Retry attempts exhausted");
                        return Err(err);
                    }

                    delay = self.config.next_delay(delay);

                    tracing::info!(
                        attempt = attempts,
                        max_attempts = self.config.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retrying after error"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }

        Err(E::exhausted())
    }
}
