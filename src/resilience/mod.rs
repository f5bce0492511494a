//! Resilience layer.
//!
//! Provides the backoff executor every remote call runs under, together with
//! the retry policies that decide which failures are worth another attempt.

mod retry;

pub use retry::{
    BackoffExecutor, RetryConfig, RetryPolicy, RetryableError, StatusSet, BACKOFF_MULTIPLIER,
    MAX_BACKOFF,
};
