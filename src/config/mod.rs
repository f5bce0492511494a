//! Configuration module for the Moonshot digest client.
//!
//! Holds everything about *how* the client talks to the API: base URL,
//! timeouts, model parameters and the retry budgets of the three remote
//! calls. The credential is deliberately not part of the configuration; it
//! is passed to the client separately so it can be swapped per session.

use std::time::Duration;

use url::Url;

use crate::errors::{ClientError, ClientResult};
use crate::resilience::RetryConfig;
use crate::types::limits::MAX_FILE_SIZE;

/// Default base URL for the Moonshot API.
pub const DEFAULT_BASE_URL: &str = "https://api.moonshot.cn/v1";

/// Default request timeout (300 seconds).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default completion model.
pub const DEFAULT_MODEL: &str = "moonshot-v1-32k";

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.3;

/// Default output-length ceiling.
pub const DEFAULT_MAX_TOKENS: u32 = 4000;

/// Fixed wait between upload and the first extraction poll.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Configuration for the Moonshot client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Base URL for API requests, without a trailing slash.
    pub base_url: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Completion model.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output-length ceiling.
    pub max_tokens: u32,
    /// Retry budget of the upload call.
    pub upload_retry: RetryConfig,
    /// Retry budget of the extraction poll.
    pub poll_retry: RetryConfig,
    /// Retry budget of the completion call.
    pub analyze_retry: RetryConfig,
    /// Wait before the first extraction poll.
    pub settle_delay: Duration,
    /// Maximum accepted upload size in bytes.
    pub max_upload_size: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            upload_retry: RetryConfig::new(3, Duration::from_secs(1)),
            poll_retry: RetryConfig::new(10, Duration::from_secs(2)),
            analyze_retry: RetryConfig::new(3, Duration::from_secs(1)),
            settle_delay: DEFAULT_SETTLE_DELAY,
            max_upload_size: MAX_FILE_SIZE,
        }
    }
}

impl ClientConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Creates a configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `MOONSHOT_BASE_URL` (optional): Custom base URL
    /// - `MOONSHOT_TIMEOUT` (optional): Request timeout in seconds
    /// - `MOONSHOT_MODEL` (optional): Completion model
    pub fn from_env() -> ClientResult<Self> {
        let mut builder = ClientConfigBuilder::new();

        if let Ok(base_url) = std::env::var("MOONSHOT_BASE_URL") {
            builder = builder.base_url(base_url);
        }

        if let Ok(timeout_str) = std::env::var("MOONSHOT_TIMEOUT") {
            match timeout_str.parse::<u64>() {
                Ok(secs) => builder = builder.timeout_secs(secs),
                Err(_) => tracing::warn!(value = %timeout_str, "Ignoring invalid MOONSHOT_TIMEOUT"),
            }
        }

        if let Ok(model) = std::env::var("MOONSHOT_MODEL") {
            builder = builder.model(model);
        }

        builder.build()
    }

    /// Returns the full URL for an endpoint.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Builder for `ClientConfig`.
#[derive(Debug, Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Creates a builder seeded with the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL.
    #[must_use]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Sets the timeout in seconds.
    #[must_use]
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout = Duration::from_secs(secs);
        self
    }

    /// Sets the completion model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Sets the output-length ceiling.
    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Sets the upload retry budget.
    #[must_use]
    pub fn upload_retry(mut self, retry: RetryConfig) -> Self {
        self.config.upload_retry = retry;
        self
    }

    /// Sets the extraction poll retry budget.
    #[must_use]
    pub fn poll_retry(mut self, retry: RetryConfig) -> Self {
        self.config.poll_retry = retry;
        self
    }

    /// Sets the completion retry budget.
    #[must_use]
    pub fn analyze_retry(mut self, retry: RetryConfig) -> Self {
        self.config.analyze_retry = retry;
        self
    }

    /// Sets the wait before the first extraction poll.
    #[must_use]
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    /// Sets the maximum accepted upload size.
    #[must_use]
    pub fn max_upload_size(mut self, bytes: u64) -> Self {
        self.config.max_upload_size = bytes;
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ClientResult<ClientConfig> {
        let mut config = self.config;

        let parsed = Url::parse(config.base_url.trim())?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::configuration(
                "Base URL must use http or https",
            ));
        }
        if parsed.scheme() == "http" {
            tracing::warn!(base_url = %parsed, "Base URL is not using HTTPS");
        }

        if config.timeout.is_zero() {
            return Err(ClientError::configuration("Timeout must be greater than zero"));
        }

        if config.model.trim().is_empty() {
            return Err(ClientError::configuration("Model cannot be empty"));
        }

        config.base_url = config.base_url.trim().trim_end_matches('/').to_string();

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_config_builder_defaults() {
        let config = ClientConfig::builder().build().unwrap();

        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.model, "moonshot-v1-32k");
        assert_eq!(config.max_tokens, 4000);
        assert_eq!(config.upload_retry.max_attempts, 3);
        assert_eq!(config.upload_retry.initial_delay, Duration::from_secs(1));
        assert_eq!(config.poll_retry.max_attempts, 10);
        assert_eq!(config.poll_retry.initial_delay, Duration::from_secs(2));
        assert_eq!(config.settle_delay, Duration::from_secs(2));
        assert_eq!(config.max_upload_size, 100 * 1024 * 1024);
    }

    #[test]
    fn test_config_builder_success() {
        let config = ClientConfig::builder()
            .base_url("http://localhost:8080/v1/")
            .timeout(Duration::from_secs(30))
            .model("moonshot-v1-8k")
            .temperature(0.0)
            .build()
            .unwrap();

        assert_eq!(config.base_url, "http://localhost:8080/v1");
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.model, "moonshot-v1-8k");
    }

    #[test]
    fn test_config_builder_invalid_base_url() {
        let err = ClientConfig::builder().base_url("not a url").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);

        let err = ClientConfig::builder()
            .base_url("ftp://api.moonshot.cn")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_config_builder_zero_timeout() {
        let result = ClientConfig::builder().timeout(Duration::ZERO).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_endpoint_url() {
        let config = ClientConfig::default();

        assert_eq!(
            config.endpoint_url("/chat/completions"),
            "https://api.moonshot.cn/v1/chat/completions"
        );
    }
}
