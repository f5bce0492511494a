//! Error types for the Moonshot digest client.
//!
//! Every failure the client can produce is a [`ClientError`]: a stable
//! [`ErrorKind`] reason code, a human-readable message and, when the remote
//! service supplied one, the HTTP status. Raw transport failures are
//! classified exactly once, at the transport boundary, and are never
//! re-wrapped afterwards.

use std::fmt;
use thiserror::Error;

use crate::transport::TransportError;

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

/// Status codes that are never retried under the default policy.
///
/// 404 and 507 are terminal as well: a missing file does not appear and
/// exhausted storage does not free itself between attempts.
pub const NON_RETRYABLE_STATUSES: [u16; 5] = [401, 413, 415, 404, 507];

/// Status used to tag "extraction still running" responses.
pub const PROCESSING_STATUS: u16 = 202;

/// Stable reason code of a [`ClientError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The credential is invalid or expired (401).
    CredentialInvalid,
    /// The payload exceeds the size limit (413, or the local size check).
    PayloadTooLarge,
    /// The content type is not accepted (415, or the local allow-list).
    UnsupportedType,
    /// The remote service is rate limiting us (429).
    RateLimited,
    /// The addressed remote resource does not exist (404).
    NotFound,
    /// The remote storage quota is exhausted (507).
    StorageExhausted,
    /// The remote service failed (5xx).
    ServerError,
    /// Any other error status the client has no specific handling for.
    Unclassified,
    /// Extraction has not finished yet (202). Transient, never shown to users.
    ProcessingIncomplete,
    /// The upload succeeded at the HTTP level but returned no file id.
    UploadFailed,
    /// No extractor produced non-empty text from the content response.
    ExtractionFailed,
    /// Content passed to analysis was empty after trimming.
    ContentEmpty,
    /// The completion response carried no reply text.
    AnalysisFailed,
    /// The client was configured incorrectly.
    Configuration,
    /// The retry loop finished without producing a result.
    Timeout,
    /// A failure without a status code (network, malformed payload).
    Unknown,
}

impl ErrorKind {
    /// Returns the stable snake_case reason code.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::CredentialInvalid => "credential_invalid",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::UnsupportedType => "unsupported_type",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::NotFound => "resource_not_found",
            ErrorKind::StorageExhausted => "storage_exhausted",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Unclassified => "unclassified",
            ErrorKind::ProcessingIncomplete => "processing_incomplete",
            ErrorKind::UploadFailed => "upload_failed",
            ErrorKind::ExtractionFailed => "content_extraction_failed",
            ErrorKind::ContentEmpty => "content_empty",
            ErrorKind::AnalysisFailed => "analysis_failed",
            ErrorKind::Configuration => "configuration",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Unknown => "unknown",
        }
    }

    /// Returns the user-facing message used when no better one is available.
    pub fn default_message(self) -> &'static str {
        match self {
            ErrorKind::CredentialInvalid => "API key is invalid or has expired",
            ErrorKind::PayloadTooLarge => "File exceeds the size limit (max 100MB)",
            ErrorKind::UnsupportedType => "Unsupported file type",
            ErrorKind::RateLimited => "Too many requests, please try again later",
            ErrorKind::NotFound => "File does not exist or has been deleted",
            ErrorKind::StorageExhausted => {
                "Insufficient storage, delete some files and try again"
            }
            ErrorKind::ServerError | ErrorKind::Unclassified => {
                "Request failed, please try again later"
            }
            ErrorKind::ProcessingIncomplete => "File is still being processed",
            ErrorKind::UploadFailed => "File upload failed",
            ErrorKind::ExtractionFailed => "Failed to extract file content",
            ErrorKind::ContentEmpty => "Content must not be empty",
            ErrorKind::AnalysisFailed => "Analysis failed, please try again",
            ErrorKind::Configuration => "Client configuration is invalid",
            ErrorKind::Timeout => "Operation timed out, please try again",
            ErrorKind::Unknown => "An unknown error occurred",
        }
    }

    /// Returns true for kinds that no amount of waiting will fix.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ErrorKind::CredentialInvalid
                | ErrorKind::PayloadTooLarge
                | ErrorKind::UnsupportedType
                | ErrorKind::NotFound
                | ErrorKind::StorageExhausted
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The uniform error currency of the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ClientError {
    kind: ErrorKind,
    message: String,
    status: Option<u16>,
    detail: Option<String>,
}

impl ClientError {
    /// Creates an error with an explicit message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            detail: None,
        }
    }

    /// Creates an error carrying the kind's default message.
    pub fn from_kind(kind: ErrorKind) -> Self {
        Self::new(kind, kind.default_message())
    }

    /// Attaches an HTTP status code.
    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Attaches diagnostic detail that is not shown to users.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Returns the reason code.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the user-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the HTTP status, if the remote service supplied one.
    pub fn status(&self) -> Option<u16> {
        self.status
    }

    /// Returns diagnostic detail, if any was recorded.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns true if the default retry policy must not retry this error.
    pub fn is_non_retryable(&self) -> bool {
        self.kind.is_terminal()
            || self
                .status
                .is_some_and(|status| NON_RETRYABLE_STATUSES.contains(&status))
    }

    /// Returns true if the credential has to be re-entered.
    pub fn is_credential_invalid(&self) -> bool {
        self.kind == ErrorKind::CredentialInvalid
    }

    /// Size check failure raised before any network call.
    pub fn payload_too_large() -> Self {
        Self::from_kind(ErrorKind::PayloadTooLarge)
    }

    /// Allow-list failure raised before any network call.
    pub fn unsupported_type(name: &str) -> Self {
        Self::from_kind(ErrorKind::UnsupportedType).with_detail(format!("rejected file: {name}"))
    }

    /// Extraction has not finished; tagged 202 so polling policies retry it.
    pub fn processing() -> Self {
        Self::from_kind(ErrorKind::ProcessingIncomplete).with_status(PROCESSING_STATUS)
    }

    /// Upload returned no file id.
    pub fn upload_failed() -> Self {
        Self::from_kind(ErrorKind::UploadFailed)
    }

    /// No extractor produced text.
    pub fn extraction_failed() -> Self {
        Self::from_kind(ErrorKind::ExtractionFailed)
    }

    /// Analysis input was blank.
    pub fn content_empty() -> Self {
        Self::from_kind(ErrorKind::ContentEmpty)
    }

    /// Completion carried no reply.
    pub fn analysis_failed() -> Self {
        Self::from_kind(ErrorKind::AnalysisFailed)
    }

    /// Retry loop ended without a result.
    pub fn timeout() -> Self {
        Self::from_kind(ErrorKind::Timeout)
    }

    /// Configuration problem.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Failure without a status code.
    pub fn unknown(detail: impl Into<String>) -> Self {
        Self::from_kind(ErrorKind::Unknown).with_detail(detail)
    }
}

/// Classifies an HTTP error response into a [`ClientError`].
///
/// `body` is consulted only for statuses without a fixed message, where the
/// API's own `error.message` (or top-level `message`) is preferred.
pub fn classify_status(status: u16, body: &[u8]) -> ClientError {
    let kind = match status {
        401 => Some(ErrorKind::CredentialInvalid),
        413 => Some(ErrorKind::PayloadTooLarge),
        415 => Some(ErrorKind::UnsupportedType),
        429 => Some(ErrorKind::RateLimited),
        404 => Some(ErrorKind::NotFound),
        507 => Some(ErrorKind::StorageExhausted),
        PROCESSING_STATUS => Some(ErrorKind::ProcessingIncomplete),
        _ => None,
    };

    if let Some(kind) = kind {
        return ClientError::from_kind(kind).with_status(status);
    }

    let kind = if status >= 500 {
        ErrorKind::ServerError
    } else {
        ErrorKind::Unclassified
    };
    let message = api_error_message(body)
        .unwrap_or_else(|| format!("{} ({status})", kind.default_message()));

    ClientError::new(kind, message)
        .with_status(status)
        .with_detail(String::from_utf8_lossy(body).into_owned())
}

/// Pulls the API's own error message out of an error body.
fn api_error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;

    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|message| !message.is_empty())
        .map(ToString::to_string)
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        ClientError::unknown(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::unknown(format!("malformed payload: {err}"))
    }
}

impl From<url::ParseError> for ClientError {
    fn from(err: url::ParseError) -> Self {
        ClientError::configuration(format!("Invalid URL: {err}"))
    }
}
