//! Moonshot Digest
//!
//! An async Rust client for the Moonshot API's file pipeline: upload a
//! document, wait for the service to extract its text, then summarize it and
//! answer follow-up questions over the same content.
//!
//! # Features
//!
//! - **Upload / extract / analyze**: the three remote calls, each with its
//!   own retry budget
//! - **Backoff**: exponential retries (x1.5, capped at 10 s) with explicit,
//!   testable retry policies
//! - **Typed errors**: every failure is a [`ClientError`] with a stable
//!   [`ErrorKind`] and the HTTP status when there was one
//! - **Sessions**: [`SessionController`] tracks state, caches extracted
//!   content and keeps the conversation transcript
//! - **Credential storage**: load / save / clear of the persisted API key
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use moonshot_digest::{ClientConfig, Credential, SessionController, UploadedFile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = SessionController::new(ClientConfig::from_env()?)?;
//!     session.set_credential(Some(Credential::from_env()?)).await;
//!
//!     let file = UploadedFile::from_path("report.pdf").await?;
//!     let summary = session.analyze_file(file).await?;
//!     println!("{summary}");
//!
//!     let answer = session.ask("What are the main risks?").await?;
//!     println!("{}", answer.text);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod observability;
pub mod resilience;
pub mod services;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use auth::Credential;
pub use client::{MoonshotClient, MoonshotClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use errors::{ClientError, ClientResult, ErrorKind};
pub use observability::{init_tracing, LogConfig, LogLevel};
pub use resilience::{BackoffExecutor, RetryConfig, RetryPolicy, StatusSet};
pub use session::{Author, ConversationTurn, SessionController, SessionError, SessionState};
pub use store::{CredentialStore, FileCredentialStore, MemoryCredentialStore, StoreError};

// Type re-exports
pub use types::chat::AnalysisRequest;
pub use types::files::{ExtractedContent, RemoteFileHandle, UploadedFile};
pub use types::limits::{MAX_FILE_SIZE, SUPPORTED_FILE_TYPES};

/// Mock implementations for testing.
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
