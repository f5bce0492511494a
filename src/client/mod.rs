//! Moonshot API client.
//!
//! Provides the main client interface for the upload, extract and analyze
//! calls.

use std::sync::Arc;
use tracing::instrument;

use crate::auth::{AuthProvider, BearerAuth, Credential};
use crate::config::ClientConfig;
use crate::errors::{ClientError, ClientResult};
use crate::services::{ChatService, FilesService};
use crate::transport::{HttpTransport, HttpTransportImpl};
use crate::types::chat::AnalysisRequest;
use crate::types::files::{ExtractedContent, RemoteFileHandle, UploadedFile};

/// The Moonshot client.
///
/// Holds no mutable state: one instance can be shared, or a fresh one built
/// per call.
///
/// # Example
///
/// ```rust,no_run
/// use moonshot_digest::{MoonshotClient, UploadedFile};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let client = MoonshotClient::builder()
///         .api_key("sk-your-api-key")
///         .build()?;
///
///     let file = UploadedFile::from_path("report.pdf").await?;
///     let handle = client.submit(&file).await?;
///     let content = client.fetch_content(&handle).await?;
///     let summary = client.analyze(content.as_str(), "Summarize this document.").await?;
///     println!("{summary}");
///     Ok(())
/// }
/// ```
pub struct MoonshotClient {
    config: Arc<ClientConfig>,
    files_service: FilesService,
    chat_service: ChatService,
}

impl MoonshotClient {
    /// Creates a new client builder.
    pub fn builder() -> MoonshotClientBuilder {
        MoonshotClientBuilder::new()
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `MOONSHOT_API_KEY` and optionally `MOONSHOT_BASE_URL`,
    /// `MOONSHOT_TIMEOUT` and `MOONSHOT_MODEL`.
    pub fn from_env() -> ClientResult<Self> {
        MoonshotClientBuilder::new()
            .credential(Credential::from_env()?)
            .config(ClientConfig::from_env()?)
            .build()
    }

    /// Creates a client over an existing transport.
    pub fn with_transport(
        credential: Credential,
        config: Arc<ClientConfig>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        let auth: Arc<dyn AuthProvider> = Arc::new(BearerAuth::new(credential));

        Self {
            files_service: FilesService::new(
                Arc::clone(&transport),
                Arc::clone(&auth),
                Arc::clone(&config),
            ),
            chat_service: ChatService::new(transport, auth, Arc::clone(&config)),
            config,
        }
    }

    /// Returns the files service.
    pub fn files(&self) -> &FilesService {
        &self.files_service
    }

    /// Returns the chat service.
    pub fn chat(&self) -> &ChatService {
        &self.chat_service
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Uploads a file for extraction.
    pub async fn submit(&self, file: &UploadedFile) -> ClientResult<RemoteFileHandle> {
        self.files_service.submit(file).await
    }

    /// Polls until the file's text has been extracted.
    pub async fn fetch_content(&self, handle: &RemoteFileHandle) -> ClientResult<ExtractedContent> {
        self.files_service.fetch_content(handle).await
    }

    /// Analyzes `content` under a system `instruction`.
    #[instrument(skip_all)]
    pub async fn analyze(&self, content: &str, instruction: &str) -> ClientResult<String> {
        self.chat_service
            .analyze(&AnalysisRequest::new(content, instruction))
            .await
    }
}

impl std::fmt::Debug for MoonshotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoonshotClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for the Moonshot client.
#[derive(Default)]
pub struct MoonshotClientBuilder {
    api_key: Option<String>,
    credential: Option<Credential>,
    config: Option<ClientConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl MoonshotClientBuilder {
    /// Creates a new client builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets an already validated credential.
    #[must_use]
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets a custom transport.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client.
    pub fn build(self) -> ClientResult<MoonshotClient> {
        let credential = match (self.credential, self.api_key) {
            (Some(credential), _) => credential,
            (None, Some(api_key)) => Credential::new(api_key)?,
            (None, None) => return Err(ClientError::configuration("API key is required")),
        };

        let config = self.config.unwrap_or_default();

        let transport: Arc<dyn HttpTransport> = match self.transport {
            Some(t) => t,
            None => Arc::new(
                HttpTransportImpl::new(&config.base_url, config.timeout)
                    .map_err(|e| ClientError::configuration(e.to_string()))?,
            ),
        };

        Ok(MoonshotClient::with_transport(
            credential,
            Arc::new(config),
            transport,
        ))
    }
}

impl std::fmt::Debug for MoonshotClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MoonshotClientBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
