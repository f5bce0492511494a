//! File upload and content extraction service.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

use super::ensure_success;
use crate::auth::AuthProvider;
use crate::config::ClientConfig;
use crate::errors::{ClientError, ClientResult, PROCESSING_STATUS};
use crate::resilience::{BackoffExecutor, RetryPolicy};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport, MultipartRequest};
use crate::types::files::{
    ExtractedContent, FileUploadResponse, RemoteFileHandle, UploadedFile, FILE_EXTRACT_PURPOSE,
};
use crate::types::limits::is_within_size_limit;

/// One way of reading extracted text out of a content response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentExtractor {
    /// The `text` field of a JSON object.
    TextField,
    /// The `content` field of a JSON object.
    ContentField,
    /// The body itself: a JSON string, or the raw text if it is not JSON.
    RawBody,
}

impl ContentExtractor {
    /// Extractors in the order they are tried.
    pub const ORDER: [ContentExtractor; 3] = [
        ContentExtractor::TextField,
        ContentExtractor::ContentField,
        ContentExtractor::RawBody,
    ];

    /// Returns the name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            ContentExtractor::TextField => "text",
            ContentExtractor::ContentField => "content",
            ContentExtractor::RawBody => "raw",
        }
    }

    /// Applies the extractor to a body and its JSON parse, if it parsed.
    pub fn extract(self, body: &[u8], json: Option<&serde_json::Value>) -> Option<String> {
        match self {
            ContentExtractor::TextField => field(json?, "text"),
            ContentExtractor::ContentField => field(json?, "content"),
            ContentExtractor::RawBody => match json {
                Some(serde_json::Value::String(text)) => Some(text.clone()),
                Some(_) => None,
                None => std::str::from_utf8(body).ok().map(ToString::to_string),
            },
        }
    }
}

fn field(json: &serde_json::Value, name: &str) -> Option<String> {
    json.get(name)?.as_str().map(ToString::to_string)
}

/// Runs the extractors in order and returns the first text that is
/// non-empty after trimming. The text itself is returned untrimmed.
pub fn extract_text(body: &[u8], extractors: &[ContentExtractor]) -> Option<ExtractedContent> {
    let json = serde_json::from_slice::<serde_json::Value>(body).ok();

    extractors.iter().find_map(|extractor| {
        let text = extractor.extract(body, json.as_ref())?;
        let content = ExtractedContent::new(text)?;
        tracing::debug!(extractor = extractor.name(), "Extracted file content");
        Some(content)
    })
}

/// A body with nothing in it yet: blank, JSON `null` or an empty JSON string.
fn is_body_absent(response: &HttpResponse) -> bool {
    if response.is_body_empty() {
        return true;
    }

    match response.json::<serde_json::Value>() {
        Ok(serde_json::Value::Null) => true,
        Ok(serde_json::Value::String(text)) => text.is_empty(),
        _ => false,
    }
}

/// File upload and extraction service.
pub struct FilesService {
    transport: Arc<dyn HttpTransport>,
    auth: Arc<dyn AuthProvider>,
    config: Arc<ClientConfig>,
}

impl FilesService {
    /// Creates a new files service.
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        auth: Arc<dyn AuthProvider>,
        config: Arc<ClientConfig>,
    ) -> Self {
        Self {
            transport,
            auth,
            config,
        }
    }

    /// Uploads a file for extraction and returns its remote handle.
    ///
    /// Files over the size limit are rejected without a network call.
    #[instrument(skip(self, file), fields(file = %file.name, size = file.size()))]
    pub async fn submit(&self, file: &UploadedFile) -> ClientResult<RemoteFileHandle> {
        if !is_within_size_limit(file.size(), self.config.max_upload_size) {
            return Err(ClientError::payload_too_large());
        }

        let request = self.build_upload_request(file);
        let executor = BackoffExecutor::new(self.config.upload_retry);

        let response = executor
            .execute(|| {
                let transport = Arc::clone(&self.transport);
                let req = request.clone();
                async move { ensure_success(transport.send_multipart(req).await?) }
            })
            .await?;

        let handle = response
            .json::<FileUploadResponse>()
            .ok()
            .and_then(|body| body.handle())
            .ok_or_else(ClientError::upload_failed)?;

        tracing::info!(file_id = %handle, "File uploaded");
        Ok(handle)
    }

    /// Waits for the remote extraction to finish and returns the text.
    ///
    /// Sleeps for the settle delay first, then polls while the service
    /// answers 202, 429 or 5xx.
    #[instrument(skip(self), fields(file_id = %handle))]
    pub async fn fetch_content(&self, handle: &RemoteFileHandle) -> ClientResult<ExtractedContent> {
        tokio::time::sleep(self.config.settle_delay).await;

        let request = self.build_content_request(handle);
        let executor =
            BackoffExecutor::new(self.config.poll_retry).with_policy(RetryPolicy::polling());

        let content = executor
            .execute(|| {
                let transport = Arc::clone(&self.transport);
                let req = request.clone();
                async move { Self::read_content(transport.send(req).await?) }
            })
            .await?;

        tracing::info!(chars = content.as_str().chars().count(), "File content extracted");
        Ok(content)
    }

    fn read_content(response: HttpResponse) -> ClientResult<ExtractedContent> {
        let response = ensure_success(response)?;

        if response.status == PROCESSING_STATUS || is_body_absent(&response) {
            return Err(ClientError::processing());
        }

        extract_text(&response.body, &ContentExtractor::ORDER)
            .ok_or_else(ClientError::extraction_failed)
    }

    fn build_upload_request(&self, file: &UploadedFile) -> MultipartRequest {
        let mut request = MultipartRequest::new("files")
            .file("file", &file.name, file.content_type(), file.data.clone())
            .text("purpose", FILE_EXTRACT_PURPOSE);
        self.auth.apply_auth(&mut request.headers);
        request
    }

    fn build_content_request(&self, handle: &RemoteFileHandle) -> HttpRequest {
        let mut headers = HashMap::new();
        self.auth.apply_auth(&mut headers);

        let mut request = HttpRequest::get(format!("files/{}/content", handle.as_str()));
        request.headers = headers;
        request
    }
}

impl std::fmt::Debug for FilesService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilesService")
            .field("auth", &self.auth.scheme())
            .finish_non_exhaustive()
    }
}
