//! File upload and extraction types.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::limits::mime_for_name;

/// Purpose tag that asks the service to extract text from an upload.
pub const FILE_EXTRACT_PURPOSE: &str = "file-extract";

/// A file held in memory, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// File name, including extension.
    pub name: String,
    /// File contents.
    pub data: Bytes,
    /// Declared MIME type, if the caller knows it.
    pub mime_type: Option<String>,
}

impl UploadedFile {
    /// Creates a file from a name and contents.
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
            mime_type: None,
        }
    }

    /// Sets the declared MIME type.
    #[must_use]
    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Reads a file from disk.
    pub async fn from_path(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        Ok(Self::new(name, data))
    }

    /// Size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Content type sent with the upload.
    pub fn content_type(&self) -> String {
        self.mime_type
            .clone()
            .or_else(|| mime_for_name(&self.name).map(ToString::to_string))
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string())
    }
}

/// Identifier of an uploaded file on the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteFileHandle(String);

impl RemoteFileHandle {
    /// Wraps a remote file id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteFileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RemoteFileHandle {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Response of `POST /files`.
///
/// Only the id matters; everything else the service returns is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileUploadResponse {
    /// Remote file id.
    #[serde(default)]
    pub id: Option<String>,
    /// File name as stored remotely.
    #[serde(default)]
    pub filename: Option<String>,
    /// Size in bytes as stored remotely.
    #[serde(default)]
    pub bytes: Option<u64>,
    /// Remote processing status.
    #[serde(default)]
    pub status: Option<String>,
}

impl FileUploadResponse {
    /// Returns the id if it is present and non-empty.
    pub fn handle(&self) -> Option<RemoteFileHandle> {
        self.id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(RemoteFileHandle::new)
    }
}

/// Text recovered from an uploaded file. Never empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent(String);

impl ExtractedContent {
    /// Wraps text, rejecting blank input.
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    /// Returns the text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the wrapper.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ExtractedContent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExtractedContent {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
