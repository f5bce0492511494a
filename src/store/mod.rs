//! Persisted credential storage.
//!
//! A single JSON record, `{"apiKey": "..."}`, stored under the fixed key
//! `moonshot_config`. The record is read at startup, written when the user
//! saves a key and removed on clear.
//!
//! By default the file lives at
//! `<config dir>/moonshot-digest/moonshot_config.json`; the location can be
//! overridden with [`CONFIG_FILE_ENV`] or [`FileCredentialStore::with_path`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::RwLock;

use crate::auth::Credential;

/// Key the record is stored under.
pub const CONFIG_KEY: &str = "moonshot_config";

/// Environment variable overriding the record's file path.
pub const CONFIG_FILE_ENV: &str = "MOONSHOT_CONFIG_FILE";

const APP_DIR: &str = "moonshot-digest";

/// Credential store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The record could not be read or written.
    #[error("Failed to access {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The record could not be encoded.
    #[error("Failed to encode credential record: {0}")]
    Encode(#[from] serde_json::Error),

    /// No location is available for the record.
    #[error("No configuration directory available")]
    NoConfigDir,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredConfig {
    #[serde(rename = "apiKey")]
    api_key: String,
}

/// Load / save / clear lifecycle of the persisted credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Reads the stored credential. A missing or malformed record is `None`.
    async fn load(&self) -> Result<Option<Credential>, StoreError>;

    /// Replaces the stored credential.
    async fn save(&self, credential: &Credential) -> Result<(), StoreError>;

    /// Removes the stored credential. Clearing an empty store succeeds.
    async fn clear(&self) -> Result<(), StoreError>;
}

fn decode(bytes: &[u8]) -> Option<Credential> {
    match serde_json::from_slice::<StoredConfig>(bytes) {
        Ok(record) => Credential::new(record.api_key).ok(),
        Err(err) => {
            tracing::warn!(error = %err, "Ignoring malformed credential record");
            None
        }
    }
}

fn encode(credential: &Credential) -> Result<Vec<u8>, StoreError> {
    let record = StoredConfig {
        api_key: credential.expose().to_string(),
    };
    Ok(serde_json::to_vec_pretty(&record)?)
}

/// Credential store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: Option<PathBuf>,
}

impl FileCredentialStore {
    /// Creates a store at the default location.
    pub fn new() -> Self {
        let path = std::env::var_os(CONFIG_FILE_ENV)
            .map(PathBuf::from)
            .or_else(|| {
                dirs::config_dir()
                    .map(|dir| dir.join(APP_DIR).join(format!("{CONFIG_KEY}.json")))
            });

        Self { path }
    }

    /// Creates a store at a custom path.
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Returns the record's path, if one could be determined.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn require_path(&self) -> Result<&Path, StoreError> {
        self.path().ok_or(StoreError::NoConfigDir)
    }
}

impl Default for FileCredentialStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        let Some(path) = self.path() else {
            return Ok(None);
        };

        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(decode(&bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        let path = self.require_path()?;
        let io_error = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
        }

        tokio::fs::write(path, encode(credential)?)
            .await
            .map_err(io_error)?;

        tracing::info!(path = %path.display(), key = %credential.hint(), "Credential saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        let path = self.require_path()?;

        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::info!(path = %path.display(), "Credential cleared");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }
}

/// In-memory credential store.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    record: RwLock<Option<Vec<u8>>>,
}

impl MemoryCredentialStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding a raw record, as if read from disk.
    pub fn with_raw(record: impl Into<Vec<u8>>) -> Self {
        Self {
            record: RwLock::new(Some(record.into())),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self) -> Result<Option<Credential>, StoreError> {
        Ok(self.record.read().await.as_deref().and_then(decode))
    }

    async fn save(&self, credential: &Credential) -> Result<(), StoreError> {
        *self.record.write().await = Some(encode(credential)?);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        *self.record.write().await = None;
        Ok(())
    }
}
