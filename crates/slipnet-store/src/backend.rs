//! Persistence Backends
//!
//! The store persists a single [`StateDocument`] holding both logical
//! records: the profile table and the settings record. A backend only has to
//! load and replace that document as a unit.
//!
//! [`JsonFileBackend`] writes `state.json` with the atomic write pattern:
//! the new document goes to a temp file that is then renamed over the old
//! one. A failed save leaves the previous file untouched.

use crate::error::StorageError;
use crate::record::ProfileRecord;
use crate::settings::Settings;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Version of the state document format
pub const FORMAT_VERSION: u32 = 1;

/// File name used inside the data directory
pub const STATE_FILE: &str = "state.json";

/// Everything the store persists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateDocument {
    pub version: u32,
    /// Next id to assign; ids are never reused
    pub next_id: u64,
    pub profiles: Vec<ProfileRecord>,
    pub settings: Settings,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            next_id: 1,
            profiles: Vec::new(),
            settings: Settings::default(),
        }
    }
}

/// Durable storage for the state document
pub trait Backend: Send + Sync + 'static {
    /// Load the stored document, `None` if nothing has been saved yet
    fn load(&self) -> impl Future<Output = Result<Option<StateDocument>, StorageError>> + Send;

    /// Replace the stored document. Either fully applied or not at all.
    fn save(&self, doc: &StateDocument) -> impl Future<Output = Result<(), StorageError>> + Send;
}

/// JSON file backend
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    /// Store `state.json` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::at(dir.as_ref().join(STATE_FILE))
    }

    /// Store the document at an explicit path
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(path: &Path, source: std::io::Error) -> StorageError {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Flush the directory entry so the rename survives a crash
    #[cfg(unix)]
    async fn sync_parent(&self) -> Result<(), StorageError> {
        let dir = match self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            Some(dir) => dir,
            None => Path::new("."),
        };
        let handle = fs::File::open(dir).await.map_err(|e| Self::io_error(dir, e))?;
        handle.sync_all().await.map_err(|e| Self::io_error(dir, e))
    }

    #[cfg(not(unix))]
    async fn sync_parent(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn write_temp(&self, temp: &Path, bytes: &[u8]) -> Result<(), StorageError> {
        let mut file = fs::File::create(temp)
            .await
            .map_err(|e| Self::io_error(temp, e))?;
        file.write_all(bytes).await.map_err(|e| Self::io_error(temp, e))?;
        file.sync_all().await.map_err(|e| Self::io_error(temp, e))?;
        Ok(())
    }
}

impl Backend for JsonFileBackend {
    async fn load(&self) -> Result<Option<StateDocument>, StorageError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No state file at {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(Self::io_error(&self.path, e)),
        };

        let doc: StateDocument = serde_json::from_slice(&bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        if doc.version > FORMAT_VERSION {
            warn!(
                "State file version {} is newer than supported {}, loading leniently",
                doc.version, FORMAT_VERSION
            );
        }

        Ok(Some(doc))
    }

    async fn save(&self, doc: &StateDocument) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| Self::io_error(dir, e))?;
        }

        // Write to temp file first, then rename over the old document
        let temp = self.temp_path();
        if let Err(e) = self.write_temp(&temp, &bytes).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(Self::io_error(&self.path, e));
        }
        self.sync_parent().await?;

        debug!("Saved state ({} bytes) to {}", bytes.len(), self.path.display());
        Ok(())
    }
}

/// In-memory backend for ephemeral stores and tests
#[derive(Debug, Default)]
pub struct MemoryBackend {
    doc: Mutex<Option<StateDocument>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document
    pub fn with_document(doc: StateDocument) -> Self {
        Self {
            doc: Mutex::new(Some(doc)),
        }
    }

    /// Last saved document
    pub fn document(&self) -> Option<StateDocument> {
        self.doc.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Backend for MemoryBackend {
    async fn load(&self) -> Result<Option<StateDocument>, StorageError> {
        Ok(self.document())
    }

    async fn save(&self, doc: &StateDocument) -> Result<(), StorageError> {
        *self.doc.lock().unwrap_or_else(|e| e.into_inner()) = Some(doc.clone());
        Ok(())
    }
}
