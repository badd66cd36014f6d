//! Store errors

use crate::profile::ProfileId;
use crate::validate::ValidationError;
use std::io;
use std::path::PathBuf;

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence failures
///
/// When one of these is returned the write did not happen: in-memory and
/// on-disk state are both unchanged.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The write task was cancelled by runtime shutdown
    #[error("Write aborted: {0}")]
    Aborted(String),
}

/// Configuration store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Profile {0} not found")]
    NotFound(ProfileId),

    #[error("Invalid profile: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
