//! Error types for key-value storage

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for storage operations
pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored value could not be converted to or from its typed form
    #[error("Failed to (de)serialize stored value: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Atomic rename of the temporary store file failed
    #[error("Failed to persist store file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Store file {path:?} does not contain a JSON object")]
    Corrupt { path: PathBuf },

    /// A read-modify-write kept losing the compare-and-swap race
    #[error("Too much contention updating key '{key}'")]
    Contention { key: String },
}
