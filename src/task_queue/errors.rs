//! Error types for the background queue and its lock

use thiserror::Error;

use crate::storage::StoreError;

/// Result type alias for queue operations
pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue storage failed: {0}")]
    Store(#[from] StoreError),

    /// A stored record could not be decoded
    #[error("Malformed queue record: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The prepared bulk run is missing or past its expiry
    #[error("Bulk run session expired or was never prepared; start it again")]
    BatchExpired,

    /// The worker thread running a tick panicked or was cancelled
    #[error("Queue tick task failed: {0}")]
    TickJoin(String),
}
