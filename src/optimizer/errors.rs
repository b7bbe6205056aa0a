//! Error types for item optimization and content stores

use thiserror::Error;

use crate::storage::StoreError;
use crate::task_queue::QueueError;

pub type OptimizeResult<T> = Result<T, OptimizeError>;

#[derive(Debug, Error)]
pub enum OptimizeError {
    #[error("Content item {0} not found")]
    NotFound(u64),

    #[error("Content storage failed: {0}")]
    Store(#[from] StoreError),

    #[error("Queue operation failed: {0}")]
    Queue(#[from] QueueError),
}
