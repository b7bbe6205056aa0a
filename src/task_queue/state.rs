//! Processing state reported by `status`

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::QueueResult;
use crate::storage::{KeyValueStore, load, save};

/// Store key holding the last tick's state
pub const STATE_KEY: &str = "seo_autolink_processing_state";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingState {
    pub in_progress: bool,
    pub last_run: Option<DateTime<Utc>>,
    /// Items handled by the most recent tick
    pub last_processed: usize,
}

impl ProcessingState {
    /// Stored state, or the default when none was written yet
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is malformed.
    pub fn load(store: &dyn KeyValueStore) -> QueueResult<Self> {
        Ok(load(store, STATE_KEY)?.unwrap_or_default())
    }

    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn save(&self, store: &dyn KeyValueStore) -> QueueResult<()> {
        Ok(save(store, STATE_KEY, self)?)
    }
}
