//! Prepared bulk link runs
//!
//! `prepare` stores the item ids to walk with a one-hour expiry; each call to
//! `next_batch` handles the next chunk, writes back items whose content
//! changed, and pushes the expiry out again. Once every id is handled the run
//! is deleted, so a further `next_batch` reports an expired run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::content_store::ContentStore;
use super::errors::OptimizeResult;
use crate::config::SharedConfig;
use crate::runtime::Clock;
use crate::storage::{KeyValueStore, load, save};
use crate::task_queue::QueueError;
use crate::utils::{BULK_CHUNK_SIZE, BULK_RUN_TTL_SECS};

/// Store key holding the prepared run
pub const BULK_RUN_KEY: &str = "seo_autolink_bulk_run";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BulkAction {
    ApplyLinks,
    RemoveLinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct PreparedRun {
    pending: Vec<u64>,
    total: usize,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    /// No ids remain after this batch
    pub done: bool,
    /// Items in this batch whose content changed
    pub processed_count: usize,
    /// Ids handled in this batch
    pub batch_total: usize,
    pub remaining: usize,
    pub total: usize,
    pub messages: Vec<String>,
}

pub struct BulkLinkRun {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    content: Arc<dyn ContentStore>,
    config: SharedConfig,
}

impl fmt::Debug for BulkLinkRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BulkLinkRun").finish_non_exhaustive()
    }
}

impl BulkLinkRun {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        content: Arc<dyn ContentStore>,
        config: SharedConfig,
    ) -> Self {
        Self {
            store,
            clock,
            content,
            config,
        }
    }

    fn expiry(&self) -> DateTime<Utc> {
        self.clock.now() + chrono::Duration::seconds(i64::try_from(BULK_RUN_TTL_SECS).unwrap_or(i64::MAX))
    }

    /// Start a run over `ids`, replacing any previous run. Zero and duplicate
    /// ids are dropped. Returns the number of ids to process.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn prepare(&self, ids: impl IntoIterator<Item = u64>) -> OptimizeResult<usize> {
        let mut seen = HashSet::new();
        let pending: Vec<u64> = ids
            .into_iter()
            .filter(|id| *id != 0 && seen.insert(*id))
            .collect();

        let run = PreparedRun {
            total: pending.len(),
            pending,
            expires_at: self.expiry(),
        };
        save(self.store.as_ref(), BULK_RUN_KEY, &run)?;
        log::info!("Prepared bulk link run over {} item(s)", run.total);
        Ok(run.total)
    }

    /// Handle the next chunk of the prepared run.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError::BatchExpired`] when no run is prepared or it has
    /// expired, or an error if a store fails.
    pub fn next_batch(&self, action: BulkAction) -> OptimizeResult<BatchProgress> {
        let run = load::<PreparedRun>(self.store.as_ref(), BULK_RUN_KEY)?
            .filter(|run| run.expires_at > self.clock.now());
        let Some(mut run) = run else {
            self.store.remove(BULK_RUN_KEY)?;
            return Err(QueueError::BatchExpired.into());
        };

        let config = self.config.snapshot();
        let engine = config.link_engine();
        let site_url = config.site_url();
        if action == BulkAction::RemoveLinks && site_url.is_none() {
            log::warn!("No site_url configured; bulk link removal leaves content unchanged");
        }

        let batch: Vec<u64> = run.pending.drain(..BULK_CHUNK_SIZE.min(run.pending.len())).collect();
        let mut progress = BatchProgress {
            batch_total: batch.len(),
            total: run.total,
            ..BatchProgress::default()
        };

        for id in batch {
            let Some(mut item) = self.content.get_content(id)? else {
                log::debug!("Bulk run: item {id} no longer exists");
                continue;
            };
            if item.content.trim().is_empty() {
                continue;
            }

            let updated = match (action, site_url) {
                (BulkAction::ApplyLinks, _) => engine.apply_rules(&item.content, config.rules()),
                (BulkAction::RemoveLinks, Some(site_url)) => {
                    engine.remove_internal_links(&item.content, site_url).content
                }
                (BulkAction::RemoveLinks, None) => continue,
            };
            if updated == item.content {
                continue;
            }

            item.content = updated;
            item.modified_at = Some(self.clock.now());
            self.content.save_content(&item)?;

            progress.processed_count += 1;
            progress.messages.push(format!(
                "{}: {}",
                item.title,
                match action {
                    BulkAction::ApplyLinks => "links added",
                    BulkAction::RemoveLinks => "links removed",
                }
            ));
        }

        progress.remaining = run.pending.len();
        progress.done = run.pending.is_empty();
        if progress.done {
            self.store.remove(BULK_RUN_KEY)?;
            log::info!("Bulk link run finished ({} item(s))", run.total);
        } else {
            run.expires_at = self.expiry();
            save(self.store.as_ref(), BULK_RUN_KEY, &run)?;
        }

        Ok(progress)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SeoConfig;
    use crate::link_rules::LinkRule;
    use crate::optimizer::{ContentItem, MemoryContentStore, OptimizeError};
    use crate::runtime::ManualClock;
    use crate::storage::MemoryStore;
    use std::time::Duration;

    fn run(items: Vec<ContentItem>) -> (BulkLinkRun, Arc<ManualClock>, Arc<MemoryContentStore>) {
        let clock = Arc::new(ManualClock::starting_now());
        let content = Arc::new(MemoryContentStore::with_items(items));
        let config = SeoConfig::builder()
            .rule(LinkRule::new("dates", "https://shop.test/dates").unwrap())
            .site_url("https://shop.test")
            .build()
            .unwrap();
        let bulk = BulkLinkRun::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            content.clone(),
            SharedConfig::new(config),
        );
        (bulk, clock, content)
    }

    fn expired(result: OptimizeResult<BatchProgress>) -> bool {
        matches!(result, Err(OptimizeError::Queue(QueueError::BatchExpired)))
    }

    #[test]
    fn test_chunks_of_five_until_done() {
        let items = (1..=7)
            .map(|id| ContentItem::new(id, format!("Item {id}")).with_content("<p>dates</p>"))
            .collect();
        let (bulk, _, content) = run(items);
        assert_eq!(bulk.prepare(1..=7).unwrap(), 7);

        let first = bulk.next_batch(BulkAction::ApplyLinks).unwrap();
        assert_eq!((first.batch_total, first.processed_count, first.remaining), (5, 5, 2));
        assert!(!first.done);

        let second = bulk.next_batch(BulkAction::ApplyLinks).unwrap();
        assert!(second.done);
        assert_eq!(second.messages.len(), 2);
        assert!(content.get_content(7).unwrap().unwrap().content.contains("<a "));

        assert!(expired(bulk.next_batch(BulkAction::ApplyLinks)));
    }

    #[test]
    fn test_remove_links() {
        let item = ContentItem::new(1, "Dates")
            .with_content(r#"<p>Buy <a href="https://shop.test/dates">dates</a></p>"#);
        let (bulk, _, content) = run(vec![item]);
        bulk.prepare([1]).unwrap();

        let progress = bulk.next_batch(BulkAction::RemoveLinks).unwrap();
        assert_eq!(progress.processed_count, 1);
        assert_eq!(content.get_content(1).unwrap().unwrap().content, "<p>Buy dates</p>");
    }

    #[test]
    fn test_run_expires_after_an_hour() {
        let (bulk, clock, _) = run(Vec::new());
        assert!(expired(bulk.next_batch(BulkAction::ApplyLinks)));

        bulk.prepare([1, 2]).unwrap();
        clock.advance(Duration::from_secs(BULK_RUN_TTL_SECS + 1));
        assert!(expired(bulk.next_batch(BulkAction::ApplyLinks)));
    }
}
