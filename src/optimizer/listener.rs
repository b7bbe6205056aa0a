//! Content change events
//!
//! The event source calls [`ContentChangeListener::on_content_saved`]
//! directly. [`ChangeDispatcher`] either queues the item for the background
//! worker or optimizes it right away, depending on the live configuration.

use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use super::autofill::{OptimizationReport, OptimizeOptions, OptimizeSource, SeoOptimizer};
use super::errors::OptimizeResult;
use crate::task_queue::TaskQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Saved,
    Revision,
    Autosave,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentChangeEvent {
    pub item_id: u64,
    pub item_type: String,
    pub kind: ChangeKind,
}

impl ContentChangeEvent {
    #[must_use]
    pub fn saved(item_id: u64, item_type: impl Into<String>) -> Self {
        Self {
            item_id,
            item_type: item_type.into(),
            kind: ChangeKind::Saved,
        }
    }
}

/// What the dispatcher did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchAction {
    /// Revision, autosave, unwatched type or missing id
    Ignored,
    Enqueued,
    /// The item was already waiting in the queue
    AlreadyQueued,
    Optimized(OptimizationReport),
}

pub trait ContentChangeListener: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if queueing or synchronous optimization fails.
    fn on_content_saved(&self, event: &ContentChangeEvent) -> OptimizeResult<DispatchAction>;
}

pub struct ChangeDispatcher {
    optimizer: Arc<SeoOptimizer>,
    queue: Arc<TaskQueue>,
    item_types: Vec<String>,
}

impl fmt::Debug for ChangeDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeDispatcher")
            .field("item_types", &self.item_types)
            .finish_non_exhaustive()
    }
}

impl ChangeDispatcher {
    pub fn new(optimizer: Arc<SeoOptimizer>, queue: Arc<TaskQueue>) -> Self {
        Self {
            optimizer,
            queue,
            item_types: Vec::new(),
        }
    }

    /// Only react to these item types (all types when empty)
    #[must_use]
    pub fn watching<I, S>(mut self, item_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.item_types = item_types.into_iter().map(Into::into).collect();
        self
    }

    fn watches(&self, item_type: &str) -> bool {
        self.item_types.is_empty() || self.item_types.iter().any(|t| t == item_type)
    }
}

impl ContentChangeListener for ChangeDispatcher {
    fn on_content_saved(&self, event: &ContentChangeEvent) -> OptimizeResult<DispatchAction> {
        if event.kind != ChangeKind::Saved || event.item_id == 0 || !self.watches(&event.item_type) {
            return Ok(DispatchAction::Ignored);
        }

        if self.optimizer.config().snapshot().background_processing() {
            let mut context = Map::new();
            context.insert("source".into(), Value::from(OptimizeSource::Save.to_string()));
            context.insert("item_type".into(), Value::from(event.item_type.clone()));

            return Ok(if self.queue.enqueue(event.item_id, context)? {
                DispatchAction::Enqueued
            } else {
                DispatchAction::AlreadyQueued
            });
        }

        let report = self
            .optimizer
            .optimize_item(event.item_id, OptimizeOptions::from_source(OptimizeSource::Save))?;
        Ok(DispatchAction::Optimized(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SeoConfig, SharedConfig};
    use crate::optimizer::{ContentItem, MemoryContentStore};
    use crate::runtime::ManualClock;
    use crate::storage::MemoryStore;

    fn dispatcher(background: bool) -> ChangeDispatcher {
        let clock = Arc::new(ManualClock::starting_now());
        let config = SeoConfig::builder()
            .background_processing(background)
            .build()
            .unwrap();
        let optimizer = SeoOptimizer::new(
            Arc::new(MemoryContentStore::with_items([ContentItem::new(3, "Figs")])),
            SharedConfig::new(config),
            clock.clone(),
        );
        let queue = TaskQueue::new(Arc::new(MemoryStore::new()), clock);
        ChangeDispatcher::new(Arc::new(optimizer), Arc::new(queue)).watching(["product"])
    }

    #[test]
    fn test_revisions_and_other_types_are_ignored() {
        let dispatcher = dispatcher(true);
        let mut revision = ContentChangeEvent::saved(3, "product");
        revision.kind = ChangeKind::Revision;

        assert_eq!(dispatcher.on_content_saved(&revision).unwrap(), DispatchAction::Ignored);
        assert_eq!(
            dispatcher
                .on_content_saved(&ContentChangeEvent::saved(3, "page"))
                .unwrap(),
            DispatchAction::Ignored
        );
    }

    #[test]
    fn test_background_mode_enqueues_once() {
        let dispatcher = dispatcher(true);
        let event = ContentChangeEvent::saved(3, "product");

        assert_eq!(dispatcher.on_content_saved(&event).unwrap(), DispatchAction::Enqueued);
        assert_eq!(dispatcher.on_content_saved(&event).unwrap(), DispatchAction::AlreadyQueued);
    }

    #[test]
    fn test_foreground_mode_optimizes_now() {
        let dispatcher = dispatcher(false);
        let action = dispatcher
            .on_content_saved(&ContentChangeEvent::saved(3, "product"))
            .unwrap();
        assert!(matches!(action, DispatchAction::Optimized(report) if report.changed()));
    }
}
