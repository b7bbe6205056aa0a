//! Persisted FIFO of items awaiting optimization
//!
//! The queue is a single JSON array under one store key. Every mutation is a
//! compare-and-swap loop, so an `enqueue` from a save event can race a tick's
//! `pop_front` without either update being lost.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::errors::QueueResult;
use crate::runtime::Clock;
use crate::storage::{KeyValueStore, StoreResult, update};

/// Store key holding the pending task list
pub const QUEUE_KEY: &str = "seo_autolink_task_queue";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueTask {
    pub item_id: u64,
    /// Opaque caller-supplied context (e.g. `{"source": "save"}`)
    #[serde(default)]
    pub context: Map<String, Value>,
    pub queued_at: DateTime<Utc>,
}

pub struct TaskQueue {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    key: String,
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

fn decode(value: Option<&Value>) -> StoreResult<Vec<QueueTask>> {
    match value {
        Some(value) => Ok(serde_json::from_value(value.clone())?),
        None => Ok(Vec::new()),
    }
}

fn encode(tasks: &[QueueTask]) -> StoreResult<Option<Value>> {
    if tasks.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_value(tasks)?))
    }
}

impl TaskQueue {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            key: QUEUE_KEY.to_string(),
        }
    }

    /// Use a different store key (separate queues sharing one store)
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Append `item_id` unless it is already queued. Id 0 is ignored.
    ///
    /// Returns whether a task was added.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or holds a malformed queue.
    pub fn enqueue(&self, item_id: u64, context: Map<String, Value>) -> QueueResult<bool> {
        if item_id == 0 {
            return Ok(false);
        }

        let queued_at = self.clock.now();
        let added = update(self.store.as_ref(), &self.key, |current| {
            let mut tasks = decode(current)?;
            if tasks.iter().any(|task| task.item_id == item_id) {
                return Ok((current.cloned(), false));
            }
            tasks.push(QueueTask {
                item_id,
                context: context.clone(),
                queued_at,
            });
            Ok((encode(&tasks)?, true))
        })?;

        if added {
            log::debug!("Queued item {item_id}");
        }
        Ok(added)
    }

    /// Remove and return up to `count` tasks from the front, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or holds a malformed queue.
    pub fn pop_front(&self, count: usize) -> QueueResult<Vec<QueueTask>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        Ok(update(self.store.as_ref(), &self.key, |current| {
            let mut tasks = decode(current)?;
            let taken: Vec<QueueTask> = tasks.drain(..count.min(tasks.len())).collect();
            Ok((encode(&tasks)?, taken))
        })?)
    }

    /// Put popped-but-unprocessed tasks back at the front in their original
    /// order. Tasks whose item was re-enqueued meanwhile are not duplicated;
    /// the returned task keeps its earlier position instead.
    ///
    /// Returns how many tasks were put back.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or holds a malformed queue.
    pub fn requeue_front(&self, returned: Vec<QueueTask>) -> QueueResult<usize> {
        if returned.is_empty() {
            return Ok(0);
        }

        Ok(update(self.store.as_ref(), &self.key, |current| {
            let queued = decode(current)?;
            let returned_ids: HashSet<u64> = returned.iter().map(|t| t.item_id).collect();

            let mut seen = HashSet::new();
            let mut tasks: Vec<QueueTask> = returned
                .iter()
                .filter(|task| seen.insert(task.item_id))
                .cloned()
                .collect();
            let count = tasks.len();
            tasks.extend(
                queued
                    .into_iter()
                    .filter(|task| !returned_ids.contains(&task.item_id)),
            );
            Ok((encode(&tasks)?, count))
        })?)
    }

    /// Snapshot of the pending tasks in order
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or holds a malformed queue.
    pub fn tasks(&self) -> QueueResult<Vec<QueueTask>> {
        Ok(decode(self.store.get(&self.key)?.as_ref())?)
    }

    /// # Errors
    ///
    /// Returns an error if the store fails or holds a malformed queue.
    pub fn len(&self) -> QueueResult<usize> {
        Ok(self.tasks()?.len())
    }

    /// # Errors
    ///
    /// Returns an error if the store fails or holds a malformed queue.
    pub fn is_empty(&self) -> QueueResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every pending task, returning how many there were
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or holds a malformed queue.
    pub fn clear(&self) -> QueueResult<usize> {
        let removed = self.store.remove(&self.key)?;
        Ok(decode(removed.as_ref())?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::ManualClock;
    use crate::storage::MemoryStore;
    use std::time::Duration;

    fn queue() -> (TaskQueue, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        (TaskQueue::new(Arc::new(MemoryStore::new()), clock.clone()), clock)
    }

    fn ids(tasks: &[QueueTask]) -> Vec<u64> {
        tasks.iter().map(|t| t.item_id).collect()
    }

    #[test]
    fn test_zero_id_is_ignored() {
        let (queue, _) = queue();
        assert!(!queue.enqueue(0, Map::new()).unwrap());
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_enqueue_records_time_and_context() {
        let (queue, clock) = queue();
        clock.advance(Duration::from_secs(30));
        let mut context = Map::new();
        context.insert("source".into(), Value::from("save"));

        queue.enqueue(7, context.clone()).unwrap();

        let tasks = queue.tasks().unwrap();
        assert_eq!(tasks[0].context, context);
        assert_eq!(tasks[0].queued_at, clock.now());
    }

    #[test]
    fn test_requeue_front_keeps_order_and_dedupes() {
        let (queue, _) = queue();
        for id in 1..=4 {
            queue.enqueue(id, Map::new()).unwrap();
        }
        let popped = queue.pop_front(3).unwrap();
        assert_eq!(ids(&popped), vec![1, 2, 3]);

        // Item 3 is saved again while the batch runs
        queue.enqueue(3, Map::new()).unwrap();
        queue.enqueue(5, Map::new()).unwrap();

        let returned = queue.requeue_front(popped[1..].to_vec()).unwrap();
        assert_eq!(returned, 2);
        assert_eq!(ids(&queue.tasks().unwrap()), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_pop_more_than_available() {
        let (queue, _) = queue();
        queue.enqueue(1, Map::new()).unwrap();
        assert_eq!(ids(&queue.pop_front(10).unwrap()), vec![1]);
        assert!(queue.pop_front(10).unwrap().is_empty());
        assert_eq!(queue.clear().unwrap(), 0);
    }
}
