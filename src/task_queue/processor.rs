//! One bounded tick of background queue processing
//!
//! A tick takes the queue lock, drains up to `batch_size` tasks in FIFO
//! order, heartbeats the lock after every item, and always writes the
//! processing state and releases the lock before returning. Only one tick
//! runs at a time per store; a tick that cannot take the lock is skipped.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::errors::QueueResult;
use super::lock::{LockGuard, LockManager, LockRecord, calculate_lock_ttl};
use super::queue::{QueueTask, TaskQueue};
use super::state::ProcessingState;
use crate::config::{LockLossPolicy, SeoConfig, SharedConfig};
use crate::optimizer::OptimizeError;
use crate::runtime::Clock;
use crate::storage::KeyValueStore;
use crate::utils::QUEUE_HOOK;

/// Per-item operation run by the processor.
///
/// Returns the number of changes made to the item.
pub trait ItemOptimizer: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the item could not be optimized. The processor
    /// logs it and moves on to the next task.
    fn optimize_queued(&self, task: &QueueTask) -> Result<usize, OptimizeError>;
}

impl<F> ItemOptimizer for F
where
    F: Fn(&QueueTask) -> Result<usize, OptimizeError> + Send + Sync,
{
    fn optimize_queued(&self, task: &QueueTask) -> Result<usize, OptimizeError> {
        self(task)
    }
}

/// Counters for one completed tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Tasks taken off the queue and handled (including failures)
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Tasks still queued after the tick
    pub remaining: usize,
    /// Popped tasks put back because the tick stopped early
    pub requeued: usize,
    pub lock_lost: bool,
    pub timed_out: bool,
    /// Delay before the follow-up tick, when work remains
    #[serde(skip)]
    pub next_tick: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another worker holds the queue lock
    Skipped,
    Completed(TickReport),
}

/// Snapshot for the `status` command
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub pending: usize,
    pub state: ProcessingState,
    pub lock: Option<LockRecord>,
    pub lock_active: bool,
}

pub struct QueueProcessor {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: SharedConfig,
    optimizer: Arc<dyn ItemOptimizer>,
    queue: TaskQueue,
    locks: LockManager,
}

impl fmt::Debug for QueueProcessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueProcessor")
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

impl QueueProcessor {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: SharedConfig,
        optimizer: Arc<dyn ItemOptimizer>,
    ) -> Self {
        Self {
            queue: TaskQueue::new(store.clone(), clock.clone()),
            locks: LockManager::new(store.clone(), clock.clone()),
            store,
            clock,
            config,
            optimizer,
        }
    }

    #[must_use]
    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    #[must_use]
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    #[must_use]
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// # Errors
    ///
    /// Returns an error if the store fails or holds malformed records.
    pub fn status(&self) -> QueueResult<QueueStatus> {
        let lock = self.locks.current(QUEUE_HOOK)?;
        let now = self.clock.now();
        Ok(QueueStatus {
            pending: self.queue.len()?,
            state: ProcessingState::load(self.store.as_ref())?,
            lock_active: lock.as_ref().is_some_and(|record| !record.is_expired(now)),
            lock,
        })
    }

    /// Run one tick.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue itself cannot be read or written. The
    /// processing state is still written and the lock released in that case.
    /// Failures of individual items are counted, not returned.
    pub fn run_tick(&self) -> QueueResult<TickOutcome> {
        let config = self.config.snapshot();
        let ttl = calculate_lock_ttl(
            config.task_timeout_secs(),
            config.batch_size(),
            config.per_item_time_budget_secs(),
            config.lock_safety_margin_secs(),
        );

        let Some(guard) = self.locks.acquire_guard(QUEUE_HOOK, ttl)? else {
            log::info!("Queue tick skipped: another worker holds the queue lock");
            return Ok(TickOutcome::Skipped);
        };

        let started = self.clock.now();
        self.write_state(true, None, 0);

        let mut report = TickReport::default();
        let drained = self.drain(&guard, &config, ttl, started, &mut report);
        self.finish(guard, &config, &mut report);

        drained.map(|()| TickOutcome::Completed(report))
    }

    fn drain(
        &self,
        guard: &LockGuard<'_>,
        config: &SeoConfig,
        ttl: u64,
        started: DateTime<Utc>,
        report: &mut TickReport,
    ) -> QueueResult<()> {
        let mut pending: VecDeque<QueueTask> = self.queue.pop_front(config.batch_size())?.into();

        while let Some(task) = pending.pop_front() {
            self.run_item(&task, report);

            if !report.lock_lost && !self.heartbeat(guard, ttl, task.item_id) {
                report.lock_lost = true;
                if config.lock_loss_policy() == LockLossPolicy::Abort {
                    break;
                }
            }

            if pending.is_empty() {
                break;
            }

            if let Some(pause) = throttle_interval(config.queries_per_minute()) {
                self.clock.sleep(pause);
            }

            if budget_exhausted(started, self.clock.now(), config.task_timeout_secs()) {
                log::info!(
                    "Queue tick time budget of {}s used up after {} item(s)",
                    config.task_timeout_secs(),
                    report.processed
                );
                report.timed_out = true;
                break;
            }
        }

        report.requeued = self.queue.requeue_front(pending.into())?;
        Ok(())
    }

    fn run_item(&self, task: &QueueTask, report: &mut TickReport) {
        report.processed += 1;

        if task.item_id == 0 {
            log::warn!("Skipping queued task without an item id");
            return;
        }

        let result = catch_unwind(AssertUnwindSafe(|| self.optimizer.optimize_queued(task)));
        match result {
            Ok(Ok(changes)) => {
                report.succeeded += 1;
                log::debug!("Optimized queued item {} ({changes} change(s))", task.item_id);
            }
            Ok(Err(e)) => {
                report.failed += 1;
                log::error!("Failed to optimize queued item {}: {e}", task.item_id);
            }
            Err(payload) => {
                report.failed += 1;
                log::error!(
                    "Optimizing queued item {} panicked: {}",
                    task.item_id,
                    panic_message(payload.as_ref())
                );
            }
        }
    }

    /// Returns `false` when the lock can no longer be confirmed
    fn heartbeat(&self, guard: &LockGuard<'_>, ttl: u64, item_id: u64) -> bool {
        match guard.refresh(ttl) {
            Ok(true) => true,
            Ok(false) => {
                log::warn!(
                    "Queue lock refresh failed after item {item_id}; lock may have been stolen"
                );
                false
            }
            Err(e) => {
                log::warn!("Queue lock refresh errored after item {item_id}: {e}");
                false
            }
        }
    }

    fn finish(&self, guard: LockGuard<'_>, config: &SeoConfig, report: &mut TickReport) {
        report.remaining = self.queue.len().unwrap_or_else(|e| {
            log::error!("Failed to read queue length: {e}");
            0
        });
        if report.remaining > 0 {
            report.next_tick = Some(Duration::from_secs(config.batch_delay_secs().max(1)));
        }

        self.write_state(false, Some(self.clock.now()), report.processed);

        match guard.release() {
            Ok(true) => {}
            Ok(false) if report.lock_lost => {}
            Ok(false) => log::warn!("Queue lock was no longer held at the end of the tick"),
            Err(e) => log::error!("Failed to release queue lock: {e}"),
        }

        log::info!(
            "Queue tick: {} processed ({} ok, {} failed), {} requeued, {} remaining{}{}",
            report.processed,
            report.succeeded,
            report.failed,
            report.requeued,
            report.remaining,
            if report.timed_out { ", time budget reached" } else { "" },
            if report.lock_lost { ", lock lost" } else { "" },
        );
    }

    fn write_state(&self, in_progress: bool, last_run: Option<DateTime<Utc>>, processed: usize) {
        let previous = ProcessingState::load(self.store.as_ref()).unwrap_or_default();
        let state = ProcessingState {
            in_progress,
            last_run: last_run.or(previous.last_run),
            last_processed: if in_progress {
                previous.last_processed
            } else {
                processed
            },
        };
        if let Err(e) = state.save(self.store.as_ref()) {
            log::error!("Failed to write queue processing state: {e}");
        }
    }
}

/// Pause between items for a per-minute ceiling, `None` when unthrottled
#[must_use]
pub fn throttle_interval(queries_per_minute: u32) -> Option<Duration> {
    (queries_per_minute > 0).then(|| Duration::from_secs_f64(60.0 / f64::from(queries_per_minute)))
}

fn budget_exhausted(started: DateTime<Utc>, now: DateTime<Utc>, timeout_secs: u64) -> bool {
    if timeout_secs == 0 {
        return false;
    }
    let elapsed = (now - started).num_milliseconds();
    u64::try_from(elapsed).unwrap_or(0) >= timeout_secs.saturating_mul(1000)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
