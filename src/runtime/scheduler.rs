//! Async worker loop driving queue ticks
//!
//! Ticks are synchronous (HTML parsing, store writes, rate-limit sleeps), so
//! each one runs on tokio's blocking pool. Between ticks the worker waits
//! either the follow-up delay reported by the tick or the idle interval, and
//! exits as soon as the shutdown signal flips.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::task_queue::{QueueError, QueueProcessor, QueueResult, TickOutcome};
use crate::utils::MIN_SCHEDULE_INTERVAL_SECS;

/// Totals for one worker run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    pub ticks: usize,
    pub skipped: usize,
    pub processed: usize,
    pub failed_ticks: usize,
}

/// Wait used when the queue is drained or the lock is busy
#[must_use]
pub fn idle_interval(batch_delay_secs: u64) -> Duration {
    Duration::from_secs(MIN_SCHEDULE_INTERVAL_SECS.max(batch_delay_secs.saturating_mul(2)))
}

/// Run one tick on the blocking pool.
///
/// # Errors
///
/// Returns the tick's own error, or [`QueueError::TickJoin`] if the blocking
/// task panicked outside the per-item guard or was cancelled.
pub async fn run_tick_async(processor: Arc<QueueProcessor>) -> QueueResult<TickOutcome> {
    tokio::task::spawn_blocking(move || processor.run_tick())
        .await
        .map_err(|e| QueueError::TickJoin(e.to_string()))?
}

/// Drive ticks until `shutdown` becomes `true` (or its sender is dropped).
pub async fn run_worker(
    processor: Arc<QueueProcessor>,
    mut shutdown: watch::Receiver<bool>,
) -> WorkerSummary {
    let mut summary = WorkerSummary::default();
    log::info!("Queue worker started");

    while !*shutdown.borrow() {
        let idle = idle_interval(processor.config().snapshot().batch_delay_secs());

        let wait = match run_tick_async(processor.clone()).await {
            Ok(TickOutcome::Completed(report)) => {
                summary.ticks += 1;
                summary.processed += report.processed;
                report.next_tick.unwrap_or(idle)
            }
            Ok(TickOutcome::Skipped) => {
                summary.skipped += 1;
                idle
            }
            Err(e) => {
                summary.failed_ticks += 1;
                log::error!("Queue tick failed: {e}");
                idle
            }
        };

        log::debug!("Next queue tick in {}s", wait.as_secs_f64());
        tokio::select! {
            () = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    log::info!(
        "Queue worker stopped after {} tick(s), {} item(s) processed",
        summary.ticks,
        summary.processed
    );
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SeoConfig, SharedConfig};
    use crate::optimizer::OptimizeError;
    use crate::runtime::SystemClock;
    use crate::storage::MemoryStore;
    use crate::task_queue::QueueTask;
    use serde_json::Map;

    #[test]
    fn test_idle_interval_floor() {
        assert_eq!(idle_interval(5), Duration::from_secs(60));
        assert_eq!(idle_interval(45), Duration::from_secs(90));
    }

    #[tokio::test]
    async fn test_worker_drains_queue_then_stops() {
        let optimizer = |_: &QueueTask| -> Result<usize, OptimizeError> { Ok(1) };
        let config = SeoConfig::builder()
            .batch_size(1)
            .batch_delay_secs(0)
            .queries_per_minute(0)
            .build()
            .unwrap();
        let processor = Arc::new(QueueProcessor::new(
            Arc::new(MemoryStore::new()),
            Arc::new(SystemClock),
            SharedConfig::new(config),
            Arc::new(optimizer),
        ));
        for id in 1..=2 {
            processor.queue().enqueue(id, Map::new()).unwrap();
        }

        let (tx, rx) = watch::channel(false);
        let worker = tokio::spawn(run_worker(processor.clone(), rx));

        // Two one-item ticks separated by the 1s follow-up delay
        tokio::time::sleep(Duration::from_millis(1500)).await;
        tx.send(true).unwrap();
        let summary = worker.await.unwrap();

        assert_eq!(summary.processed, 2);
        assert!(processor.queue().is_empty().unwrap());
    }
}
