//! Background processing: lock manager, persisted task queue and the
//! single-tick queue processor

pub mod errors;
pub mod lock;
pub mod processor;
pub mod queue;
pub mod state;

pub use errors::{QueueError, QueueResult};
pub use lock::{
    LockGuard, LockManager, LockRecord, LockToken, ReleaseOutcome, calculate_lock_ttl,
};
pub use processor::{
    ItemOptimizer, QueueProcessor, QueueStatus, TickOutcome, TickReport, throttle_interval,
};
pub use queue::{QUEUE_KEY, QueueTask, TaskQueue};
pub use state::{ProcessingState, STATE_KEY};
