//! Time source and the async worker that schedules queue ticks

pub mod clock;
pub mod scheduler;

pub use clock::{Clock, ManualClock, SystemClock};
pub use scheduler::{WorkerSummary, idle_interval, run_tick_async, run_worker};
