//! Shared configuration constants for seo_autolink
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Default per-paragraph anchor cap: 2 links
///
/// Bounds link density inside a single paragraph-like block. A value of 0
/// disables the cap entirely.
pub const DEFAULT_PARAGRAPH_LINK_CAP: usize = 2;

/// Block types whose comment-delimited regions are never parsed or linked.
///
/// Names are compared without the `core/` namespace, so `core/code` and
/// `code` both match `"code"`.
pub const DEFAULT_PROTECTED_BLOCK_TYPES: &[&str] = &[
    "shortcode",
    "html",
    "button",
    "buttons",
    "navigation",
    "navigation-link",
    "code",
];

/// `target` attribute placed on injected anchors (same-tab navigation)
pub const DEFAULT_LINK_TARGET: &str = "_self";

/// `rel` attribute placed on injected anchors
///
/// Internal links stay followable for crawlers, so no `nofollow` here.
pub const DEFAULT_LINK_REL: &str = "noopener";

/// Number of queued items drained per tick
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Delay in seconds before the follow-up tick when items remain queued
pub const DEFAULT_BATCH_DELAY_SECS: u64 = 5;

/// Wall-clock budget for a single tick in seconds
pub const DEFAULT_TASK_TIMEOUT_SECS: u64 = 120;

/// Worst-case time a single item optimization is expected to take
pub const DEFAULT_PER_ITEM_TIME_BUDGET_SECS: u64 = 10;

/// Extra lock lifetime added on top of the computed worst case
///
/// Absorbs scheduler jitter between the last heartbeat and the release.
pub const DEFAULT_LOCK_SAFETY_MARGIN_SECS: u64 = 5;

/// Default ceiling on item optimizations per minute (0 disables throttling)
pub const DEFAULT_QUERIES_PER_MINUTE: u32 = 120;

/// Minimum idle interval between scheduled ticks
pub const MIN_SCHEDULE_INTERVAL_SECS: u64 = 60;

/// Upper bound on any lock TTL (one year)
pub const MAX_LOCK_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Name of the lock and hook guarding the background queue
pub const QUEUE_HOOK: &str = "seo_autolink_process_queue";

/// Items handled per call of a bulk link run
pub const BULK_CHUNK_SIZE: usize = 5;

/// Lifetime of a prepared bulk link run in seconds (one hour)
pub const BULK_RUN_TTL_SECS: u64 = 60 * 60;
