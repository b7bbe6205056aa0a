pub mod config;
pub mod link_rules;
pub mod linker;
pub mod optimizer;
pub mod runtime;
pub mod storage;
pub mod task_queue;
pub mod utils;

pub use config::{LockLossPolicy, SeoConfig, SeoConfigBuilder, Settings, SharedConfig, load_config};
pub use link_rules::{LinkRule, RawLinkRules, normalize_rules};
pub use linker::{
    InsertedLink, LinkEngine, LinkError, LinkOptions, LinkOutcome, LinkStatus, LinkSuggestion,
    apply_rules, remove_internal_links, suggest_links,
};
pub use optimizer::{
    BulkAction, BulkLinkRun, ChangeDispatcher, ContentChangeEvent, ContentChangeListener,
    ContentItem, ContentStore, JsonCatalogStore, MemoryContentStore, OptimizationReport,
    OptimizeError, OptimizeOptions, OptimizeSource, SeoOptimizer,
};
pub use runtime::{Clock, ManualClock, SystemClock, run_worker};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
pub use task_queue::{
    ItemOptimizer, LockManager, LockToken, QueueError, QueueProcessor, QueueTask, TaskQueue,
    TickOutcome, TickReport, calculate_lock_ttl,
};
