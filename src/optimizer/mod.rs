//! Per-item optimization on top of the link engine
//!
//! - `content_store`: item model and the stores that persist items
//! - `autofill`: [`SeoOptimizer`], the optimize-one-item operation
//! - `listener`: save events routed to the queue or straight to the optimizer
//! - `bulk`: prepared, chunked link apply/remove runs

pub mod autofill;
pub mod bulk;
pub mod content_store;
pub mod errors;
pub mod listener;

pub use autofill::{
    ChangeField, ContentChange, FOCUS_KEYWORD_META, META_DESCRIPTION_META, OptimizationReport,
    OptimizeOptions, OptimizeSource, SeoOptimizer,
};
pub use bulk::{BULK_RUN_KEY, BatchProgress, BulkAction, BulkLinkRun};
pub use content_store::{
    ContentItem, ContentStore, DEFAULT_ITEM_TYPE, ItemFilter, JsonCatalogStore,
    MemoryContentStore, PUBLISHED_STATUS,
};
pub use errors::{OptimizeError, OptimizeResult};
pub use listener::{
    ChangeDispatcher, ChangeKind, ContentChangeEvent, ContentChangeListener, DispatchAction,
};
