//! Internal link injection engine
//!
//! Given HTML content and an ordered list of keyword → URL rules, wraps one
//! whole-word occurrence per destination URL in an anchor, outside protected
//! regions and non-prose elements, with a per-paragraph link cap. Running the
//! engine over its own output changes nothing.

pub mod document_walker;
pub mod errors;
pub mod keyword_matcher;
pub mod link_injector;
pub mod link_remover;
pub mod region_protector;
pub mod rule_engine;
pub mod suggestions;

pub use document_walker::{ParsedDocument, paragraph_key, parse};
pub use errors::{InvalidRule, LinkError};
pub use keyword_matcher::{KeywordMatch, KeywordMatcher, find_first};
pub use link_injector::{AnchorAttributes, inject};
pub use link_remover::{Unlinked, remove_internal_links};
pub use region_protector::{PlaceholderMap, RegionProtector};
pub use rule_engine::{
    InsertedLink, LinkEngine, LinkOptions, LinkOutcome, LinkStatus, apply_rules,
};
pub use suggestions::{LinkSuggestion, suggest_links};
