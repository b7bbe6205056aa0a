//! Core configuration types
//!
//! This module contains the main `SeoConfig` struct and its associated types
//! that define the linking, autofill and background queue parameters.

use serde::{Deserialize, Serialize};

use crate::link_rules::LinkRule;
use crate::linker::{AnchorAttributes, LinkEngine, LinkOptions};
use crate::utils::{
    DEFAULT_BATCH_DELAY_SECS, DEFAULT_BATCH_SIZE, DEFAULT_LINK_REL, DEFAULT_LINK_TARGET,
    DEFAULT_LOCK_SAFETY_MARGIN_SECS, DEFAULT_PARAGRAPH_LINK_CAP,
    DEFAULT_PER_ITEM_TIME_BUDGET_SECS, DEFAULT_PROTECTED_BLOCK_TYPES, DEFAULT_QUERIES_PER_MINUTE,
    DEFAULT_TASK_TIMEOUT_SECS,
};

/// What the queue processor does when a heartbeat refresh fails mid-batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockLossPolicy {
    /// Stop the batch and put the unprocessed tasks back at the queue front
    #[default]
    Abort,
    /// Log a warning and finish the batch
    Continue,
}

/// Per-step switches for the optimize-one-item operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureToggles {
    pub focus_keyword: bool,
    pub meta_description: bool,
    pub short_description: bool,
    pub full_description: bool,
    pub internal_links: bool,
}

impl Default for FeatureToggles {
    fn default() -> Self {
        Self {
            focus_keyword: true,
            meta_description: true,
            short_description: true,
            full_description: true,
            internal_links: true,
        }
    }
}

/// Text copied into empty fields by the autofill steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultTexts {
    pub meta_description: Option<String>,
    pub short_description: Option<String>,
    pub full_description: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoConfig {
    /// Normalized rules, applied in order
    pub(crate) rules: Vec<LinkRule>,

    /// Maximum injected anchors per paragraph-like block, 0 for no limit
    pub(crate) paragraph_link_cap: usize,

    /// Block types whose comment-delimited regions are never linked.
    ///
    /// **INVARIANT:** Lowercased, validated names (normalized in builder).
    pub(crate) protected_block_types: Vec<String>,

    pub(crate) link_target: String,
    pub(crate) link_rel: String,

    /// Items drained per queue tick. Always at least 1.
    pub(crate) batch_size: usize,

    /// Delay before the follow-up tick when work remains
    pub(crate) batch_delay_secs: u64,

    /// Wall-clock budget for one tick, 0 for no budget
    pub(crate) task_timeout_secs: u64,

    pub(crate) per_item_time_budget_secs: u64,
    pub(crate) lock_safety_margin_secs: u64,

    /// Ceiling on item optimizations per minute, 0 for no throttling
    pub(crate) queries_per_minute: u32,

    pub(crate) lock_loss_policy: LockLossPolicy,

    /// Enqueue on content change instead of optimizing synchronously
    pub(crate) background_processing: bool,

    pub(crate) features: FeatureToggles,
    pub(crate) default_texts: DefaultTexts,

    /// Site root used to recognize internal links during removal
    pub(crate) site_url: Option<String>,
}

impl Default for SeoConfig {
    fn default() -> Self {
        Self {
            rules: Vec::new(),
            paragraph_link_cap: DEFAULT_PARAGRAPH_LINK_CAP,
            protected_block_types: DEFAULT_PROTECTED_BLOCK_TYPES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            link_target: DEFAULT_LINK_TARGET.to_string(),
            link_rel: DEFAULT_LINK_REL.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_secs: DEFAULT_BATCH_DELAY_SECS,
            task_timeout_secs: DEFAULT_TASK_TIMEOUT_SECS,
            per_item_time_budget_secs: DEFAULT_PER_ITEM_TIME_BUDGET_SECS,
            lock_safety_margin_secs: DEFAULT_LOCK_SAFETY_MARGIN_SECS,
            queries_per_minute: DEFAULT_QUERIES_PER_MINUTE,
            lock_loss_policy: LockLossPolicy::default(),
            background_processing: true,
            features: FeatureToggles::default(),
            default_texts: DefaultTexts::default(),
            site_url: None,
        }
    }
}

impl SeoConfig {
    /// Engine options derived from this configuration
    #[must_use]
    pub fn link_options(&self) -> LinkOptions {
        LinkOptions::default()
            .with_paragraph_cap(self.paragraph_link_cap)
            .with_protected_block_types(self.protected_block_types.clone())
            .with_anchor_attributes(AnchorAttributes {
                target: self.link_target.clone(),
                rel: self.link_rel.clone(),
            })
    }

    #[must_use]
    pub fn link_engine(&self) -> LinkEngine {
        LinkEngine::new(self.link_options())
    }
}
