//! Getter methods for `SeoConfig`

use super::types::{DefaultTexts, FeatureToggles, LockLossPolicy, SeoConfig};
use crate::link_rules::LinkRule;

impl SeoConfig {
    #[must_use]
    pub fn rules(&self) -> &[LinkRule] {
        &self.rules
    }

    #[must_use]
    pub fn paragraph_link_cap(&self) -> usize {
        self.paragraph_link_cap
    }

    #[must_use]
    pub fn protected_block_types(&self) -> &[String] {
        &self.protected_block_types
    }

    #[must_use]
    pub fn link_target(&self) -> &str {
        &self.link_target
    }

    #[must_use]
    pub fn link_rel(&self) -> &str {
        &self.link_rel
    }

    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    #[must_use]
    pub fn batch_delay_secs(&self) -> u64 {
        self.batch_delay_secs
    }

    #[must_use]
    pub fn task_timeout_secs(&self) -> u64 {
        self.task_timeout_secs
    }

    #[must_use]
    pub fn per_item_time_budget_secs(&self) -> u64 {
        self.per_item_time_budget_secs
    }

    #[must_use]
    pub fn lock_safety_margin_secs(&self) -> u64 {
        self.lock_safety_margin_secs
    }

    #[must_use]
    pub fn queries_per_minute(&self) -> u32 {
        self.queries_per_minute
    }

    #[must_use]
    pub fn lock_loss_policy(&self) -> LockLossPolicy {
        self.lock_loss_policy
    }

    #[must_use]
    pub fn background_processing(&self) -> bool {
        self.background_processing
    }

    #[must_use]
    pub fn features(&self) -> FeatureToggles {
        self.features
    }

    #[must_use]
    pub fn default_texts(&self) -> &DefaultTexts {
        &self.default_texts
    }

    #[must_use]
    pub fn site_url(&self) -> Option<&str> {
        self.site_url.as_deref()
    }
}
