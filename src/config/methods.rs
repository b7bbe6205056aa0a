//! Fluent setters for `SeoConfigBuilder`

use super::builder::SeoConfigBuilder;
use super::types::{DefaultTexts, FeatureToggles, LockLossPolicy};
use crate::link_rules::LinkRule;

impl SeoConfigBuilder {
    #[must_use]
    pub fn rules(mut self, rules: Vec<LinkRule>) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: LinkRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Set the per-paragraph anchor cap (0 disables the cap)
    #[must_use]
    pub fn paragraph_link_cap(mut self, cap: usize) -> Self {
        self.paragraph_link_cap = cap;
        self
    }

    /// Replace the protected block type list.
    ///
    /// Names may carry a namespace (`acme/widget`); `core/` is implied when
    /// absent.
    #[must_use]
    pub fn protected_block_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.protected_block_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Add one block type to the protected list
    #[must_use]
    pub fn protect_block_type(mut self, name: impl Into<String>) -> Self {
        self.protected_block_types.push(name.into());
        self
    }

    #[must_use]
    pub fn link_target(mut self, target: impl Into<String>) -> Self {
        self.link_target = target.into();
        self
    }

    #[must_use]
    pub fn link_rel(mut self, rel: impl Into<String>) -> Self {
        self.link_rel = rel.into();
        self
    }

    #[must_use]
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    #[must_use]
    pub fn batch_delay_secs(mut self, secs: u64) -> Self {
        self.batch_delay_secs = secs;
        self
    }

    /// Set the per-tick time budget (0 disables the budget)
    #[must_use]
    pub fn task_timeout_secs(mut self, secs: u64) -> Self {
        self.task_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn per_item_time_budget_secs(mut self, secs: u64) -> Self {
        self.per_item_time_budget_secs = secs;
        self
    }

    #[must_use]
    pub fn lock_safety_margin_secs(mut self, secs: u64) -> Self {
        self.lock_safety_margin_secs = secs;
        self
    }

    /// Throttle item optimizations (0 disables throttling)
    #[must_use]
    pub fn queries_per_minute(mut self, qpm: u32) -> Self {
        self.queries_per_minute = qpm;
        self
    }

    #[must_use]
    pub fn lock_loss_policy(mut self, policy: LockLossPolicy) -> Self {
        self.lock_loss_policy = policy;
        self
    }

    #[must_use]
    pub fn background_processing(mut self, enabled: bool) -> Self {
        self.background_processing = enabled;
        self
    }

    #[must_use]
    pub fn features(mut self, features: FeatureToggles) -> Self {
        self.features = features;
        self
    }

    #[must_use]
    pub fn default_texts(mut self, texts: DefaultTexts) -> Self {
        self.default_texts = texts;
        self
    }

    #[must_use]
    pub fn site_url(mut self, url: impl Into<String>) -> Self {
        self.site_url = Some(url.into());
        self
    }
}
