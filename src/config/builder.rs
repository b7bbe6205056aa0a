//! Fluent builder for `SeoConfig`
//!
//! Every field has a default, so the builder can be built at any point.
//! `build()` validates and normalizes the collected values.

use anyhow::{Result, anyhow, bail};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use super::types::{DefaultTexts, FeatureToggles, LockLossPolicy, SeoConfig};
use crate::link_rules::LinkRule;
use crate::utils::validate_url;

static BLOCK_TYPE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[a-z][a-z0-9_-]*/)?[a-z][a-z0-9_-]*$")
        .expect("BLOCK_TYPE_NAME: hardcoded regex is valid")
});

/// Lowercase and validate one protected block type name.
///
/// # Errors
///
/// Returns an error for names that cannot appear in a block delimiter.
fn normalize_block_type(name: &str) -> Result<String> {
    let normalized = name.trim().to_lowercase();
    if BLOCK_TYPE_NAME.is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(anyhow!("Invalid protected block type '{name}'"))
    }
}

#[derive(Debug, Clone)]
pub struct SeoConfigBuilder {
    pub(crate) rules: Vec<LinkRule>,
    pub(crate) paragraph_link_cap: usize,
    pub(crate) protected_block_types: Vec<String>,
    pub(crate) link_target: String,
    pub(crate) link_rel: String,
    pub(crate) batch_size: usize,
    pub(crate) batch_delay_secs: u64,
    pub(crate) task_timeout_secs: u64,
    pub(crate) per_item_time_budget_secs: u64,
    pub(crate) lock_safety_margin_secs: u64,
    pub(crate) queries_per_minute: u32,
    pub(crate) lock_loss_policy: LockLossPolicy,
    pub(crate) background_processing: bool,
    pub(crate) features: FeatureToggles,
    pub(crate) default_texts: DefaultTexts,
    pub(crate) site_url: Option<String>,
}

impl Default for SeoConfigBuilder {
    fn default() -> Self {
        let defaults = SeoConfig::default();
        Self {
            rules: defaults.rules,
            paragraph_link_cap: defaults.paragraph_link_cap,
            protected_block_types: defaults.protected_block_types,
            link_target: defaults.link_target,
            link_rel: defaults.link_rel,
            batch_size: defaults.batch_size,
            batch_delay_secs: defaults.batch_delay_secs,
            task_timeout_secs: defaults.task_timeout_secs,
            per_item_time_budget_secs: defaults.per_item_time_budget_secs,
            lock_safety_margin_secs: defaults.lock_safety_margin_secs,
            queries_per_minute: defaults.queries_per_minute,
            lock_loss_policy: defaults.lock_loss_policy,
            background_processing: defaults.background_processing,
            features: defaults.features,
            default_texts: defaults.default_texts,
            site_url: defaults.site_url,
        }
    }
}

impl SeoConfig {
    /// Create a builder for configuring a `SeoConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> SeoConfigBuilder {
        SeoConfigBuilder::default()
    }
}

impl SeoConfigBuilder {
    /// Validate and produce the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if `batch_size` is zero, a protected block type name
    /// is malformed, or `site_url` is not an absolute http(s) URL.
    pub fn build(self) -> Result<SeoConfig> {
        if self.batch_size == 0 {
            bail!("batch_size must be at least 1");
        }

        let mut protected_block_types = self
            .protected_block_types
            .iter()
            .map(|name| normalize_block_type(name))
            .collect::<Result<Vec<_>>>()?;
        let mut seen = HashSet::new();
        protected_block_types.retain(|name| seen.insert(name.clone()));

        let site_url = match self.site_url {
            Some(url) if !url.trim().is_empty() => Some(
                validate_url(&url).ok_or_else(|| anyhow!("Invalid site_url '{url}'"))?,
            ),
            _ => None,
        };

        let default_texts = DefaultTexts {
            meta_description: non_blank(self.default_texts.meta_description),
            short_description: non_blank(self.default_texts.short_description),
            full_description: non_blank(self.default_texts.full_description),
        };

        Ok(SeoConfig {
            rules: self.rules,
            paragraph_link_cap: self.paragraph_link_cap,
            protected_block_types,
            link_target: self.link_target.trim().to_string(),
            link_rel: self.link_rel.trim().to_string(),
            batch_size: self.batch_size,
            batch_delay_secs: self.batch_delay_secs,
            task_timeout_secs: self.task_timeout_secs,
            per_item_time_budget_secs: self.per_item_time_budget_secs,
            lock_safety_margin_secs: self.lock_safety_margin_secs,
            queries_per_minute: self.queries_per_minute,
            lock_loss_policy: self.lock_loss_policy,
            background_processing: self.background_processing,
            features: self.features,
            default_texts,
            site_url,
        })
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.filter(|t| !t.trim().is_empty())
}
