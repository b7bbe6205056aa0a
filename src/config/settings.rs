//! JSON settings file format
//!
//! Key names follow the stored option array of the content platform
//! (`enable_focus_keyword`, `batch_delay`, `internal_link_rules`, ...).
//! Values written by form submissions may be numeric strings or `"1"`/`"0"`
//! flags, so numbers and booleans are read leniently. Rules may arrive as the
//! structured list or the legacy flat map; the legacy `internal_links` key is
//! only consulted when `internal_link_rules` is empty. Everything is
//! normalized once, here, into a [`SeoConfig`].

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::Path;

use super::types::{DefaultTexts, FeatureToggles, LockLossPolicy, SeoConfig};
use crate::link_rules::{RawLinkRules, normalize_rules};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_focus_keyword: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_meta_description: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_short_description: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_full_description: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_internal_linking: Option<bool>,
    #[serde(deserialize_with = "lenient_bool")]
    pub enable_background_processing: Option<bool>,

    pub default_meta_description: Option<String>,
    pub default_short_description: Option<String>,
    pub default_full_description: Option<String>,

    pub internal_link_rules: Option<RawLinkRules>,
    /// Legacy flat `keyword → url` map
    pub internal_links: Option<RawLinkRules>,

    #[serde(deserialize_with = "lenient_u64")]
    pub paragraph_link_cap: Option<u64>,
    pub protected_block_types: Option<Vec<String>>,
    pub link_target: Option<String>,
    pub link_rel: Option<String>,

    #[serde(deserialize_with = "lenient_u64")]
    pub batch_size: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub batch_delay: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub task_timeout: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub per_item_time_budget: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub lock_safety_margin: Option<u64>,
    #[serde(deserialize_with = "lenient_u64")]
    pub queries_per_minute: Option<u64>,
    pub lock_loss_policy: Option<LockLossPolicy>,

    pub site_url: Option<String>,
}

impl Settings {
    /// Parse settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a valid settings object.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse settings JSON")
    }

    /// Read settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("Invalid settings file {}", path.display()))
    }

    /// Rules in effect: the structured list, or the legacy map when the list
    /// is absent or empty.
    #[must_use]
    pub fn effective_rules(&self) -> RawLinkRules {
        match (&self.internal_link_rules, &self.internal_links) {
            (Some(rules), _) if !rules.is_empty() => rules.clone(),
            (_, Some(legacy)) if !legacy.is_empty() => legacy.clone(),
            _ => RawLinkRules::default(),
        }
    }

    /// Normalize into a validated configuration. Zero or missing numeric
    /// values fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting configuration fails validation.
    pub fn into_config(self) -> Result<SeoConfig> {
        let defaults = SeoConfig::default();
        let positive = |value: Option<u64>, default: u64| value.filter(|v| *v > 0).unwrap_or(default);
        let default_features = FeatureToggles::default();

        let rules = normalize_rules(&self.effective_rules());
        log::debug!("Loaded {} internal link rule(s)", rules.len());

        let mut builder = SeoConfig::builder()
            .rules(rules)
            .paragraph_link_cap(
                self.paragraph_link_cap
                    .map_or(defaults.paragraph_link_cap(), |cap| {
                        usize::try_from(cap).unwrap_or(usize::MAX)
                    }),
            )
            .batch_size(
                usize::try_from(positive(self.batch_size, defaults.batch_size() as u64))
                    .unwrap_or(usize::MAX),
            )
            .batch_delay_secs(positive(self.batch_delay, defaults.batch_delay_secs()))
            .task_timeout_secs(positive(self.task_timeout, defaults.task_timeout_secs()))
            .per_item_time_budget_secs(positive(
                self.per_item_time_budget,
                defaults.per_item_time_budget_secs(),
            ))
            .lock_safety_margin_secs(
                self.lock_safety_margin
                    .unwrap_or(defaults.lock_safety_margin_secs()),
            )
            .queries_per_minute(
                u32::try_from(positive(
                    self.queries_per_minute,
                    u64::from(defaults.queries_per_minute()),
                ))
                .unwrap_or(u32::MAX),
            )
            .lock_loss_policy(self.lock_loss_policy.unwrap_or_default())
            .background_processing(self.enable_background_processing.unwrap_or(true))
            .features(FeatureToggles {
                focus_keyword: self
                    .enable_focus_keyword
                    .unwrap_or(default_features.focus_keyword),
                meta_description: self
                    .enable_meta_description
                    .unwrap_or(default_features.meta_description),
                short_description: self
                    .enable_short_description
                    .unwrap_or(default_features.short_description),
                full_description: self
                    .enable_full_description
                    .unwrap_or(default_features.full_description),
                internal_links: self
                    .enable_internal_linking
                    .unwrap_or(default_features.internal_links),
            })
            .default_texts(DefaultTexts {
                meta_description: self.default_meta_description,
                short_description: self.default_short_description,
                full_description: self.default_full_description,
            });

        if let Some(types) = self.protected_block_types {
            builder = builder.protected_block_types(types);
        }
        if let Some(target) = self.link_target {
            builder = builder.link_target(target);
        }
        if let Some(rel) = self.link_rel {
            builder = builder.link_rel(rel);
        }
        if let Some(site_url) = self.site_url {
            builder = builder.site_url(site_url);
        }

        builder.build()
    }
}

/// Load and normalize a settings file, or use defaults when no path is given.
///
/// # Errors
///
/// Returns an error if the file cannot be read, parsed or validated.
pub fn load_config(path: Option<&Path>) -> Result<SeoConfig> {
    match path {
        Some(path) => Settings::load(path)?.into_config(),
        None => {
            log::info!("No settings file given; using defaults (no link rules)");
            Ok(SeoConfig::default())
        }
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Bool(b)) => Some(b),
        Some(Value::Number(n)) => Some(n.as_f64().is_some_and(|v| v != 0.0)),
        Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" | "off" | "no" => Some(false),
            _ => Some(true),
        },
        _ => None,
    })
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|v| u64::try_from(v.max(0)).unwrap_or(0))),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok().map(|v| u64::try_from(v.max(0)).unwrap_or(0)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_links_used_only_when_rules_empty() {
        let settings = Settings::from_json_str(
            r#"{
                "internal_link_rules": [],
                "internal_links": {"dates": "https://shop.test/dates"}
            }"#,
        )
        .unwrap();
        let config = settings.into_config().unwrap();
        assert_eq!(config.rules().len(), 1);
        assert_eq!(config.rules()[0].keyword(), "dates");

        let settings = Settings::from_json_str(
            r#"{
                "internal_link_rules": [{"keyword": "figs", "url": "https://shop.test/figs"}],
                "internal_links": {"dates": "https://shop.test/dates"}
            }"#,
        )
        .unwrap();
        let config = settings.into_config().unwrap();
        assert_eq!(config.rules().len(), 1);
        assert_eq!(config.rules()[0].keyword(), "figs");
    }

    #[test]
    fn test_form_encoded_values_are_accepted() {
        let config = Settings::from_json_str(
            r#"{
                "enable_focus_keyword": "0",
                "enable_internal_linking": "1",
                "batch_size": "3",
                "batch_delay": 0,
                "queries_per_minute": "30",
                "lock_loss_policy": "continue"
            }"#,
        )
        .unwrap()
        .into_config()
        .unwrap();

        assert!(!config.features().focus_keyword);
        assert!(config.features().internal_links);
        assert_eq!(config.batch_size(), 3);
        assert_eq!(config.batch_delay_secs(), 5);
        assert_eq!(config.queries_per_minute(), 30);
        assert_eq!(config.lock_loss_policy(), LockLossPolicy::Continue);
    }

    #[test]
    fn test_invalid_block_type_is_rejected() {
        let result = Settings::from_json_str(r#"{"protected_block_types": ["code", "bad name"]}"#)
            .unwrap()
            .into_config();
        assert!(result.is_err());
    }
}
