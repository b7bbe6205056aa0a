//! Optimize one content item
//!
//! Each step only fills a field that is still empty, so running the
//! optimizer again on an already optimized item reports no changes. Internal
//! linking goes through the idempotent link engine for the same reason.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::content_store::{ContentItem, ContentStore};
use super::errors::{OptimizeError, OptimizeResult};
use crate::config::{SeoConfig, SharedConfig};
use crate::linker::{InsertedLink, LinkSuggestion};
use crate::runtime::Clock;
use crate::task_queue::{ItemOptimizer, QueueTask};

/// Metadata key holding the focus keyword
pub const FOCUS_KEYWORD_META: &str = "rank_math_focus_keyword";

/// Metadata key holding the meta description
pub const META_DESCRIPTION_META: &str = "rank_math_description";

/// Who asked for the optimization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeSource {
    #[default]
    Save,
    Queue,
    Cli,
    Bulk,
}

impl fmt::Display for OptimizeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Save => "save",
            Self::Queue => "queue",
            Self::Cli => "cli",
            Self::Bulk => "bulk",
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OptimizeOptions {
    /// Compute and report changes without saving them
    pub dry_run: bool,
    pub source: OptimizeSource,
}

impl OptimizeOptions {
    #[must_use]
    pub fn from_source(source: OptimizeSource) -> Self {
        Self {
            dry_run: false,
            source,
        }
    }

    #[must_use]
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeField {
    FocusKeyword,
    MetaDescription,
    ShortDescription,
    FullDescription,
    InternalLinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentChange {
    pub field: ChangeField,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptimizationReport {
    pub item_id: u64,
    pub source: OptimizeSource,
    pub dry_run: bool,
    pub changes: Vec<ContentChange>,
    pub links: Vec<InsertedLink>,
    /// Whether the item was written back
    pub saved: bool,
}

impl OptimizationReport {
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.changes.is_empty()
    }
}

pub struct SeoOptimizer {
    content: Arc<dyn ContentStore>,
    config: SharedConfig,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for SeoOptimizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SeoOptimizer").finish_non_exhaustive()
    }
}

impl SeoOptimizer {
    pub fn new(content: Arc<dyn ContentStore>, config: SharedConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            content,
            config,
            clock,
        }
    }

    #[must_use]
    pub fn content_store(&self) -> &Arc<dyn ContentStore> {
        &self.content
    }

    #[must_use]
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Run every enabled step on item `id`.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::NotFound`] for unknown items, or an error if
    /// the content store fails.
    pub fn optimize_item(&self, id: u64, options: OptimizeOptions) -> OptimizeResult<OptimizationReport> {
        let config = self.config.snapshot();
        let mut item = self
            .content
            .get_content(id)?
            .ok_or(OptimizeError::NotFound(id))?;

        let mut changes = Vec::new();
        let links = autofill(&config, &mut item, &mut changes);

        let saved = !changes.is_empty() && !options.dry_run;
        if saved {
            item.modified_at = Some(self.clock.now());
            self.content.save_content(&item)?;
        }

        if options.dry_run {
            log::info!("Dry-run for item {id}: {} change(s) detected", changes.len());
        } else if saved {
            log::info!(
                "Optimized item {id} ({}) with {} update(s)",
                options.source,
                changes.len()
            );
        } else {
            log::debug!("Item {id} needs no changes");
        }

        Ok(OptimizationReport {
            item_id: id,
            source: options.source,
            dry_run: options.dry_run,
            changes,
            links,
            saved,
        })
    }

    /// Rules that could still be linked in item `id`.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::NotFound`] for unknown items, or an error if
    /// the content store fails.
    pub fn suggest_links(&self, id: u64) -> OptimizeResult<Vec<LinkSuggestion>> {
        let config = self.config.snapshot();
        let item = self
            .content
            .get_content(id)?
            .ok_or(OptimizeError::NotFound(id))?;
        Ok(config.link_engine().suggest_links(&item.content, config.rules()))
    }
}

impl ItemOptimizer for SeoOptimizer {
    fn optimize_queued(&self, task: &QueueTask) -> Result<usize, OptimizeError> {
        let report = self.optimize_item(task.item_id, OptimizeOptions::from_source(OptimizeSource::Queue))?;
        Ok(report.changes.len())
    }
}

/// Apply the enabled steps in place, recording each change
fn autofill(config: &SeoConfig, item: &mut ContentItem, changes: &mut Vec<ContentChange>) -> Vec<InsertedLink> {
    let features = config.features();
    let defaults = config.default_texts();

    if features.focus_keyword && item.meta(FOCUS_KEYWORD_META).is_none() {
        let title = item.title.trim().to_string();
        if !title.is_empty() {
            changes.push(ContentChange {
                field: ChangeField::FocusKeyword,
                summary: format!("Focus keyword set to \"{title}\""),
            });
            item.metadata.insert(FOCUS_KEYWORD_META.to_string(), title);
        }
    }

    if features.meta_description
        && item.meta(META_DESCRIPTION_META).is_none()
        && let Some(text) = &defaults.meta_description
    {
        item.metadata
            .insert(META_DESCRIPTION_META.to_string(), text.clone());
        changes.push(ContentChange {
            field: ChangeField::MetaDescription,
            summary: "Meta description filled from default text".to_string(),
        });
    }

    if features.short_description
        && item.excerpt.trim().is_empty()
        && let Some(text) = &defaults.short_description
    {
        item.excerpt.clone_from(text);
        changes.push(ContentChange {
            field: ChangeField::ShortDescription,
            summary: "Short description filled from default text".to_string(),
        });
    }

    if features.full_description
        && item.content.trim().is_empty()
        && let Some(text) = &defaults.full_description
    {
        item.content.clone_from(text);
        changes.push(ContentChange {
            field: ChangeField::FullDescription,
            summary: "Full description filled from default text".to_string(),
        });
    }

    if !features.internal_links || config.rules().is_empty() || item.content.trim().is_empty() {
        return Vec::new();
    }

    let outcome = config
        .link_engine()
        .apply_rules_detailed(&item.content, config.rules());
    if !outcome.changed() {
        return Vec::new();
    }

    changes.push(ContentChange {
        field: ChangeField::InternalLinks,
        summary: format!("Inserted {} internal link(s)", outcome.inserted.len()),
    });
    item.content = outcome.content;
    outcome.inserted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DefaultTexts, FeatureToggles};
    use crate::link_rules::LinkRule;
    use crate::optimizer::MemoryContentStore;
    use crate::runtime::ManualClock;

    fn optimizer(config: SeoConfig, items: Vec<ContentItem>) -> SeoOptimizer {
        SeoOptimizer::new(
            Arc::new(MemoryContentStore::with_items(items)),
            SharedConfig::new(config),
            Arc::new(ManualClock::starting_now()),
        )
    }

    fn full_config() -> SeoConfig {
        SeoConfig::builder()
            .rule(LinkRule::new("dates", "https://shop.test/dates").unwrap())
            .default_texts(DefaultTexts {
                meta_description: Some("Best dates in town".into()),
                short_description: Some("Fresh dates".into()),
                full_description: None,
            })
            .build()
            .unwrap()
    }

    #[test]
    fn test_fills_empty_fields_and_links() {
        let item = ContentItem::new(1, " Medjool ").with_content("<p>We sell dates.</p>");
        let optimizer = optimizer(full_config(), vec![item]);

        let report = optimizer.optimize_item(1, OptimizeOptions::default()).unwrap();

        let fields: Vec<ChangeField> = report.changes.iter().map(|c| c.field).collect();
        assert_eq!(
            fields,
            vec![
                ChangeField::FocusKeyword,
                ChangeField::MetaDescription,
                ChangeField::ShortDescription,
                ChangeField::InternalLinks,
            ]
        );
        assert!(report.saved);

        let saved = optimizer.content_store().get_content(1).unwrap().unwrap();
        assert_eq!(saved.meta(FOCUS_KEYWORD_META), Some("Medjool"));
        assert!(saved.content.contains("href=\"https://shop.test/dates\""));
        assert!(saved.modified_at.is_some());

        let again = optimizer.optimize_item(1, OptimizeOptions::default()).unwrap();
        assert!(!again.changed());
    }

    #[test]
    fn test_dry_run_never_saves() {
        let item = ContentItem::new(1, "Medjool").with_content("<p>We sell dates.</p>");
        let optimizer = optimizer(full_config(), vec![item.clone()]);

        let report = optimizer
            .optimize_item(1, OptimizeOptions::default().dry_run(true))
            .unwrap();

        assert_eq!(report.changes.len(), 4);
        assert!(!report.saved);
        assert_eq!(optimizer.content_store().get_content(1).unwrap().unwrap(), item);
    }

    #[test]
    fn test_disabled_steps_are_skipped() {
        let config = SeoConfig::builder()
            .features(FeatureToggles {
                focus_keyword: false,
                internal_links: false,
                ..FeatureToggles::default()
            })
            .rule(LinkRule::new("dates", "https://shop.test/dates").unwrap())
            .build()
            .unwrap();
        let item = ContentItem::new(1, "Medjool").with_content("<p>We sell dates.</p>");
        let optimizer = optimizer(config, vec![item]);

        let report = optimizer.optimize_item(1, OptimizeOptions::default()).unwrap();
        assert!(!report.changed());
    }

    #[test]
    fn test_unknown_item() {
        let optimizer = optimizer(SeoConfig::default(), Vec::new());
        assert!(matches!(
            optimizer.optimize_item(9, OptimizeOptions::default()),
            Err(OptimizeError::NotFound(9))
        ));
    }
}
