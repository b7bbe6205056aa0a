//! Rule engine: apply an ordered rule list to one content fragment
//!
//! Pipeline: protect regions → parse → seed used URLs and paragraph counters
//! from existing anchors → one anchor per rule → serialize → verify and
//! restore placeholders.
//!
//! **Fail-closed:** any [`LinkError`] along the way returns the input content
//! untouched. A pass that inserts nothing also returns the input untouched,
//! which is what makes a second pass over its own output a no-op.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use super::document_walker::{anchor_href, paragraph_key, parse};
use super::errors::LinkError;
use super::keyword_matcher::KeywordMatcher;
use super::link_injector::{inject, AnchorAttributes};
use super::region_protector::{PlaceholderMap, RegionProtector};
use crate::link_rules::{normalize_rules, LinkRule, RawLinkRules};
use crate::utils::{DEFAULT_PARAGRAPH_LINK_CAP, DEFAULT_PROTECTED_BLOCK_TYPES};

/// Tunables for one engine instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOptions {
    /// Maximum anchors per paragraph-like block, 0 for no limit
    pub paragraph_cap: usize,
    pub protected_block_types: Vec<String>,
    pub anchor: AnchorAttributes,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            paragraph_cap: DEFAULT_PARAGRAPH_LINK_CAP,
            protected_block_types: DEFAULT_PROTECTED_BLOCK_TYPES
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            anchor: AnchorAttributes::default(),
        }
    }
}

impl LinkOptions {
    #[must_use]
    pub fn with_paragraph_cap(mut self, cap: usize) -> Self {
        self.paragraph_cap = cap;
        self
    }

    #[must_use]
    pub fn with_protected_block_types(mut self, types: Vec<String>) -> Self {
        self.protected_block_types = types;
        self
    }

    #[must_use]
    pub fn with_anchor_attributes(mut self, anchor: AnchorAttributes) -> Self {
        self.anchor = anchor;
        self
    }
}

/// How a linking pass ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// At least one anchor was inserted
    Linked,
    /// Nothing to do; content returned verbatim
    Unchanged,
    /// Content could not be processed safely; returned verbatim
    ParseFailed,
}

/// One anchor inserted by a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsertedLink {
    pub keyword: String,
    pub url: String,
    /// Text wrapped by the anchor, in its original casing
    pub anchor_text: String,
}

/// Result of [`LinkEngine::apply_rules_detailed`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutcome {
    pub content: String,
    pub inserted: Vec<InsertedLink>,
    pub status: LinkStatus,
}

impl LinkOutcome {
    fn unchanged(content: &str, status: LinkStatus) -> Self {
        Self {
            content: content.to_string(),
            inserted: Vec::new(),
            status,
        }
    }

    #[must_use]
    pub fn changed(&self) -> bool {
        self.status == LinkStatus::Linked
    }
}

/// Internal link injection engine
#[derive(Debug, Clone)]
pub struct LinkEngine {
    options: LinkOptions,
    protector: RegionProtector,
}

impl Default for LinkEngine {
    fn default() -> Self {
        Self::new(LinkOptions::default())
    }
}

impl LinkEngine {
    #[must_use]
    pub fn new(options: LinkOptions) -> Self {
        let protector = RegionProtector::new(&options.protected_block_types);
        Self { options, protector }
    }

    #[must_use]
    pub fn options(&self) -> &LinkOptions {
        &self.options
    }

    #[must_use]
    pub fn protector(&self) -> &RegionProtector {
        &self.protector
    }

    /// Apply `rules` in order and return the updated content.
    #[must_use]
    pub fn apply_rules(&self, content: &str, rules: &[LinkRule]) -> String {
        self.apply_rules_detailed(content, rules).content
    }

    /// Normalize rules from their boundary shape, then apply them.
    #[must_use]
    pub fn apply_raw_rules(&self, content: &str, rules: &RawLinkRules) -> String {
        self.apply_rules(content, &normalize_rules(rules))
    }

    /// Apply `rules` and report what was inserted.
    #[must_use]
    pub fn apply_rules_detailed(&self, content: &str, rules: &[LinkRule]) -> LinkOutcome {
        if content.trim().is_empty() || rules.is_empty() {
            return LinkOutcome::unchanged(content, LinkStatus::Unchanged);
        }

        match self.link(content, rules) {
            Ok(Some((linked, inserted))) => LinkOutcome {
                content: linked,
                inserted,
                status: LinkStatus::Linked,
            },
            Ok(None) => LinkOutcome::unchanged(content, LinkStatus::Unchanged),
            Err(e) => {
                log::warn!("Skipping internal linking, content left unchanged: {e}");
                LinkOutcome::unchanged(content, LinkStatus::ParseFailed)
            }
        }
    }

    fn link(
        &self,
        content: &str,
        rules: &[LinkRule],
    ) -> Result<Option<(String, Vec<InsertedLink>)>, LinkError> {
        let (protected, placeholders) = self.protector.protect(content)?;
        let document = parse(&protected)?;

        let mut used_urls = document.existing_link_targets();
        let rule_urls: HashSet<&str> = rules.iter().map(LinkRule::url).collect();

        // Anchors from earlier passes keep counting against the cap
        let mut paragraph_counts: HashMap<usize, usize> = HashMap::new();
        for anchor in document.anchors() {
            if anchor_href(&anchor).is_some_and(|href| rule_urls.contains(href.as_str())) {
                *paragraph_counts.entry(paragraph_key(&anchor)).or_default() += 1;
            }
        }

        let visible_text = document.root().text_contents();
        let cap = self.options.paragraph_cap;
        let mut inserted = Vec::new();

        for rule in rules {
            if used_urls.contains(rule.url()) {
                continue;
            }

            let matcher = match KeywordMatcher::new(rule.keyword()) {
                Ok(matcher) => matcher,
                Err(e) => {
                    log::warn!("Skipping rule '{}': {e}", rule.keyword());
                    continue;
                }
            };
            if !matcher.appears_in(&visible_text) {
                continue;
            }

            for node in document.safe_text_nodes() {
                if node.parent().is_none() {
                    continue;
                }
                let Some(text) = node.as_text().map(|t| t.borrow().clone()) else {
                    continue;
                };
                if !matcher.appears_in(&text) {
                    continue;
                }

                let key = paragraph_key(&node);
                let count = paragraph_counts.get(&key).copied().unwrap_or(0);
                if cap > 0 && count >= cap {
                    continue;
                }

                let anchor_text = matcher
                    .find_first(&text)
                    .map(|m| m.matched.to_string())
                    .unwrap_or_default();
                let added = inject(&node, &matcher, rule.url(), &self.options.anchor)?;
                if added == 0 {
                    continue;
                }

                log::debug!("Linked '{}' to {}", rule.keyword(), rule.url());
                used_urls.insert(rule.url().to_string());
                *paragraph_counts.entry(key).or_default() += added;
                inserted.push(InsertedLink {
                    keyword: rule.keyword().to_string(),
                    url: rule.url().to_string(),
                    anchor_text,
                });
                break;
            }
        }

        if inserted.is_empty() {
            return Ok(None);
        }

        let serialized = document.serialize()?;
        verify_placeholders(&protected, &serialized, &placeholders)?;

        Ok(Some((
            RegionProtector::restore(&serialized, &placeholders),
            inserted,
        )))
    }
}

/// Every token placed in the parser input must come out exactly once and in
/// the same relative order.
pub(crate) fn verify_placeholders(
    protected: &str,
    serialized: &str,
    placeholders: &PlaceholderMap,
) -> Result<(), LinkError> {
    let mut top_level: Vec<(usize, &str)> = placeholders
        .tokens()
        .filter_map(|token| protected.find(token).map(|at| (at, token)))
        .collect();
    top_level.sort_unstable();

    let mut previous = None;
    for (_, token) in top_level {
        if serialized.matches(token).count() != 1 {
            return Err(LinkError::PlaceholderLost {
                token: token.to_string(),
            });
        }
        let position = serialized.find(token);
        if position < previous {
            return Err(LinkError::Parse("protected regions were reordered".to_string()));
        }
        previous = position;
    }

    Ok(())
}

/// Apply rules with the default options.
#[must_use]
pub fn apply_rules(content: &str, rules: &[LinkRule]) -> String {
    LinkEngine::default().apply_rules(content, rules)
}
