//! Read-only link suggestions for a content fragment

use serde::Serialize;

use super::document_walker::parse;
use super::keyword_matcher::KeywordMatcher;
use super::rule_engine::LinkEngine;
use crate::link_rules::LinkRule;

/// A rule that would produce a link in this content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSuggestion {
    pub keyword: String,
    pub url: String,
    /// Whole-word matches across eligible text nodes
    pub occurrences: usize,
}

impl LinkEngine {
    /// Rules whose URL is not linked yet and whose keyword occurs as a whole
    /// word in eligible text. Paragraph caps are not considered.
    ///
    /// Returns an empty list when the content cannot be parsed safely.
    #[must_use]
    pub fn suggest_links(&self, content: &str, rules: &[LinkRule]) -> Vec<LinkSuggestion> {
        if content.trim().is_empty() || rules.is_empty() {
            return Vec::new();
        }

        let document = match self
            .protector()
            .protect(content)
            .and_then(|(protected, _)| parse(&protected))
        {
            Ok(document) => document,
            Err(e) => {
                log::warn!("Cannot suggest links for unparsable content: {e}");
                return Vec::new();
            }
        };

        let linked = document.existing_link_targets();
        let texts: Vec<String> = document
            .safe_text_nodes()
            .iter()
            .filter_map(|node| node.as_text().map(|t| t.borrow().clone()))
            .collect();

        let mut suggestions: Vec<LinkSuggestion> = Vec::new();
        for rule in rules {
            if linked.contains(rule.url()) || suggestions.iter().any(|s| s.url == rule.url()) {
                continue;
            }
            let Ok(matcher) = KeywordMatcher::new(rule.keyword()) else {
                continue;
            };

            let occurrences: usize = texts.iter().map(|text| matcher.count_in(text)).sum();
            if occurrences > 0 {
                suggestions.push(LinkSuggestion {
                    keyword: rule.keyword().to_string(),
                    url: rule.url().to_string(),
                    occurrences,
                });
            }
        }

        suggestions
    }
}

/// Suggest links with the default options.
#[must_use]
pub fn suggest_links(content: &str, rules: &[LinkRule]) -> Vec<LinkSuggestion> {
    LinkEngine::default().suggest_links(content, rules)
}
