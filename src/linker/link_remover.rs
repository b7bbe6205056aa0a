//! Strip internal links, keeping their text
//!
//! Uses the same protect → parse → serialize → restore pipeline as the rule
//! engine, so anchors inside shortcodes and protected blocks are left alone,
//! and any parse problem returns the content untouched.

use super::document_walker::{anchor_href, parse};
use super::errors::LinkError;
use super::region_protector::RegionProtector;
use super::rule_engine::{verify_placeholders, LinkEngine};
use crate::utils::is_internal_href;

/// Result of a link removal pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unlinked {
    pub content: String,
    /// Anchors unwrapped (0 when the pass failed closed)
    pub removed: usize,
}

impl LinkEngine {
    /// Unwrap every anchor whose `href` points at `site_url`.
    #[must_use]
    pub fn remove_internal_links(&self, content: &str, site_url: &str) -> Unlinked {
        if content.trim().is_empty() || site_url.trim().is_empty() {
            return Unlinked {
                content: content.to_string(),
                removed: 0,
            };
        }

        match unwrap_internal_anchors(self.protector(), content, site_url) {
            Ok(Some(unlinked)) => unlinked,
            Ok(None) => Unlinked {
                content: content.to_string(),
                removed: 0,
            },
            Err(e) => {
                log::warn!("Skipping link removal, content left unchanged: {e}");
                Unlinked {
                    content: content.to_string(),
                    removed: 0,
                }
            }
        }
    }
}

fn unwrap_internal_anchors(
    protector: &RegionProtector,
    content: &str,
    site_url: &str,
) -> Result<Option<Unlinked>, LinkError> {
    let (protected, placeholders) = protector.protect(content)?;
    let document = parse(&protected)?;

    let mut removed = 0;
    for anchor in document.anchors() {
        let internal = anchor_href(&anchor).is_some_and(|href| is_internal_href(&href, site_url));
        if !internal {
            continue;
        }

        // Move children out in order, then drop the empty anchor
        while let Some(child) = anchor.first_child() {
            anchor.insert_before(child);
        }
        anchor.detach();
        removed += 1;
    }

    if removed == 0 {
        return Ok(None);
    }

    let serialized = document.serialize()?;
    verify_placeholders(&protected, &serialized, &placeholders)?;

    log::debug!("Removed {removed} internal link(s)");
    Ok(Some(Unlinked {
        content: RegionProtector::restore(&serialized, &placeholders),
        removed,
    }))
}

/// Remove internal links with the default protected block set.
#[must_use]
pub fn remove_internal_links(content: &str, site_url: &str) -> String {
    LinkEngine::default()
        .remove_internal_links(content, site_url)
        .content
}

#[cfg(test)]
mod tests {
    use super::*;

    const SITE: &str = "https://shop.test";

    #[test]
    fn test_internal_links_are_unwrapped() {
        let html = remove_internal_links(
            "<p>Buy <a href=\"https://shop.test/dates\">fresh <b>dates</b></a> or <a href=\"https://other.test/\">elsewhere</a></p>",
            SITE,
        );
        assert_eq!(
            html,
            "<p>Buy fresh <b>dates</b> or <a href=\"https://other.test/\">elsewhere</a></p>"
        );
    }

    #[test]
    fn test_relative_and_www_links_count_as_internal() {
        let unlinked = LinkEngine::default().remove_internal_links(
            "<p><a href=\"/cart\">cart</a> <a href=\"https://www.shop.test/x\">x</a></p>",
            SITE,
        );
        assert_eq!(unlinked.removed, 2);
        assert_eq!(unlinked.content, "<p>cart x</p>");
    }

    #[test]
    fn test_anchors_in_protected_regions_survive() {
        let content = "[box]<a href=\"https://shop.test/a\">a</a>[/box]<p><a href=\"https://shop.test/b\">b</a></p>";
        let html = remove_internal_links(content, SITE);
        assert_eq!(html, "[box]<a href=\"https://shop.test/a\">a</a>[/box]<p>b</p>");
    }

    #[test]
    fn test_no_internal_links_returns_input() {
        let content = "<p>plain   text</p>";
        let unlinked = LinkEngine::default().remove_internal_links(content, SITE);
        assert_eq!(unlinked.removed, 0);
        assert_eq!(unlinked.content, content);
    }
}
