//! Splice one anchor into one text node

use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;

use super::errors::LinkError;
use super::keyword_matcher::KeywordMatcher;
use crate::utils::{DEFAULT_LINK_REL, DEFAULT_LINK_TARGET};

/// Extra attributes written on every injected anchor. Empty values are
/// omitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorAttributes {
    pub target: String,
    pub rel: String,
}

impl Default for AnchorAttributes {
    fn default() -> Self {
        Self {
            target: DEFAULT_LINK_TARGET.to_string(),
            rel: DEFAULT_LINK_REL.to_string(),
        }
    }
}

impl AnchorAttributes {
    fn render_open_tag(&self, url: &str) -> String {
        let mut tag = format!(
            "<a href=\"{}\"",
            html_escape::encode_double_quoted_attribute(url)
        );
        if !self.target.is_empty() {
            tag.push_str(&format!(
                " target=\"{}\"",
                html_escape::encode_double_quoted_attribute(&self.target)
            ));
        }
        if !self.rel.is_empty() {
            tag.push_str(&format!(
                " rel=\"{}\"",
                html_escape::encode_double_quoted_attribute(&self.rel)
            ));
        }
        tag.push('>');
        tag
    }
}

/// Wrap the first whole-word keyword match in `node` with an anchor to `url`.
///
/// The text node is replaced by `before` text, the anchor, and `after` text;
/// empty leading/trailing pieces are not created. Returns the number of
/// anchors created (0 or 1).
///
/// # Errors
///
/// Returns [`LinkError::Selector`] if the anchor fragment cannot be built.
pub fn inject(
    node: &NodeRef,
    matcher: &KeywordMatcher,
    url: &str,
    attributes: &AnchorAttributes,
) -> Result<usize, LinkError> {
    let Some(text_cell) = node.as_text() else {
        return Ok(0);
    };
    if node.parent().is_none() {
        return Ok(0);
    }

    let text = text_cell.borrow().clone();
    let Some(found) = matcher.find_first(&text) else {
        return Ok(0);
    };

    let anchor = build_anchor(url, found.matched, attributes)?;

    if !found.before.is_empty() {
        node.insert_before(NodeRef::new_text(found.before));
    }
    node.insert_before(anchor);
    if !found.after.is_empty() {
        node.insert_before(NodeRef::new_text(found.after));
    }
    node.detach();

    Ok(1)
}

fn build_anchor(
    url: &str,
    matched: &str,
    attributes: &AnchorAttributes,
) -> Result<NodeRef, LinkError> {
    let markup = format!(
        "{}{}</a>",
        attributes.render_open_tag(url),
        html_escape::encode_text(matched)
    );

    let fragment = kuchiki::parse_html().one(markup);
    let anchor = fragment
        .select_first("a")
        .map_err(|()| LinkError::Selector("a"))?
        .as_node()
        .clone();
    anchor.detach();
    Ok(anchor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linker::document_walker::parse;

    #[test]
    fn test_inject_splits_text_node() {
        let doc = parse("<p>buy fresh dates today</p>").unwrap();
        let node = doc.safe_text_nodes().remove(0);
        let matcher = KeywordMatcher::new("dates").unwrap();

        let count = inject(
            &node,
            &matcher,
            "https://shop.test/dates",
            &AnchorAttributes::default(),
        )
        .unwrap();

        assert_eq!(count, 1);
        let html = doc.serialize().unwrap();
        assert!(html.starts_with("<p>buy fresh <a "));
        assert!(html.ends_with(">dates</a> today</p>"));
        assert!(html.contains("href=\"https://shop.test/dates\""));
        assert!(html.contains("rel=\"noopener\""));
        assert!(html.contains("target=\"_self\""));
    }

    #[test]
    fn test_inject_without_match_leaves_node() {
        let doc = parse("<p>nothing here</p>").unwrap();
        let node = doc.safe_text_nodes().remove(0);
        let matcher = KeywordMatcher::new("dates").unwrap();

        let count = inject(&node, &matcher, "https://shop.test/", &AnchorAttributes::default())
            .unwrap();

        assert_eq!(count, 0);
        assert_eq!(doc.serialize().unwrap(), "<p>nothing here</p>");
    }

    #[test]
    fn test_inject_whole_node_and_escaping() {
        let doc = parse("<li>A&amp;B</li>").unwrap();
        let node = doc.safe_text_nodes().remove(0);
        let matcher = KeywordMatcher::new("A&B").unwrap();
        let attributes = AnchorAttributes {
            target: String::new(),
            rel: String::new(),
        };

        inject(&node, &matcher, "https://shop.test/?a=1&b=\"2\"", &attributes).unwrap();

        assert_eq!(
            doc.serialize().unwrap(),
            "<li><a href=\"https://shop.test/?a=1&amp;b=&quot;2&quot;\">A&amp;B</a></li>"
        );
    }
}
