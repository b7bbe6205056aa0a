//! Structural parsing and safe text node enumeration
//!
//! Content fragments are parsed with kuchiki (html5ever) into a full document.
//! The parser never fails on malformed markup, it repairs it. Some repairs
//! would change content outside the spans we edit (a truncated trailing tag
//! disappears, an unterminated comment swallows the rest of the fragment,
//! document scaffolding tags get merged). Those inputs are rejected up front
//! so the caller can fail closed and return the original content.

use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use regex::Regex;
use std::collections::HashSet;
use std::rc::Rc;
use std::sync::LazyLock;

use super::errors::LinkError;
use super::region_protector::PLACEHOLDER_OPEN;

/// Elements whose descendant text never receives a link
const EXCLUDED_ANCESTORS: &[&str] = &[
    "a",
    "script",
    "style",
    "code",
    "pre",
    "kbd",
    "samp",
    "var",
    "button",
    "nav",
    "figcaption",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "textarea",
    "select",
    "option",
    "title",
    "noscript",
    "template",
    "svg",
];

/// Class prefixes marking button groups, code, navigation and TOC blocks
const EXCLUDED_CLASS_PREFIXES: &[&str] = &[
    "wp-block-button",
    "wp-block-code",
    "wp-block-preformatted",
    "wp-block-navigation",
    "wp-block-table-of-contents",
    "ez-toc",
    "rank-math-toc",
    "table-of-contents",
];

/// Class names that only exclude on an exact match
const EXCLUDED_CLASSES: &[&str] = &["toc", "buttons", "btn-group"];

/// Block elements that bound the per-paragraph link count
const PARAGRAPH_TAGS: &[&str] = &[
    "p",
    "li",
    "td",
    "th",
    "dd",
    "dt",
    "blockquote",
    "section",
    "article",
    "div",
    "aside",
    "header",
    "footer",
    "main",
];

static TRUNCATED_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<[/]?[A-Za-z][^>]*\z").expect("TRUNCATED_TAG: hardcoded regex is valid")
});

static SCAFFOLDING_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(?:!doctype|html|head|body|frameset)(?:[\s/>]|$)")
        .expect("SCAFFOLDING_TAG: hardcoded regex is valid")
});

/// Markup immediately before a token that would make the parser move the
/// token out of a table (foster parenting)
static TABLE_CONTEXT_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:<(?:table|tbody|thead|tfoot|tr|colgroup)(?:\s[^>]*)?>|</(?:td|th|tr|thead|tbody|tfoot|caption|colgroup)\s*>)\s*\z",
    )
    .expect("TABLE_CONTEXT_TAIL: hardcoded regex is valid")
});

/// Table tags; sections, rows and cells are dropped by the parser unless a
/// `<table>` is open
static TABLE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<(/?)(table|tbody|thead|tfoot|tr|td|th|caption|colgroup|col)(?:[\s/>]|\z)")
        .expect("TABLE_TAG: hardcoded regex is valid")
});

static SCAFFOLDING_OUTPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<!DOCTYPE[^>]*>|</?(?:html|head|body)(?:\s[^>]*)?>")
        .expect("SCAFFOLDING_OUTPUT: hardcoded regex is valid")
});

/// A parsed content fragment
pub struct ParsedDocument {
    document: NodeRef,
    leading_whitespace: String,
}

impl std::fmt::Debug for ParsedDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedDocument")
            .field("leading_whitespace", &self.leading_whitespace)
            .finish_non_exhaustive()
    }
}

/// Parse a protected content fragment.
///
/// # Errors
///
/// Returns [`LinkError::Parse`] when the fragment contains markup the parser
/// would restructure beyond the edited spans.
pub fn parse(protected_content: &str) -> Result<ParsedDocument, LinkError> {
    check_parse_safety(protected_content)?;

    let body = protected_content.trim_start();
    let leading_whitespace = protected_content[..protected_content.len() - body.len()].to_string();

    let document = kuchiki::parse_html().one(body.to_string());

    Ok(ParsedDocument {
        document,
        leading_whitespace,
    })
}

fn check_parse_safety(content: &str) -> Result<(), LinkError> {
    if let Some(open) = content.rfind("<!--")
        && !content[open + 4..].contains("-->")
    {
        return Err(LinkError::Parse("unterminated comment".to_string()));
    }

    if TRUNCATED_TAG.is_match(content) {
        return Err(LinkError::Parse("truncated tag at end of content".to_string()));
    }

    if SCAFFOLDING_TAG.is_match(content) {
        return Err(LinkError::Parse(
            "document scaffolding tags inside a content fragment".to_string(),
        ));
    }

    check_table_nesting(content)?;

    let mut search_from = 0;
    while let Some(offset) = content[search_from..].find(PLACEHOLDER_OPEN) {
        let position = search_from + offset;
        if TABLE_CONTEXT_TAIL.is_match(&content[..position]) {
            return Err(LinkError::Parse(
                "protected region sits directly inside table structure".to_string(),
            ));
        }
        search_from = position + PLACEHOLDER_OPEN.len_utf8();
    }

    Ok(())
}

fn check_table_nesting(content: &str) -> Result<(), LinkError> {
    let mut open_tables = 0usize;
    for captures in TABLE_TAG.captures_iter(content) {
        let closing = !captures[1].is_empty();
        let tag = captures[2].to_ascii_lowercase();
        match (tag.as_str(), closing) {
            ("table", false) => open_tables += 1,
            ("table", true) => open_tables = open_tables.saturating_sub(1),
            (_, _) if open_tables == 0 => {
                return Err(LinkError::Parse(format!(
                    "<{tag}> outside of any table would be dropped by the parser"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

impl ParsedDocument {
    #[must_use]
    pub fn root(&self) -> &NodeRef {
        &self.document
    }

    /// Text nodes eligible for link injection, in document order.
    #[must_use]
    pub fn safe_text_nodes(&self) -> Vec<NodeRef> {
        self.document
            .descendants()
            .filter(is_safe_text_node)
            .collect()
    }

    /// Every anchor element in document order
    #[must_use]
    pub fn anchors(&self) -> Vec<NodeRef> {
        self.document
            .descendants()
            .filter(|node| element_name_is(node, "a"))
            .collect()
    }

    /// `href` values of every anchor already in the document
    #[must_use]
    pub fn existing_link_targets(&self) -> HashSet<String> {
        self.anchors()
            .iter()
            .filter_map(anchor_href)
            .collect()
    }

    /// Serialize back to a fragment, without the scaffolding the parser added.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or yields invalid UTF-8.
    pub fn serialize(&self) -> Result<String, LinkError> {
        let mut output = Vec::new();
        self.document.serialize(&mut output)?;
        let html = String::from_utf8(output)?;

        let stripped = SCAFFOLDING_OUTPUT.replace_all(&html, "");
        Ok(format!("{}{}", self.leading_whitespace, stripped))
    }
}

/// Trimmed `href` of an anchor node
#[must_use]
pub fn anchor_href(node: &NodeRef) -> Option<String> {
    let element = node.as_element()?;
    let attributes = element.attributes.borrow();
    let href = attributes.get("href")?.trim();
    (!href.is_empty()).then(|| href.to_string())
}

/// Whether a text node is non-blank and outside every excluded region
#[must_use]
pub fn is_safe_text_node(node: &NodeRef) -> bool {
    let Some(text) = node.as_text() else {
        return false;
    };
    if text.borrow().trim().is_empty() {
        return false;
    }
    // A parent is required to splice in a replacement
    if node.parent().is_none() {
        return false;
    }

    !node.ancestors().any(|ancestor| is_excluded_element(&ancestor))
}

fn is_excluded_element(node: &NodeRef) -> bool {
    let Some(element) = node.as_element() else {
        return false;
    };

    let name: &str = &element.name.local;
    if EXCLUDED_ANCESTORS
        .iter()
        .any(|excluded| name.eq_ignore_ascii_case(excluded))
    {
        return true;
    }

    let attributes = element.attributes.borrow();
    let Some(classes) = attributes.get("class") else {
        return false;
    };

    classes.split_ascii_whitespace().any(|class| {
        let class = class.to_ascii_lowercase();
        EXCLUDED_CLASSES.contains(&class.as_str())
            || EXCLUDED_CLASS_PREFIXES
                .iter()
                .any(|prefix| class.starts_with(prefix))
    })
}

fn element_name_is(node: &NodeRef, tag: &str) -> bool {
    node.as_element()
        .is_some_and(|element| {
            let name: &str = &element.name.local;
            name.eq_ignore_ascii_case(tag)
        })
}

/// Stable identity of the paragraph-like block that bounds link density
/// for `node`: the nearest paragraph-like ancestor, otherwise the nearest
/// element ancestor.
#[must_use]
pub fn paragraph_key(node: &NodeRef) -> usize {
    let mut nearest_element = None;

    for ancestor in node.ancestors() {
        let Some(element) = ancestor.as_element() else {
            continue;
        };
        if nearest_element.is_none() {
            nearest_element = Some(ancestor.clone());
        }
        let name: &str = &element.name.local;
        if PARAGRAPH_TAGS.iter().any(|tag| name.eq_ignore_ascii_case(tag)) {
            return node_identity(&ancestor);
        }
    }

    nearest_element.map_or_else(|| node_identity(node), |element| node_identity(&element))
}

fn node_identity(node: &NodeRef) -> usize {
    Rc::as_ptr(&node.0) as usize
}
