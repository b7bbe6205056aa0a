//! Protected region extraction before structural parsing
//!
//! Shortcodes and a configurable set of comment-delimited blocks carry syntax
//! that must come out of the HTML parser byte-for-byte and must never receive
//! an injected link. Each such span is swapped for a placeholder token before
//! parsing and swapped back afterwards.
//!
//! Strategy:
//! 1. Replace every shortcode span (`[tag ...]...[/tag]` or a lone `[tag ...]`)
//! 2. Replace every protected block, found by a nesting-aware scan of the
//!    `<!-- wp:name -->` delimiters; if the delimiters do not nest cleanly the
//!    scan falls back to a flat regex over the same comment pattern
//! 3. After serialization, restore tokens longest-first (later-created first
//!    on ties), so a block token is expanded before the shortcode tokens that
//!    its original text contains
//!
//! Placeholders are plain text wrapped in private-use code points:
//! `\u{E000}seokeep{n}\u{E001}`. Text survives both element content and
//! attribute values unchanged, and the delimiters keep the keyword matcher away.

use fancy_regex::Regex as FancyRegex;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

use super::errors::LinkError;
use crate::utils::DEFAULT_PROTECTED_BLOCK_TYPES;

/// Opening delimiter of every placeholder token
pub const PLACEHOLDER_OPEN: char = '\u{E000}';

/// Closing delimiter of every placeholder token
pub const PLACEHOLDER_CLOSE: char = '\u{E001}';

const PLACEHOLDER_TAG: &str = "seokeep";

/// Shortcode with optional closing tag. `\1` ties the closer to the opener.
static SHORTCODE: LazyLock<FancyRegex> = LazyLock::new(|| {
    FancyRegex::new(r"(?s)\[([A-Za-z][\w-]*)(?![\w-])[^\[\]]*\](?:.*?\[/\1\])?")
        .expect("SHORTCODE: hardcoded regex is valid")
});

/// One block delimiter comment.
///
/// Captures: (1) closing slash, (2) namespace with trailing `/`,
/// (3) block name, (4) self-closing slash
static BLOCK_DELIMITER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"<!--\s+(/)?wp:([a-z][a-z0-9_-]*/)?([a-z][a-z0-9_-]*)(?:\s+\{[\s\S]*?\})?\s+(/)?-->",
    )
    .expect("BLOCK_DELIMITER: hardcoded regex is valid")
});

/// Insertion-ordered mapping from placeholder token to the text it replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderMap {
    entries: Vec<(String, String)>,
}

impl PlaceholderMap {
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Tokens in insertion order
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(token, _)| token.as_str())
    }

    /// Original text replaced by `token`
    #[must_use]
    pub fn original(&self, token: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(t, _)| t == token)
            .map(|(_, original)| original.as_str())
    }

    fn insert(&mut self, token: String, original: String) {
        self.entries.push((token, original));
    }
}

/// Generates tokens that do not already occur in the source content.
struct TokenMinter<'a> {
    source: &'a str,
    next: usize,
}

impl<'a> TokenMinter<'a> {
    fn new(source: &'a str) -> Self {
        Self { source, next: 0 }
    }

    fn mint(&mut self) -> String {
        loop {
            let token = format!(
                "{PLACEHOLDER_OPEN}{PLACEHOLDER_TAG}{}{PLACEHOLDER_CLOSE}",
                self.next
            );
            self.next += 1;
            if !self.source.contains(&token) {
                return token;
            }
        }
    }
}

/// Swaps shortcodes and protected blocks for placeholder tokens.
#[derive(Debug, Clone)]
pub struct RegionProtector {
    /// Lowercased block names, without the `core/` namespace
    protected_block_types: Vec<String>,
    /// Flat regex used when block delimiters do not nest cleanly
    fallback: Option<FancyRegex>,
}

impl Default for RegionProtector {
    fn default() -> Self {
        Self::new(DEFAULT_PROTECTED_BLOCK_TYPES)
    }
}

impl RegionProtector {
    /// Create a protector for the given block types (`"code"`, `"core/code"`
    /// and `"acme/widget"` style names are all accepted).
    pub fn new<S: AsRef<str>>(block_types: &[S]) -> Self {
        let mut protected_block_types: Vec<String> = block_types
            .iter()
            .map(|name| normalize_block_name(name.as_ref()))
            .filter(|name| !name.is_empty())
            .collect();
        protected_block_types.sort();
        protected_block_types.dedup();

        let fallback = build_fallback_pattern(&protected_block_types);

        Self {
            protected_block_types,
            fallback,
        }
    }

    #[must_use]
    pub fn protected_block_types(&self) -> &[String] {
        &self.protected_block_types
    }

    #[must_use]
    pub fn is_protected_block(&self, name: &str) -> bool {
        let name = normalize_block_name(name);
        self.protected_block_types.iter().any(|p| *p == name)
    }

    /// Replace protected spans with tokens.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Parse`] if the shortcode scan aborts (regex
    /// backtracking limit). Content is then unsafe to parse.
    pub fn protect(&self, content: &str) -> Result<(String, PlaceholderMap), LinkError> {
        let mut minter = TokenMinter::new(content);
        let mut placeholders = PlaceholderMap::default();

        let shortcode_ranges = shortcode_ranges(content)?;
        let without_shortcodes =
            replace_ranges(content, &shortcode_ranges, &mut minter, &mut placeholders);

        let block_ranges = match self.scan_blocks(&without_shortcodes) {
            Some(ranges) => ranges,
            None => {
                log::debug!("Block delimiters are unbalanced; using flat block pattern");
                self.fallback_block_ranges(&without_shortcodes)?
            }
        };
        let protected = replace_ranges(
            &without_shortcodes,
            &block_ranges,
            &mut minter,
            &mut placeholders,
        );

        if !placeholders.is_empty() {
            log::debug!(
                "Protected {} shortcode(s) and {} block(s)",
                shortcode_ranges.len(),
                block_ranges.len()
            );
        }

        Ok((protected, placeholders))
    }

    /// Put the original text back in place of every token.
    ///
    /// Tokens are processed in descending length order, and for equal lengths
    /// the most recently created first, so outer regions are expanded before
    /// the tokens nested inside them.
    #[must_use]
    pub fn restore(content: &str, placeholders: &PlaceholderMap) -> String {
        let mut order: Vec<usize> = (0..placeholders.entries.len()).collect();
        order.sort_by(|&a, &b| {
            let len_a = placeholders.entries[a].0.len();
            let len_b = placeholders.entries[b].0.len();
            len_b.cmp(&len_a).then(b.cmp(&a))
        });

        let mut restored = content.to_string();
        for index in order {
            let (token, original) = &placeholders.entries[index];
            restored = restored.replace(token.as_str(), original);
        }
        restored
    }

    /// Nesting-aware delimiter scan. Returns the outermost protected block
    /// spans, or `None` when openers and closers do not pair up.
    fn scan_blocks(&self, content: &str) -> Option<Vec<Range<usize>>> {
        let mut stack: Vec<(String, usize, bool)> = Vec::new();
        let mut regions = Vec::new();

        for caps in BLOCK_DELIMITER.captures_iter(content) {
            let whole = caps.get(0)?;
            let name = format!(
                "{}{}",
                caps.get(2).map_or("", |m| m.as_str()),
                caps.get(3).map_or("", |m| m.as_str())
            );
            let protected = self.is_protected_block(&name);
            let inside_protected = stack.iter().any(|(_, _, p)| *p);

            if caps.get(1).is_some() {
                let (open_name, start, open_protected) = stack.pop()?;
                if normalize_block_name(&open_name) != normalize_block_name(&name) {
                    return None;
                }
                if open_protected && !stack.iter().any(|(_, _, p)| *p) {
                    regions.push(start..whole.end());
                }
            } else if caps.get(4).is_some() {
                if protected && !inside_protected {
                    regions.push(whole.range());
                }
            } else {
                stack.push((name, whole.start(), protected));
            }
        }

        stack.is_empty().then_some(regions)
    }

    fn fallback_block_ranges(&self, content: &str) -> Result<Vec<Range<usize>>, LinkError> {
        let Some(pattern) = &self.fallback else {
            return Ok(Vec::new());
        };

        pattern
            .find_iter(content)
            .map(|found| {
                found
                    .map(|m| m.range())
                    .map_err(|e| LinkError::Parse(format!("block scan aborted: {e}")))
            })
            .collect()
    }
}

fn normalize_block_name(name: &str) -> String {
    let name = name.trim().to_lowercase();
    name.strip_prefix("core/").map(str::to_string).unwrap_or(name)
}

fn build_fallback_pattern(names: &[String]) -> Option<FancyRegex> {
    if names.is_empty() {
        return None;
    }

    let alternation = names
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|");

    let pattern = format!(
        r"(?s)<!--\s+wp:((?:core/)?(?:{alternation}))(?:\s+\{{.*?\}})?\s+(?:/-->|-->.*?<!--\s+/wp:\1\s+-->)"
    );

    match FancyRegex::new(&pattern) {
        Ok(regex) => Some(regex),
        Err(e) => {
            log::warn!("Failed to compile protected block pattern: {e}");
            None
        }
    }
}

fn shortcode_ranges(content: &str) -> Result<Vec<Range<usize>>, LinkError> {
    if !content.contains('[') {
        return Ok(Vec::new());
    }

    SHORTCODE
        .find_iter(content)
        .map(|found| {
            found
                .map(|m| m.range())
                .map_err(|e| LinkError::Parse(format!("shortcode scan aborted: {e}")))
        })
        .collect()
}

/// Replace sorted, non-overlapping ranges with freshly minted tokens.
fn replace_ranges(
    content: &str,
    ranges: &[Range<usize>],
    minter: &mut TokenMinter<'_>,
    placeholders: &mut PlaceholderMap,
) -> String {
    let mut output = String::with_capacity(content.len());
    let mut cursor = 0;

    for range in ranges {
        output.push_str(&content[cursor..range.start]);
        let token = minter.mint();
        placeholders.insert(token.clone(), content[range.clone()].to_string());
        output.push_str(&token);
        cursor = range.end;
    }

    output.push_str(&content[cursor..]);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protect(content: &str) -> (String, PlaceholderMap) {
        RegionProtector::default().protect(content).unwrap()
    }

    #[test]
    fn test_shortcode_pair_is_replaced() {
        let (protected, map) = protect("<p>هذه كلمة</p>[custom]كلمة[/custom]");
        assert_eq!(map.len(), 1);
        assert!(!protected.contains("[custom]"));
        assert!(protected.starts_with("<p>هذه كلمة</p>"));
        assert_eq!(map.original(map.tokens().next().unwrap()), Some("[custom]كلمة[/custom]"));
    }

    #[test]
    fn test_self_closing_shortcode() {
        let (protected, map) = protect(r#"<p>before [gallery ids="1,2"] after</p>"#);
        assert_eq!(map.len(), 1);
        assert!(protected.contains("before \u{E000}seokeep0\u{E001} after"));
    }

    #[test]
    fn test_bracketed_numbers_are_not_shortcodes() {
        let (protected, map) = protect("<p>see note [1] and [2]</p>");
        assert!(map.is_empty());
        assert_eq!(protected, "<p>see note [1] and [2]</p>");
    }

    #[test]
    fn test_protected_block_with_nested_shortcode_restores() {
        let content = "<!-- wp:shortcode -->[gallery]كلمة[/gallery]<!-- /wp:shortcode --><p>كلمة ثانية</p>";
        let (protected, map) = protect(content);
        assert_eq!(map.len(), 2);
        assert!(!protected.contains("wp:shortcode"));
        assert!(protected.ends_with("<p>كلمة ثانية</p>"));
        assert_eq!(RegionProtector::restore(&protected, &map), content);
    }

    #[test]
    fn test_unprotected_block_is_left_alone() {
        let content = "<!-- wp:paragraph --><p>text</p><!-- /wp:paragraph -->";
        let (protected, map) = protect(content);
        assert!(map.is_empty());
        assert_eq!(protected, content);
    }

    #[test]
    fn test_protected_block_inside_unprotected_group() {
        let content = concat!(
            "<!-- wp:group --><div>",
            "<!-- wp:code --><pre class=\"wp-block-code\"><code>keyword</code></pre><!-- /wp:code -->",
            "<p>keyword</p></div><!-- /wp:group -->"
        );
        let (protected, map) = protect(content);
        assert_eq!(map.len(), 1);
        assert!(protected.contains("<!-- wp:group -->"));
        assert!(protected.contains("<p>keyword</p>"));
        assert!(!protected.contains("<code>"));
        assert_eq!(RegionProtector::restore(&protected, &map), content);
    }

    #[test]
    fn test_namespaced_and_self_closing_blocks() {
        let content = r#"<!-- wp:core/button {"url":"https://x.test"} /--><p>a</p><!-- wp:acme/widget /-->"#;
        let (protected, map) = protect(content);
        assert_eq!(map.len(), 1);
        assert!(protected.contains("acme/widget"));
    }

    #[test]
    fn test_unbalanced_delimiters_fall_back_to_flat_pattern() {
        let content = "<!-- wp:group --><!-- wp:code --><pre>x</pre><!-- /wp:code --><p>y</p>";
        let (protected, map) = protect(content);
        assert_eq!(map.len(), 1);
        assert!(protected.contains("<!-- wp:group -->"));
        assert!(!protected.contains("<pre>"));
        assert_eq!(RegionProtector::restore(&protected, &map), content);
    }

    #[test]
    fn test_tokens_never_collide_with_existing_content() {
        let content = "<p>\u{E000}seokeep0\u{E001}</p>[x]";
        let (protected, map) = protect(content);
        let token = map.tokens().next().unwrap();
        assert_ne!(token, "\u{E000}seokeep0\u{E001}");
        assert!(protected.contains(token));
        assert_eq!(RegionProtector::restore(&protected, &map), content);
    }

    #[test]
    fn test_custom_block_types() {
        let protector = RegionProtector::new(&["core/quote"]);
        assert!(protector.is_protected_block("quote"));
        assert!(!protector.is_protected_block("code"));
        let (protected, map) = protector
            .protect("<!-- wp:quote --><blockquote>q</blockquote><!-- /wp:quote -->")
            .unwrap();
        assert_eq!(map.len(), 1);
        assert!(!protected.contains("blockquote"));
    }
}
