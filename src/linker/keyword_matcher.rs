//! Boundary-safe, case-insensitive keyword matching
//!
//! A keyword matches only as a whole word: the character before and after
//! the match may not be a Unicode word character (letters, marks, digits,
//! connector punctuation). This works the same for Latin and Arabic text, so
//! `keyword` never matches inside `keywordish` and `كلمة` never matches
//! inside `كلمات`.
//!
//! Protected-region placeholders (`\u{E000}seokeep{n}\u{E001}`) act as word
//! boundaries from the outside, so `alpha[sc]...[/sc]` still links `alpha`.
//! A match may not start right after an opening delimiter or end right
//! before a closing one, which keeps every match out of the token itself.

use fancy_regex::Regex as FancyRegex;
use regex::Regex;

use super::errors::LinkError;

/// Characters that may not sit directly before a keyword match
const BEFORE_CLASS: &str = r"[\w\x{E000}]";

/// Characters that may not sit directly after a keyword match
const AFTER_CLASS: &str = r"[\w\x{E001}]";

/// A single keyword occurrence, splitting the haystack into three parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeywordMatch<'t> {
    pub before: &'t str,
    pub matched: &'t str,
    pub after: &'t str,
}

/// Compiled matcher for one keyword
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keyword: String,
    /// Whole-word pattern (needs lookaround, hence fancy-regex)
    bounded: FancyRegex,
    /// Plain case-insensitive substring pattern used as a cheap pre-filter
    substring: Regex,
}

impl KeywordMatcher {
    /// Compile the matcher for `keyword`.
    ///
    /// # Errors
    ///
    /// Returns an error if the keyword is empty after trimming or the
    /// generated pattern fails to compile.
    pub fn new(keyword: &str) -> Result<Self, LinkError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(LinkError::Pattern("keyword is empty".to_string()));
        }

        let escaped = regex::escape(keyword);

        let bounded = FancyRegex::new(&format!(
            "(?i)(?<!{BEFORE_CLASS}){escaped}(?!{AFTER_CLASS})"
        ))
        .map_err(|e| LinkError::Pattern(e.to_string()))?;

        let substring = Regex::new(&format!("(?i){escaped}"))
            .map_err(|e| LinkError::Pattern(e.to_string()))?;

        Ok(Self {
            keyword: keyword.to_string(),
            bounded,
            substring,
        })
    }

    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Case-insensitive substring test, ignoring word boundaries.
    #[must_use]
    pub fn appears_in(&self, haystack: &str) -> bool {
        self.substring.is_match(haystack)
    }

    /// Find the first whole-word occurrence of the keyword.
    ///
    /// Zero-length matches are treated as no match.
    #[must_use]
    pub fn find_first<'t>(&self, text: &'t str) -> Option<KeywordMatch<'t>> {
        let found = match self.bounded.find(text) {
            Ok(found) => found?,
            Err(e) => {
                log::warn!("Keyword match for '{}' aborted: {e}", self.keyword);
                return None;
            }
        };

        if found.start() == found.end() {
            return None;
        }

        Some(KeywordMatch {
            before: &text[..found.start()],
            matched: found.as_str(),
            after: &text[found.end()..],
        })
    }

    /// Count non-overlapping whole-word occurrences.
    #[must_use]
    pub fn count_in(&self, text: &str) -> usize {
        self.bounded
            .find_iter(text)
            .filter_map(Result::ok)
            .filter(|m| m.start() < m.end())
            .count()
    }
}

/// One-shot convenience over [`KeywordMatcher::find_first`].
#[must_use]
pub fn find_first<'t>(text: &'t str, keyword: &str) -> Option<KeywordMatch<'t>> {
    KeywordMatcher::new(keyword).ok()?.find_first(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_whole_word_latin() {
        let m = find_first("a keywordish keyword here", "keyword").unwrap();
        assert_eq!(m.before, "a keywordish ");
        assert_eq!(m.matched, "keyword");
        assert_eq!(m.after, " here");
    }

    #[test]
    fn test_whole_word_arabic() {
        assert!(find_first("كلمات أخرى", "كلمة").is_none());
        let m = find_first("هذه كلمة خارجية", "كلمة").unwrap();
        assert_eq!(m.before, "هذه ");
        assert_eq!(m.after, " خارجية");
    }

    #[test]
    fn test_case_insensitive_keeps_original_spelling() {
        let m = find_first("Visit KUWAIT today", "kuwait").unwrap();
        assert_eq!(m.matched, "KUWAIT");
    }

    #[test]
    fn test_only_first_occurrence_is_split() {
        let m = find_first("alpha beta alpha", "alpha").unwrap();
        assert_eq!(m.before, "");
        assert_eq!(m.after, " beta alpha");
    }

    #[test]
    fn test_underscore_and_digits_are_word_characters() {
        assert!(find_first("my_keyword", "keyword").is_none());
        assert!(find_first("keyword2", "keyword").is_none());
        assert!(find_first("(keyword)", "keyword").is_some());
    }

    #[test]
    fn test_private_use_delimiters_block_matches() {
        assert!(find_first("\u{E000}seokeep1\u{E001}", "1").is_none());
        assert!(find_first("\u{E000}seokeep1\u{E001}", "seokeep1").is_none());
    }

    #[test]
    fn test_placeholders_are_boundaries_from_outside() {
        let m = find_first("alpha\u{E000}seokeep0\u{E001}", "alpha").unwrap();
        assert_eq!(m.after, "\u{E000}seokeep0\u{E001}");
        let m = find_first("\u{E000}seokeep0\u{E001}alpha", "alpha").unwrap();
        assert_eq!(m.before, "\u{E000}seokeep0\u{E001}");
        assert!(find_first("alpha\u{E000}seokeep0\u{E001}x", "seokeep0").is_none());
    }

    #[test]
    fn test_keyword_with_regex_metacharacters() {
        let m = find_first("price (USD) list", "(USD)").unwrap();
        assert_eq!(m.matched, "(USD)");
    }

    #[test]
    fn test_count_and_prefilter() {
        let matcher = KeywordMatcher::new("beta").unwrap();
        assert_eq!(matcher.count_in("beta alphabeta beta"), 2);
        assert!(matcher.appears_in("ALPHABETA"));
        assert!(!matcher.appears_in("gamma"));
    }

    #[test]
    fn test_empty_keyword_rejected() {
        assert!(KeywordMatcher::new("   ").is_err());
    }
}
