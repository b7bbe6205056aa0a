//! Keyword → URL linking rules
//!
//! Rules reach the crate in two shapes: the structured list written by the
//! current settings format, and the legacy flat `keyword → url` map. Both are
//! represented by [`RawLinkRules`] at the boundary and normalized exactly once
//! into validated [`LinkRule`] values. Nothing past normalization ever needs
//! to know which shape the rules arrived in.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::linker::errors::InvalidRule;
use crate::utils::validate_url;

/// A validated internal-linking directive.
///
/// **INVARIANT:** `keyword` is trimmed and non-empty, `url` is an absolute
/// http(s) URL, `repeats >= 1`. The fields are private so the only way to get
/// a `LinkRule` is through [`LinkRule::new`] or normalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLinkRule", into = "RawLinkRule")]
pub struct LinkRule {
    keyword: String,
    url: String,
    repeats: u32,
}

impl LinkRule {
    /// Build a rule with `repeats = 1`.
    pub fn new(keyword: impl AsRef<str>, url: impl AsRef<str>) -> Result<Self, InvalidRule> {
        Self::with_repeats(keyword, url, 1)
    }

    /// Build a rule with an explicit repeat count (clamped to at least 1).
    ///
    /// The engine still places at most one anchor per destination URL; the
    /// repeat count is carried so settings round-trip without loss.
    pub fn with_repeats(
        keyword: impl AsRef<str>,
        url: impl AsRef<str>,
        repeats: i64,
    ) -> Result<Self, InvalidRule> {
        let keyword = sanitize_keyword(keyword.as_ref());
        if keyword.is_empty() {
            return Err(InvalidRule::EmptyKeyword);
        }

        let raw_url = url.as_ref().trim();
        if raw_url.is_empty() {
            return Err(InvalidRule::EmptyUrl {
                keyword: keyword.clone(),
            });
        }

        let url = validate_url(raw_url).ok_or_else(|| InvalidRule::InvalidUrl {
            keyword: keyword.clone(),
            url: raw_url.to_string(),
        })?;

        let repeats = u32::try_from(repeats.max(1)).unwrap_or(u32::MAX);

        Ok(Self {
            keyword,
            url,
            repeats,
        })
    }

    #[must_use]
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn repeats(&self) -> u32 {
        self.repeats
    }
}

/// Strip control characters and collapse surrounding whitespace.
fn sanitize_keyword(keyword: &str) -> String {
    keyword
        .chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// One structured rule record as it appears in settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawLinkRule {
    #[serde(default)]
    pub keyword: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeats: Option<i64>,
}

impl TryFrom<RawLinkRule> for LinkRule {
    type Error = InvalidRule;

    fn try_from(raw: RawLinkRule) -> Result<Self, Self::Error> {
        LinkRule::with_repeats(raw.keyword, raw.url, raw.repeats.unwrap_or(1))
    }
}

impl From<LinkRule> for RawLinkRule {
    fn from(rule: LinkRule) -> Self {
        Self {
            keyword: rule.keyword,
            url: rule.url,
            repeats: Some(i64::from(rule.repeats)),
        }
    }
}

/// Rules as found at the settings boundary.
///
/// `Structured` is tried first, so an empty JSON array is structured and an
/// empty JSON object is legacy; both normalize to no rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLinkRules {
    /// Ordered list of `{keyword, url, repeats}` records. Entries that are not
    /// objects are kept as raw values and dropped during normalization.
    Structured(Vec<Value>),
    /// Legacy `{ "keyword": "url", ... }` map, insertion ordered.
    Legacy(Map<String, Value>),
}

impl Default for RawLinkRules {
    fn default() -> Self {
        Self::Structured(Vec::new())
    }
}

impl RawLinkRules {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Structured(rules) => rules.is_empty(),
            Self::Legacy(map) => map.is_empty(),
        }
    }
}

/// Normalize rules from either shape, dropping malformed entries.
///
/// Order is preserved. Every dropped entry is logged with the reason.
#[must_use]
pub fn normalize_rules(raw: &RawLinkRules) -> Vec<LinkRule> {
    let mut rules = Vec::new();

    match raw {
        RawLinkRules::Legacy(map) => {
            for (keyword, url) in map {
                let Some(url) = url.as_str() else {
                    log::warn!("Dropping legacy link rule '{keyword}': url is not a string");
                    continue;
                };
                match LinkRule::new(keyword, url) {
                    Ok(rule) => rules.push(rule),
                    Err(e) => log::warn!("Dropping legacy link rule: {e}"),
                }
            }
        }
        RawLinkRules::Structured(entries) => {
            for (index, entry) in entries.iter().enumerate() {
                let Value::Object(object) = entry else {
                    log::warn!("Dropping link rule #{index}: entry is not an object");
                    continue;
                };

                let keyword = object.get("keyword").and_then(Value::as_str).unwrap_or("");
                let url = object.get("url").and_then(Value::as_str).unwrap_or("");
                let repeats = object.get("repeats").and_then(value_as_i64).unwrap_or(1);

                match LinkRule::with_repeats(keyword, url, repeats) {
                    Ok(rule) => rules.push(rule),
                    Err(e) => log::warn!("Dropping link rule #{index}: {e}"),
                }
            }
        }
    }

    rules
}

/// Accept numbers and numeric strings for `repeats`, as older settings stored both.
fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
