//! Error types for link injection
//!
//! None of these escape the public linking entry points: a [`LinkError`]
//! makes the engine hand back the original content untouched, and an
//! [`InvalidRule`] drops a single rule during normalization.

use thiserror::Error;

/// Failure while parsing or serializing content. The content is never
/// partially modified when one of these occurs.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Markup the parser would silently restructure or truncate
    #[error("Content could not be parsed safely: {0}")]
    Parse(String),

    /// A protected-region placeholder did not survive the parse round trip
    #[error("Protected region placeholder was lost or duplicated during parsing: {token:?}")]
    PlaceholderLost { token: String },

    /// Serializing the document failed
    #[error("Failed to serialize document: {0}")]
    Serialize(#[from] std::io::Error),

    /// Serialized output was not valid UTF-8
    #[error("Serialized document is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// A keyword pattern failed to compile
    #[error("Invalid keyword pattern: {0}")]
    Pattern(String),

    /// A CSS selector used internally failed to compile
    #[error("Invalid CSS selector: {0}")]
    Selector(&'static str),
}

/// Reason a configured rule was dropped during normalization
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRule {
    #[error("keyword is empty")]
    EmptyKeyword,

    #[error("url for keyword '{keyword}' is empty")]
    EmptyUrl { keyword: String },

    #[error("url '{url}' for keyword '{keyword}' is not an absolute http(s) URL")]
    InvalidUrl { keyword: String, url: String },
}
