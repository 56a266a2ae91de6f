//! Error types for element extraction.
//!
//! Per-item failures (one pattern, one linked page, one download) are logged
//! and skipped by the batch that hit them; only the variants returned from the
//! public entry points ever reach a caller.

use thiserror::Error;

/// Failures compiling or evaluating a pattern expression
#[derive(Error, Debug, Clone, PartialEq)]
pub enum XPathError {
    #[error("syntax error at offset {position}: {message}")]
    Syntax { position: usize, message: String },

    #[error("unknown function {0}()")]
    UnknownFunction(String),

    #[error("{name}() expects {expected} argument(s), got {found}")]
    Arity {
        name: String,
        expected: String,
        found: usize,
    },

    #[error("expression does not select nodes")]
    NotANodeSet,
}

impl XPathError {
    pub(crate) fn syntax(position: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            position,
            message: message.into(),
        }
    }
}

/// A linked page could not be retrieved
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("request to {url} timed out after {millis}ms")]
    Timeout { url: String, millis: u128 },
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("at least one pattern expression is required")]
    EmptyPatterns,

    #[error("pattern `{pattern}` failed: {source}")]
    PatternEval {
        pattern: String,
        #[source]
        source: XPathError,
    },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cannot resolve link `{href}` against {base}")]
    UrlResolution { href: String, base: String },

    #[error("invalid link filter: {0}")]
    InvalidFilter(#[from] regex::Error),

    #[error("no page to extract from")]
    NoCurrentPage,

    #[error("extraction cancelled")]
    Cancelled,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("no suitable element found at the clicked position")]
    NoSuitableElement,
}

#[derive(Error, Debug)]
pub enum AiError {
    #[error("an API key is required to analyze elements")]
    MissingCredential,

    #[error("no pattern object found in the response: {0}")]
    ResponseParse(String),

    #[error("analysis request failed: {0}")]
    Request(String),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value is malformed: {0}")]
    Json(#[from] serde_json::Error),
}

/// One PDF could not be saved; the rest of the batch continues
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("cannot write {path}: {source}")]
    Write {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
}
