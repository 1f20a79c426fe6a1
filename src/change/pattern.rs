//! URL pattern grammar.
//!
//! ```text
//! ""          context root (only the request "/")
//! "/"         default endpoint
//! "/p/*"      path prefix; "/*" matches everything
//! "*.ext"     extension of the last segment
//! "/x/y"      exact
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid pattern '{pattern}': {reason}")]
pub struct PatternError {
    pub pattern: String,
    pub reason: &'static str,
}

impl PatternError {
    fn new(pattern: &str, reason: &'static str) -> Self {
        Self {
            pattern: pattern.to_string(),
            reason,
        }
    }
}

/// A parsed mapping pattern.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum UrlPattern {
    ContextRoot,
    Default,
    /// Literal request path.
    Exact(String),
    /// Directory prefix without the trailing `/*` (empty for `/*`).
    Prefix(String),
    /// Extension without the leading `*.`.
    Extension(String),
}

impl UrlPattern {
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if raw.is_empty() {
            return Ok(UrlPattern::ContextRoot);
        }
        if raw.chars().any(char::is_whitespace) {
            return Err(PatternError::new(raw, "whitespace is not allowed"));
        }
        if raw == "/" {
            return Ok(UrlPattern::Default);
        }
        if let Some(ext) = raw.strip_prefix("*.") {
            if ext.is_empty() {
                return Err(PatternError::new(raw, "extension must not be empty"));
            }
            if ext.contains(['/', '*']) {
                return Err(PatternError::new(raw, "extension must not contain '/' or '*'"));
            }
            // Matching compares against the text after the last dot only.
            if ext.contains('.') {
                return Err(PatternError::new(raw, "extension must not contain '.'"));
            }
            return Ok(UrlPattern::Extension(ext.to_string()));
        }
        if !raw.starts_with('/') {
            return Err(PatternError::new(raw, "pattern must start with '/' or '*.'"));
        }
        if let Some(prefix) = raw.strip_suffix("/*") {
            if prefix.contains('*') {
                return Err(PatternError::new(raw, "'*' is only allowed as the last segment"));
            }
            return Ok(UrlPattern::Prefix(prefix.to_string()));
        }
        if raw.contains('*') {
            return Err(PatternError::new(raw, "'*' is only allowed in '/<prefix>/*' or '*.<ext>'"));
        }
        Ok(UrlPattern::Exact(raw.to_string()))
    }

    /// Whether `path` (relative to its context) falls under this pattern.
    ///
    /// Used for filter chains, where `/` behaves like `/*`.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            UrlPattern::ContextRoot => path == "/",
            UrlPattern::Default => true,
            UrlPattern::Exact(literal) => literal == path,
            UrlPattern::Prefix(prefix) => prefix_matches(prefix, path),
            UrlPattern::Extension(ext) => extension_of(path) == Some(ext.as_str()),
        }
    }
}

/// `/p/*` covers `/p` itself and everything below `/p/`.
pub(crate) fn prefix_matches(prefix: &str, path: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Extension of the last path segment, if it has one.
pub(crate) fn extension_of(path: &str) -> Option<&str> {
    let last = path.rsplit('/').next().unwrap_or(path);
    let (stem, ext) = last.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    Some(ext)
}

impl TryFrom<String> for UrlPattern {
    type Error = PatternError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<UrlPattern> for String {
    fn from(pattern: UrlPattern) -> Self {
        pattern.to_string()
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::ContextRoot => Ok(()),
            UrlPattern::Default => f.write_str("/"),
            UrlPattern::Exact(literal) => f.write_str(literal),
            UrlPattern::Prefix(prefix) => write!(f, "{}/*", prefix),
            UrlPattern::Extension(ext) => write!(f, "*.{}", ext),
        }
    }
}
