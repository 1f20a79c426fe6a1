//! Identifiers and small value types shared by the model.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors raised while parsing identifiers and context paths.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentError {
    #[error("context path '{0}' must start with '/'")]
    MissingLeadingSlash(String),

    #[error("context path '{0}' contains an empty segment")]
    EmptySegment(String),

    #[error("context path '{0}' contains a reserved character")]
    ReservedCharacter(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// A normalized context path.
///
/// The root context is the empty string. Every other path starts with a
/// slash and never ends with one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContextPath(String);

impl ContextPath {
    /// The root context (`""`).
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Parse and normalize a context path.
    ///
    /// `""` and `"/"` both name the root context; a single trailing slash is
    /// trimmed.
    pub fn parse(raw: &str) -> Result<Self, IdentError> {
        if raw.is_empty() || raw == "/" {
            return Ok(Self::root());
        }
        if !raw.starts_with('/') {
            return Err(IdentError::MissingLeadingSlash(raw.to_string()));
        }
        if raw.contains(['*', '?', '#', ' ']) {
            return Err(IdentError::ReservedCharacter(raw.to_string()));
        }
        let trimmed = raw.strip_suffix('/').unwrap_or(raw);
        if trimmed[1..].split('/').any(str::is_empty) {
            return Err(IdentError::EmptySegment(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Strip this context from a request URI.
    ///
    /// Returns the remainder (possibly empty) when the URI falls inside the
    /// context on a segment boundary.
    pub fn strip_from<'a>(&self, uri: &'a str) -> Option<&'a str> {
        let rest = uri.strip_prefix(self.0.as_str())?;
        if rest.is_empty() || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

impl TryFrom<String> for ContextPath {
    type Error = IdentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ContextPath> for String {
    fn from(path: ContextPath) -> Self {
        path.0
    }
}

impl fmt::Display for ContextPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0)
        }
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $what:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Result<Self, IdentError> {
                let id = id.into();
                if id.trim().is_empty() {
                    return Err(IdentError::Empty($what));
                }
                Ok(Self(id))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdentError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Caller-chosen endpoint identifier, unique across the whole server.
    EndpointId,
    "endpoint id"
);

string_id!(
    /// Identity of a registering owner (one per calling module).
    OwnerId,
    "owner id"
);

/// Monotonic version of a published snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SnapshotId(pub u64);

impl SnapshotId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Lifecycle state of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextState {
    Creating,
    Active,
    Draining,
    Destroyed,
}

impl ContextState {
    /// A live context still owns its path.
    pub fn is_live(self) -> bool {
        !matches!(self, ContextState::Destroyed)
    }

    /// Legal transitions of the context state machine.
    pub fn can_transition_to(self, next: ContextState) -> bool {
        use ContextState::*;
        matches!(
            (self, next),
            (Creating, Active) | (Creating, Destroyed) | (Creating, Draining)
                | (Active, Draining) | (Draining, Destroyed)
        )
    }
}

impl fmt::Display for ContextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ContextState::Creating => "CREATING",
            ContextState::Active => "ACTIVE",
            ContextState::Draining => "DRAINING",
            ContextState::Destroyed => "DESTROYED",
        };
        f.write_str(s)
    }
}

/// What kind of unit an endpoint is.
///
/// Servlets and resources compete for a request; filters wrap whichever
/// endpoint wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointKind {
    #[default]
    Servlet,
    Resource,
    Filter,
}

impl EndpointKind {
    pub fn is_filter(self) -> bool {
        matches!(self, EndpointKind::Filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_path_normalization() {
        assert_eq!(ContextPath::parse("").unwrap(), ContextPath::root());
        assert_eq!(ContextPath::parse("/").unwrap(), ContextPath::root());
        assert_eq!(ContextPath::parse("/c1/").unwrap().as_str(), "/c1");
        assert_eq!(ContextPath::parse("/a/b").unwrap().as_str(), "/a/b");

        assert!(matches!(ContextPath::parse("c1"), Err(IdentError::MissingLeadingSlash(_))));
        assert!(matches!(ContextPath::parse("/a//b"), Err(IdentError::EmptySegment(_))));
        assert!(matches!(ContextPath::parse("/a/*"), Err(IdentError::ReservedCharacter(_))));
    }

    #[test]
    fn test_strip_from_respects_segments() {
        let c1 = ContextPath::parse("/c1").unwrap();
        assert_eq!(c1.strip_from("/c1/x"), Some("/x"));
        assert_eq!(c1.strip_from("/c1"), Some(""));
        assert_eq!(c1.strip_from("/c10/x"), None);
        assert_eq!(ContextPath::root().strip_from("/c10/x"), Some("/c10/x"));
    }

    #[test]
    fn test_state_machine() {
        assert!(ContextState::Creating.can_transition_to(ContextState::Active));
        assert!(ContextState::Creating.can_transition_to(ContextState::Destroyed));
        assert!(ContextState::Active.can_transition_to(ContextState::Draining));
        assert!(ContextState::Draining.can_transition_to(ContextState::Destroyed));
        assert!(!ContextState::Destroyed.can_transition_to(ContextState::Active));
        assert!(!ContextState::Active.can_transition_to(ContextState::Creating));
        assert!(!ContextState::Draining.can_transition_to(ContextState::Active));
    }

    #[test]
    fn test_ids_reject_blank() {
        assert!(EndpointId::new("  ").is_err());
        assert_eq!(OwnerId::new("bundle-7").unwrap().as_str(), "bundle-7");
    }
}
