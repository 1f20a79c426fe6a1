//! Change and batch protocol.
//!
//! # Data Flow
//! ```text
//! Registering owner
//!     → Batch::new(owner).add_endpoint(..).enable(..)   (append-only)
//!     → submitted to the apply loop
//!     → each Change applied in order against a working copy
//!     → whole batch commits or nothing does
//! ```
//!
//! # Design Decisions
//! - `Change` is a closed enum; the applier matches it exhaustively
//! - Changes carry raw pattern strings so malformed ones are rejected by
//!   validation rather than at construction
//! - Changes are never mutated once built

pub mod batch;
pub mod pattern;

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{ContextPath, EndpointId, EndpointKind, OwnerId};

pub use batch::{Batch, BatchId};
pub use pattern::{PatternError, UrlPattern};

/// Registration request for one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub id: EndpointId,
    pub context: ContextPath,
    #[serde(default)]
    pub kind: EndpointKind,
    pub patterns: Vec<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl EndpointSpec {
    pub fn servlet<P, S>(id: EndpointId, context: ContextPath, patterns: P) -> Self
    where
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id,
            context,
            kind: EndpointKind::Servlet,
            patterns: patterns.into_iter().map(Into::into).collect(),
            priority: 0,
            enabled: true,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: EndpointKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// One requested mutation of the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Change {
    CreateContext {
        path: ContextPath,
        /// Accept an existing live context instead of conflicting.
        #[serde(default)]
        upsert: bool,
    },
    DestroyContext {
        path: ContextPath,
    },
    AddEndpoint(EndpointSpec),
    RemoveEndpoint {
        id: EndpointId,
    },
    EnableEndpoint {
        id: EndpointId,
    },
    DisableEndpoint {
        id: EndpointId,
    },
    /// Drop everything an owner registered.
    UnregisterOwner {
        owner: OwnerId,
    },
}

/// Operation tag of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Create,
    Destroy,
    Add,
    Remove,
    Enable,
    Disable,
    Unregister,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeKind::Create => "create",
            ChangeKind::Destroy => "destroy",
            ChangeKind::Add => "add",
            ChangeKind::Remove => "remove",
            ChangeKind::Enable => "enable",
            ChangeKind::Disable => "disable",
            ChangeKind::Unregister => "unregister",
        };
        f.write_str(s)
    }
}

impl Change {
    pub fn kind(&self) -> ChangeKind {
        match self {
            Change::CreateContext { .. } => ChangeKind::Create,
            Change::DestroyContext { .. } => ChangeKind::Destroy,
            Change::AddEndpoint(_) => ChangeKind::Add,
            Change::RemoveEndpoint { .. } => ChangeKind::Remove,
            Change::EnableEndpoint { .. } => ChangeKind::Enable,
            Change::DisableEndpoint { .. } => ChangeKind::Disable,
            Change::UnregisterOwner { .. } => ChangeKind::Unregister,
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::CreateContext { path, upsert } => {
                write!(f, "create context {}{}", path, if *upsert { " (upsert)" } else { "" })
            }
            Change::DestroyContext { path } => write!(f, "destroy context {}", path),
            Change::AddEndpoint(spec) => write!(
                f,
                "add {:?} {} to {} {:?}{}",
                spec.kind,
                spec.id,
                spec.context,
                spec.patterns,
                if spec.enabled { "" } else { " (disabled)" }
            ),
            Change::RemoveEndpoint { id } => write!(f, "remove endpoint {}", id),
            Change::EnableEndpoint { id } => write!(f, "enable endpoint {}", id),
            Change::DisableEndpoint { id } => write!(f, "disable endpoint {}", id),
            Change::UnregisterOwner { owner } => write!(f, "unregister owner {}", owner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_json_shape() {
        let json = r#"[
            {"op": "create_context", "path": "/c1"},
            {"op": "add_endpoint", "id": "s1", "context": "/c1", "patterns": ["/p/*", "*.action"]},
            {"op": "disable_endpoint", "id": "s1"}
        ]"#;
        let changes: Vec<Change> = serde_json::from_str(json).unwrap();
        assert_eq!(changes.len(), 3);
        assert_eq!(changes[0], Change::CreateContext { path: ContextPath::parse("/c1").unwrap(), upsert: false });

        let Change::AddEndpoint(spec) = &changes[1] else {
            panic!("expected add_endpoint");
        };
        assert!(spec.enabled);
        assert_eq!(spec.kind, EndpointKind::Servlet);
        assert_eq!(changes[2].kind(), ChangeKind::Disable);
    }

    #[test]
    fn test_bad_context_path_fails_to_decode() {
        let json = r#"{"op": "destroy_context", "path": "no-slash"}"#;
        assert!(serde_json::from_str::<Change>(json).is_err());
    }
}
