//! Batch rejection taxonomy.

use serde::Serialize;
use thiserror::Error;

use crate::change::{ChangeKind, PatternError};
use crate::model::{ContextPath, ContextState, EndpointId, OwnerId, SnapshotId};

/// A change references something that is missing or malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("endpoint {0} declares no patterns")]
    NoPatterns(EndpointId),

    #[error("context {0} does not exist")]
    UnknownContext(ContextPath),

    #[error("context {path} is {state} and accepts no new endpoints")]
    ContextNotAccepting { path: ContextPath, state: ContextState },

    #[error("endpoint {0} does not exist")]
    UnknownEndpoint(EndpointId),

    #[error("endpoint {id} belongs to {owner}")]
    NotOwner { id: EndpointId, owner: OwnerId },

    #[error("owner {0} has nothing registered")]
    UnknownOwner(OwnerId),

    #[error("{owner} cannot unregister {target}")]
    ForeignOwner { owner: OwnerId, target: OwnerId },
}

/// A change would break a structural invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConflictError {
    #[error("context {path} already exists and is {state}")]
    ContextExists { path: ContextPath, state: ContextState },

    #[error("endpoint id {0} is already registered")]
    DuplicateEndpoint(EndpointId),
}

/// Coarse classification reported to callers and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectionKind {
    ValidationError,
    Conflict,
    Cancelled,
    Halted,
}

impl RejectionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionKind::ValidationError => "validation_error",
            RejectionKind::Conflict => "conflict",
            RejectionKind::Cancelled => "cancelled",
            RejectionKind::Halted => "halted",
        }
    }
}

/// Why a batch left the model untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("change #{index} ({op}) is invalid: {source}")]
    Validation {
        index: usize,
        op: ChangeKind,
        #[source]
        source: ValidationError,
    },

    #[error("change #{index} ({op}) conflicts: {source}")]
    Conflict {
        index: usize,
        op: ChangeKind,
        #[source]
        source: ConflictError,
    },

    #[error("batch was cancelled before it was applied")]
    Cancelled,

    /// Writes are stopped: the model was found corrupted or the engine is
    /// shutting down.
    #[error("registry is not accepting writes: {0}")]
    Halted(String),
}

impl Rejection {
    pub fn kind(&self) -> RejectionKind {
        match self {
            Rejection::Validation { .. } => RejectionKind::ValidationError,
            Rejection::Conflict { .. } => RejectionKind::Conflict,
            Rejection::Cancelled => RejectionKind::Cancelled,
            Rejection::Halted(_) => RejectionKind::Halted,
        }
    }
}

/// Failure of a single change, before it is tagged with its position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ChangeError {
    Validation(ValidationError),
    Conflict(ConflictError),
}

impl From<ValidationError> for ChangeError {
    fn from(e: ValidationError) -> Self {
        ChangeError::Validation(e)
    }
}

impl From<ConflictError> for ChangeError {
    fn from(e: ConflictError) -> Self {
        ChangeError::Conflict(e)
    }
}

impl From<PatternError> for ChangeError {
    fn from(e: PatternError) -> Self {
        ChangeError::Validation(e.into())
    }
}

impl ChangeError {
    pub(crate) fn at(self, index: usize, op: ChangeKind) -> Rejection {
        match self {
            ChangeError::Validation(source) => Rejection::Validation { index, op, source },
            ChangeError::Conflict(source) => Rejection::Conflict { index, op, source },
        }
    }
}

/// A controller-driven lifecycle step could not be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("context {0} does not exist")]
    UnknownContext(ContextPath),

    #[error("context {path} cannot move from {from} to {to}")]
    Illegal {
        path: ContextPath,
        from: ContextState,
        to: ContextState,
    },

    /// The context at `path` was recreated since the step was planned.
    #[error("context {path} created in {expected} was replaced by one created in {found}")]
    Replaced {
        path: ContextPath,
        expected: SnapshotId,
        found: SnapshotId,
    },

    #[error("registry is not accepting writes: {0}")]
    Halted(String),
}
