//! Registered entities: endpoints, contexts and per-owner indexes.

use serde::Serialize;
use std::collections::BTreeSet;

use crate::change::pattern::UrlPattern;
use crate::model::types::{ContextPath, ContextState, EndpointId, EndpointKind, OwnerId, SnapshotId};
use crate::routing::table::MappingTable;

/// One servable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointModel {
    pub id: EndpointId,
    /// Owner that registered the endpoint (lookup only).
    pub owner: OwnerId,
    pub context: ContextPath,
    pub kind: EndpointKind,
    pub patterns: BTreeSet<UrlPattern>,
    pub priority: i32,
    pub enabled: bool,
    /// Registry-assigned sequence, unique and increasing.
    pub registration: u64,
}

/// A path-rooted namespace of endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContextModel {
    pub path: ContextPath,
    pub state: ContextState,
    /// Owner whose create-context change brought the context to life.
    pub creator: OwnerId,
    /// Snapshot that created this context. Tells apart successive
    /// contexts registered at the same path.
    pub incarnation: SnapshotId,
    pub endpoints: BTreeSet<EndpointId>,
    pub mappings: MappingTable,
}

impl ContextModel {
    pub fn new(path: ContextPath, creator: OwnerId, incarnation: SnapshotId) -> Self {
        Self {
            path,
            state: ContextState::Creating,
            creator,
            incarnation,
            endpoints: BTreeSet::new(),
            mappings: MappingTable::default(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == ContextState::Active
    }
}

/// Index of everything one owner has contributed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceModel {
    pub owner: OwnerId,
    pub contexts: BTreeSet<ContextPath>,
    pub endpoints: BTreeSet<EndpointId>,
}

impl ServiceModel {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            owner,
            contexts: BTreeSet::new(),
            endpoints: BTreeSet::new(),
        }
    }
}
