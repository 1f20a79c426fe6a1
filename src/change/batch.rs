//! Ordered, append-only groups of changes.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::change::{Change, EndpointSpec};
use crate::model::{ContextPath, EndpointId, OwnerId};

/// Identifier of a submitted batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BatchId(Uuid);

impl BatchId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "batch-{}", self.0)
    }
}

/// The unit of atomicity: every change applies or none does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    #[serde(default)]
    id: BatchId,
    owner: OwnerId,
    changes: Vec<Change>,
}

impl Batch {
    pub fn new(owner: OwnerId) -> Self {
        Self {
            id: BatchId::new(),
            owner,
            changes: Vec::new(),
        }
    }

    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn into_changes(self) -> Vec<Change> {
        self.changes
    }

    pub fn push(&mut self, change: Change) -> &mut Self {
        self.changes.push(change);
        self
    }

    #[must_use]
    pub fn with(mut self, change: Change) -> Self {
        self.changes.push(change);
        self
    }

    #[must_use]
    pub fn create_context(self, path: ContextPath) -> Self {
        self.with(Change::CreateContext { path, upsert: false })
    }

    #[must_use]
    pub fn ensure_context(self, path: ContextPath) -> Self {
        self.with(Change::CreateContext { path, upsert: true })
    }

    #[must_use]
    pub fn destroy_context(self, path: ContextPath) -> Self {
        self.with(Change::DestroyContext { path })
    }

    #[must_use]
    pub fn add_endpoint(self, spec: EndpointSpec) -> Self {
        self.with(Change::AddEndpoint(spec))
    }

    #[must_use]
    pub fn remove_endpoint(self, id: EndpointId) -> Self {
        self.with(Change::RemoveEndpoint { id })
    }

    #[must_use]
    pub fn enable(self, id: EndpointId) -> Self {
        self.with(Change::EnableEndpoint { id })
    }

    #[must_use]
    pub fn disable(self, id: EndpointId) -> Self {
        self.with(Change::DisableEndpoint { id })
    }

    #[must_use]
    pub fn unregister_owner(self, owner: OwnerId) -> Self {
        self.with(Change::UnregisterOwner { owner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let owner = OwnerId::new("bundle-1").unwrap();
        let ctx = ContextPath::parse("/c1").unwrap();
        let id = EndpointId::new("s1").unwrap();
        let batch = Batch::new(owner)
            .create_context(ctx.clone())
            .add_endpoint(EndpointSpec::servlet(id.clone(), ctx.clone(), ["/x"]))
            .destroy_context(ctx);

        let kinds: Vec<_> = batch.changes().iter().map(|c| c.kind().to_string()).collect();
        assert_eq!(kinds, vec!["create", "add", "destroy"]);
    }

    #[test]
    fn test_decoded_batch_gets_fresh_id() {
        let a: Batch = serde_json::from_str(r#"{"owner": "o", "changes": []}"#).unwrap();
        let b: Batch = serde_json::from_str(r#"{"owner": "o", "changes": []}"#).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(a.is_empty());
    }
}
