//! In-process backend that records what is deployed.
//!
//! Used by the server binary, where resolution results are reported over
//! HTTP rather than dispatched into a container, and by tests.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;

use super::{BackendError, ContextDelta, ProvisioningBackend};
use crate::model::{ContextModel, ContextPath, EndpointId};

#[derive(Debug, Default)]
pub struct LocalBackend {
    deployed: DashMap<ContextPath, BTreeSet<EndpointId>>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_deployed(&self, context: &ContextPath) -> bool {
        self.deployed.contains_key(context)
    }

    pub fn deployed_endpoints(&self, context: &ContextPath) -> Option<BTreeSet<EndpointId>> {
        self.deployed.get(context).map(|entry| entry.value().clone())
    }

    pub fn deployed_contexts(&self) -> usize {
        self.deployed.len()
    }
}

#[async_trait]
impl ProvisioningBackend for LocalBackend {
    async fn provision(&self, delta: &ContextDelta) -> Result<(), BackendError> {
        let path = delta.path().clone();
        if delta.initial {
            self.deployed.entry(path.clone()).or_default();
        }
        let Some(mut endpoints) = self.deployed.get_mut(&path) else {
            return Err(BackendError::Rejected {
                context: path,
                reason: "context is not deployed".into(),
            });
        };
        for id in &delta.removed {
            endpoints.remove(id);
        }
        endpoints.extend(delta.added.iter().map(|ep| ep.id.clone()));
        tracing::debug!(context = %path, endpoints = endpoints.len(), "context provisioned");
        Ok(())
    }

    async fn deprovision(&self, context: &ContextModel) -> Result<(), BackendError> {
        self.deployed.remove(&context.path);
        tracing::debug!(context = %context.path, "context deprovisioned");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OwnerId, SnapshotId};
    use std::sync::Arc;

    fn delta(initial: bool) -> ContextDelta {
        let path = ContextPath::parse("/c1").unwrap();
        ContextDelta {
            context: Arc::new(ContextModel::new(path, OwnerId::new("a").unwrap(), SnapshotId(1))),
            initial,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_update_before_create_is_rejected() {
        let backend = LocalBackend::new();
        assert!(matches!(backend.provision(&delta(false)).await, Err(BackendError::Rejected { .. })));

        backend.provision(&delta(true)).await.unwrap();
        backend.provision(&delta(false)).await.unwrap();
        assert!(backend.is_deployed(&ContextPath::parse("/c1").unwrap()));

        backend.deprovision(&delta(false).context).await.unwrap();
        assert_eq!(backend.deployed_contexts(), 0);
    }
}
