//! Provisioning collaborator boundary.
//!
//! The engine never runs application code. Once a batch commits, the context
//! controller hands each touched context to a [`ProvisioningBackend`] that
//! realizes it in whatever container actually serves requests.

pub mod local;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::model::{ContextModel, ContextPath, EndpointId, EndpointModel};

pub use local::LocalBackend;

/// What changed in one context as the result of a single batch.
#[derive(Debug, Clone)]
pub struct ContextDelta {
    /// The context as committed.
    pub context: Arc<ContextModel>,
    /// Set when the batch created the context.
    pub initial: bool,
    pub added: Vec<Arc<EndpointModel>>,
    pub removed: Vec<EndpointId>,
}

impl ContextDelta {
    pub fn path(&self) -> &ContextPath {
        &self.context.path
    }

    pub fn is_empty(&self) -> bool {
        !self.initial && self.added.is_empty() && self.removed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("backend rejected context {context}: {reason}")]
    Rejected { context: ContextPath, reason: String },

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// Realizes committed model changes in the serving container.
#[async_trait]
pub trait ProvisioningBackend: Send + Sync {
    async fn provision(&self, delta: &ContextDelta) -> Result<(), BackendError>;
    async fn deprovision(&self, context: &ContextModel) -> Result<(), BackendError>;
}
