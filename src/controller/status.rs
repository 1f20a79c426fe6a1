//! Outcome of backend reconciliation for one batch.

use serde::Serialize;
use thiserror::Error;

use crate::model::ContextPath;

/// A context the backend could not be brought in line with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningFailure {
    pub context: ContextPath,
    pub attempts: u32,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "failures", rename_all = "snake_case")]
pub enum ProvisioningStatus {
    /// Waiting for the context controller.
    Pending,
    /// The batch touched nothing the backend cares about.
    NotRequired,
    Succeeded,
    Failed(Vec<ProvisioningFailure>),
}

impl ProvisioningStatus {
    pub fn is_settled(&self) -> bool {
        !matches!(self, ProvisioningStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    #[error("provisioning failed for {} context(s)", .0.len())]
    Failed(Vec<ProvisioningFailure>),

    #[error("context controller stopped before reconciling the batch")]
    ControllerStopped,
}
