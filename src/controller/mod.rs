//! Context Controller subsystem.
//!
//! # Data Flow
//! ```text
//! ApplyLoop commits batch
//!     → ReconcileTask { snapshot, deltas, status } on an unbounded queue
//!     → ContextController (one task, commit order)
//!         → ProvisioningBackend::provision / deprovision, with retries
//!         → ApplierHandle::transition (CREATING → ACTIVE, … → DESTROYED)
//!     → status watch channel → Receipt::provisioned() on the caller side
//! ```
//!
//! # Design Decisions
//! - Backend work happens after the model commit and never rolls it back
//! - Lifecycle steps go through the apply loop like any other write
//! - Failures surface as events and receipt status, never as panics

pub mod reconciler;
pub mod status;

use std::sync::Arc;
use tokio::sync::watch;

use crate::apply::StructuralDelta;
use crate::change::BatchId;
use crate::model::Snapshot;

pub use reconciler::ContextController;
pub use status::{ProvisioningFailure, ProvisioningStatus, ReconcileError};

/// Backend work owed for one committed batch.
#[derive(Debug)]
pub struct ReconcileTask {
    pub batch_id: BatchId,
    /// The snapshot the batch produced.
    pub snapshot: Arc<Snapshot>,
    pub deltas: Vec<StructuralDelta>,
    pub status: watch::Sender<ProvisioningStatus>,
}
