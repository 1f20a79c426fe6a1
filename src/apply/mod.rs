//! Batch Applier subsystem.
//!
//! # Data Flow
//! ```text
//! ApplierHandle::submit(batch)
//!     → mpsc queue (cancellable until picked)
//!     → ApplyLoop: RegistryBuilder over the current snapshot
//!         → apply(change) for each change, in order
//!         → first failure: drop the builder, reply Rejection
//!     → finish(): recompile touched mapping tables
//!     → verify → ModelRegistry::publish
//!     → EngineEvent::Committed + ReconcileTask to the context controller
//! ```
//!
//! # Design Decisions
//! - One task owns all writes; there is no lock around the model
//! - Provisioning is a second phase: `submit` returns after the model commit
//!   and the receipt lets the caller wait for the backend
//! - A batch that changes nothing publishes nothing
//! - Verification failure halts every later write

pub mod applier;
pub mod builder;
pub mod error;

pub use applier::{ApplierHandle, ApplyLoop, PendingBatch, Receipt};
pub use builder::{RegistryBuilder, StructuralDelta};
pub use error::{ConflictError, Rejection, RejectionKind, TransitionError, ValidationError};
