//! Registration model subsystem.
//!
//! # Data Flow
//! ```text
//! Apply loop (single writer)
//!     → builds next Snapshot from the current one
//!     → registry.rs publishes it (atomic pointer swap)
//!
//! Request path (many readers)
//!     → registry.current_snapshot()
//!     → resolve against that Arc<Snapshot> for the whole request
//! ```
//!
//! # Design Decisions
//! - Flat maps keyed by context path, endpoint id and owner id; no back-pointers
//! - Owners index the contexts and endpoints they touched; they do not own them
//! - Snapshots are immutable; a new version is published per committed batch
//! - An invariant violation halts writes instead of serving a broken model

pub mod entities;
pub mod registry;
pub mod snapshot;
pub mod types;

pub use entities::{ContextModel, EndpointModel, ServiceModel};
pub use registry::ModelRegistry;
pub use snapshot::{CorruptionError, Snapshot};
pub use types::{ContextPath, ContextState, EndpointId, EndpointKind, IdentError, OwnerId, SnapshotId};
