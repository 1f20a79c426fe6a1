//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Logging/metrics → Engine → static
//!     registrations → watcher → listeners
//!
//! Shutdown (shutdown.rs):
//!     Signal received → listeners stop accepting → apply loop rejects
//!     queued batches → controller drops pending reconciliation → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One broadcast channel for every task
//! - Committed batches are never undone at shutdown

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
