//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Engine core:
//!     → EngineEvent broadcast (events.rs in the crate root)
//!     → events.rs here: log line + metrics per event
//!
//! HTTP front:
//!     → TraceLayer spans with request ids
//!     → metrics.rs (resolution counters, latency)
//!
//! Consumers:
//!     → stdout (logging.rs)
//!     → Prometheus scrape endpoint (metrics.rs)
//! ```
//!
//! # Design Decisions
//! - Model, change and routing code emit nothing; they are pure
//! - Metrics are cheap (atomic increments) and optional

pub mod events;
pub mod logging;
pub mod metrics;
