//! Mapping Resolver subsystem.
//!
//! # Data Flow
//! ```text
//! Batch commit:
//!     enabled endpoints of a touched context
//!     → table.rs (shadowing: one winner per pattern, filter chain order)
//!     → MappingTable frozen inside the ContextModel of the new snapshot
//!
//! Request:
//!     Arc<Snapshot> loaded once
//!     → resolver.rs (context selection, precedence walk)
//!     → filters.rs (matching filters in chain order)
//!     → Resolution { endpoint, servlet_path, path_info, match_kind } or None
//! ```
//!
//! # Design Decisions
//! - Resolution never takes a lock and never mutates anything
//! - No regex; prefix lookup walks the path's own segments
//! - Only ACTIVE contexts resolve
//! - A mapping to a missing endpoint is reported as corruption, not as a miss

pub mod filters;
pub mod resolver;
pub mod table;

pub use filters::resolve_filters;
pub use resolver::{resolve, resolve_uri, MatchKind, Resolution};
pub use table::{FilterEntry, MappingTable};
