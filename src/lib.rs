//! Endpoint registration and routing engine.
//!
//! Owners register endpoints into path-rooted contexts through atomic
//! batches; every request path is resolved against an immutable snapshot of
//! the registration model using servlet-style mapping precedence.

pub mod admin;
pub mod apply;
pub mod backend;
pub mod change;
pub mod config;
pub mod controller;
pub mod engine;
pub mod events;
pub mod http;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod resilience;
pub mod routing;

pub use apply::{Receipt, Rejection, RejectionKind};
pub use change::{Batch, Change, EndpointSpec, UrlPattern};
pub use config::EngineConfig;
pub use engine::{Engine, EngineTasks, Routed};
pub use events::EngineEvent;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use model::{ContextPath, EndpointId, OwnerId, Snapshot, SnapshotId};
pub use routing::{MatchKind, Resolution};
