//! Structured logging.
//!
//! # Responsibilities
//! - Install the global `tracing` subscriber once at startup
//! - Take the level from config, let `RUST_LOG` override it
//!
//! # Design Decisions
//! - Human-readable `fmt` output; fields stay structured for aggregation
//! - Library code only emits events; binaries decide where they go

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init(log_level: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(directives(log_level)))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()?;
    Ok(())
}

/// Filter directives for a bare level: the level for this crate, the HTTP
/// trace layer included.
fn directives(log_level: &str) -> String {
    if log_level.contains('=') || log_level.contains(',') {
        return log_level.to_string();
    }
    format!("endpoint_router={level},registry_cli={level},tower_http={level}", level = log_level)
}
