//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, every issue reported)
//!     → EngineConfig (validated, immutable)
//!     → registrations.rs: static contexts/endpoints → one Batch
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads and validates
//!     → registrations.rs plans the diff against the last applied config
//!     → Engine::submit (whole reload commits or none of it)
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Listener addresses and provisioning settings are read once at startup;
//!   only registrations follow reloads
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod registrations;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::EngineConfig;
pub use validation::{validate_config, ConfigIssue};
