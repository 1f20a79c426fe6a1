//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Context controller → backend call
//!     → retries.rs (deadline per attempt, retry on failure)
//!     → backoff.rs (jittered exponential delay between attempts)
//!     → Exhausted { attempts, last } once the policy gives up
//! ```
//!
//! # Design Decisions
//! - Every backend call has a deadline
//! - Retry limits come from `[provisioning]` in the config

pub mod backoff;
pub mod retries;

pub use retries::{retry, AttemptError, Exhausted, RetryPolicy};
