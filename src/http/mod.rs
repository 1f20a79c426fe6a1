//! HTTP resolution front.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request id set / propagated)
//!     → Engine::route(uri): context selection, precedence, filter chain
//!     → response.rs (200 resolution JSON | 404 | 503)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::HttpServer;
