//! Admin API for registering owners and operators.
//!
//! # Routes
//! - `GET /admin/status`: snapshot version, halt state, per-context summary
//! - `GET /admin/snapshot`: the whole current snapshot as JSON
//! - `GET /admin/resolve?uri=`: resolution against the current snapshot
//! - `POST /admin/batches[?wait=true]`: submit a batch (200, 409, 422, 503)
//!
//! Every route requires `Authorization: Bearer <admin.api_key>`.

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::engine::Engine;
use crate::lifecycle::Shutdown;

#[derive(Clone)]
pub struct AdminState {
    pub engine: Engine,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(engine: Engine, api_key: &str) -> Router {
    let state = AdminState {
        engine,
        api_key: Arc::from(api_key),
    };
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/snapshot", get(get_snapshot))
        .route("/admin/resolve", get(get_resolve))
        .route("/admin/batches", post(post_batch))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the admin API until shutdown is triggered.
pub async fn run_admin(listener: TcpListener, router: Router, shutdown: Shutdown) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!(address = %addr, "admin API listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.signalled())
        .await
}
