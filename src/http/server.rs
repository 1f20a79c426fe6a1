//! HTTP resolution front.
//!
//! # Responsibilities
//! - Create the Axum router that answers every path
//! - Wire up middleware (request id, timeout, tracing)
//! - Resolve each request URI against the current snapshot
//! - Report the decision as JSON
//!
//! Requests are never dispatched to application code from here; the body
//! tells the caller which endpoint would serve the request and how its path
//! splits.

use axum::{
    extract::{Request, State},
    response::Response,
    routing::any,
    Router,
};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::ServerConfig;
use crate::engine::Engine;
use crate::http::request::{propagate_request_id, request_id, set_request_id};
use crate::http::response;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
}

pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(engine: Engine, config: &ServerConfig) -> Self {
        let state = AppState { engine };
        Self {
            router: Self::build_router(config, state),
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(resolve_handler))
            .route("/", any(resolve_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.request_timeout_secs)))
            .layer(propagate_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id())
    }

    /// The router, for embedding or in-process tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until shutdown is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "resolution front listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown.signalled())
            .await?;

        tracing::info!("resolution front stopped");
        Ok(())
    }
}

async fn resolve_handler(State(state): State<AppState>, request: Request) -> Response {
    let started = Instant::now();
    let path = request.uri().path();
    let request_id = request_id(request.headers());

    match state.engine.route(path) {
        Ok(Some(routed)) => {
            tracing::debug!(
                request_id = %request_id,
                path = %path,
                endpoint = %routed.resolution.endpoint,
                match_kind = %routed.resolution.match_kind,
                "request resolved"
            );
            metrics::record_resolution(Some(routed.resolution.match_kind), started);
            response::resolved(routed)
        }
        Ok(None) => {
            tracing::debug!(request_id = %request_id, path = %path, "no endpoint matched");
            metrics::record_resolution(None, started);
            response::not_found(path, state.engine.registry().current_id())
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, path = %path, error = %e, "resolution failed");
            response::unavailable(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::StatusCode;
    use std::sync::Arc;
    use tower::ServiceExt;

    use crate::backend::LocalBackend;
    use crate::change::{Batch, EndpointSpec};
    use crate::model::{ContextPath, EndpointId, OwnerId};
    use crate::resilience::RetryPolicy;

    async fn call(router: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let request = axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_context_root_and_miss() {
        let shutdown = Shutdown::new();
        let (engine, tasks) = Engine::start(Arc::new(LocalBackend::new()), RetryPolicy::once(), &shutdown);
        let app = ContextPath::parse("/app").unwrap();
        let mut receipt = engine
            .submit(
                Batch::new(OwnerId::new("a").unwrap())
                    .create_context(app.clone())
                    .add_endpoint(EndpointSpec::servlet(EndpointId::new("welcome").unwrap(), app, [""])),
            )
            .await
            .unwrap();
        receipt.provisioned().await.unwrap();

        let router = HttpServer::new(engine, &ServerConfig::default()).router();

        let (status, body) = call(router.clone(), "/app/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["match_kind"], "CONTEXT_ROOT");
        assert_eq!(body["servlet_path"], "");
        assert_eq!(body["path_info"], "/");

        let (status, body) = call(router, "/app").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["uri"], "/app");

        shutdown.trigger();
        tasks.join().await;
    }
}
