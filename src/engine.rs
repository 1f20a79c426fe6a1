//! Engine facade.
//!
//! # Data Flow
//! ```text
//! Engine::submit(batch) → ApplyLoop → ModelRegistry::publish
//!                                   → ContextController → ProvisioningBackend
//! Engine::resolve_uri(uri) → ModelRegistry::current_snapshot → routing
//! Engine::subscribe() → EngineEvent stream
//! ```
//!
//! `Engine` is cheap to clone; every clone talks to the same apply loop and
//! reads the same registry.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::apply::{ApplierHandle, ApplyLoop, PendingBatch, Receipt, Rejection};
use crate::backend::ProvisioningBackend;
use crate::change::Batch;
use crate::controller::ContextController;
use crate::events::{self, emit, EngineEvent};
use crate::lifecycle::Shutdown;
use crate::model::{ContextPath, CorruptionError, EndpointId, ModelRegistry, Snapshot};
use crate::resilience::RetryPolicy;
use crate::routing::{self, Resolution};

/// A resolution and the filter chain wrapping it, taken from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Routed {
    #[serde(flatten)]
    pub resolution: Resolution,
    pub filters: Vec<EndpointId>,
}

#[derive(Debug, Clone)]
pub struct Engine {
    registry: Arc<ModelRegistry>,
    applier: ApplierHandle,
    events: broadcast::Sender<EngineEvent>,
}

/// Background tasks owned by a running engine.
#[derive(Debug)]
pub struct EngineTasks {
    apply_loop: JoinHandle<()>,
    controller: JoinHandle<()>,
}

impl EngineTasks {
    /// Wait for both tasks to stop after shutdown was triggered.
    pub async fn join(self) {
        if let Err(e) = self.apply_loop.await {
            tracing::error!(error = %e, "apply loop panicked");
        }
        if let Err(e) = self.controller.await {
            tracing::error!(error = %e, "context controller panicked");
        }
    }
}

impl Engine {
    /// Spawn the apply loop and the context controller.
    pub fn start(backend: Arc<dyn ProvisioningBackend>, policy: RetryPolicy, shutdown: &Shutdown) -> (Self, EngineTasks) {
        let registry = Arc::new(ModelRegistry::new());
        let events = events::channel();
        let (reconcile_tx, reconcile_rx) = mpsc::unbounded_channel();

        let (apply_loop, applier) = ApplyLoop::new(Arc::clone(&registry), events.clone(), reconcile_tx);
        let controller = ContextController::new(
            backend,
            applier.clone(),
            Arc::clone(&registry),
            events.clone(),
            policy,
            reconcile_rx,
        );

        let tasks = EngineTasks {
            apply_loop: tokio::spawn(apply_loop.run(shutdown.subscribe())),
            controller: tokio::spawn(controller.run(shutdown.subscribe())),
        };
        tracing::info!(max_attempts = policy.max_attempts, "routing engine started");

        (
            Self {
                registry,
                applier,
                events,
            },
            tasks,
        )
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.registry.current_snapshot()
    }

    pub fn is_halted(&self) -> bool {
        self.registry.is_halted()
    }

    /// Resolve a path relative to a known context against the current
    /// snapshot.
    pub fn resolve(&self, context: &ContextPath, path: &str) -> Result<Option<Resolution>, CorruptionError> {
        let snapshot = self.snapshot();
        routing::resolve(&snapshot, context, path).map_err(|e| self.corrupted(e))
    }

    /// Resolve a full request URI against the current snapshot.
    pub fn resolve_uri(&self, uri: &str) -> Result<Option<Resolution>, CorruptionError> {
        let snapshot = self.snapshot();
        routing::resolve_uri(&snapshot, uri).map_err(|e| self.corrupted(e))
    }

    /// Resolve a request URI and collect its filter chain.
    pub fn route(&self, uri: &str) -> Result<Option<Routed>, CorruptionError> {
        let snapshot = self.snapshot();
        let Some(resolution) = routing::resolve_uri(&snapshot, uri).map_err(|e| self.corrupted(e))? else {
            return Ok(None);
        };
        let relative = format!("{}{}", resolution.servlet_path, resolution.path_info.as_deref().unwrap_or(""));
        let filters = routing::resolve_filters(&snapshot, &resolution.context_path, &relative);
        Ok(Some(Routed { resolution, filters }))
    }

    pub fn filters(&self, context: &ContextPath, path: &str) -> Vec<EndpointId> {
        routing::resolve_filters(&self.snapshot(), context, path)
    }

    /// Submit a batch and wait for the model commit.
    pub async fn submit(&self, batch: Batch) -> Result<Receipt, Rejection> {
        self.applier.submit(batch).await
    }

    /// Queue a batch; the returned handle can still cancel it.
    pub async fn enqueue(&self, batch: Batch) -> PendingBatch {
        self.applier.enqueue(batch).await
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn corrupted(&self, e: CorruptionError) -> CorruptionError {
        if !self.registry.is_halted() {
            tracing::error!(error = %e, "corrupted model found while resolving, halting writes");
            emit(&self.events, EngineEvent::Halted { reason: e.to_string() });
        }
        self.registry.halt(e.to_string());
        e
    }
}
