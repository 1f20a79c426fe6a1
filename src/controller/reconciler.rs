//! Context controller task.
//!
//! # Responsibilities
//! - Turn a batch's structural deltas into one plan per touched context
//! - Call the backend with retries
//! - Record the resulting lifecycle step through the apply loop
//!
//! # State Transitions
//! ```text
//! created            → provision → ACTIVE     (failure: DESTROYED)
//! created + drained  →             DESTROYED  (backend never saw it)
//! drained            → deprovision → DESTROYED (failure is reported)
//! endpoints changed  → provision delta         (failure is reported)
//! context recreated  → step skipped, nothing recorded
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

use crate::apply::{ApplierHandle, StructuralDelta, TransitionError};
use crate::backend::{ContextDelta, ProvisioningBackend};
use crate::change::BatchId;
use crate::controller::status::{ProvisioningFailure, ProvisioningStatus};
use crate::controller::ReconcileTask;
use crate::events::{emit, EngineEvent};
use crate::model::{ContextModel, ContextPath, ContextState, EndpointId, ModelRegistry, Snapshot};
use crate::resilience::{retry, RetryPolicy};

/// What the controller does for one context.
#[derive(Debug)]
pub(crate) enum Plan {
    Provision(ContextDelta),
    Abandon(Arc<ContextModel>),
    Retire(Arc<ContextModel>),
}

#[derive(Default)]
struct Touched {
    created: bool,
    draining: bool,
    added: Vec<EndpointId>,
    removed: Vec<EndpointId>,
}

/// Group deltas by context against the snapshot they were committed in.
pub(crate) fn plan(snapshot: &Snapshot, deltas: &[StructuralDelta]) -> Vec<Plan> {
    let mut touched: BTreeMap<&ContextPath, Touched> = BTreeMap::new();
    for delta in deltas {
        let entry = touched.entry(delta.context()).or_default();
        match delta {
            StructuralDelta::ContextCreated { .. } => entry.created = true,
            StructuralDelta::ContextDraining { .. } => entry.draining = true,
            StructuralDelta::EndpointAdded { id, .. } => entry.added.push(id.clone()),
            StructuralDelta::EndpointRemoved { id, .. } => entry.removed.push(id.clone()),
            StructuralDelta::ContextDestroyed { .. } => {}
        }
    }

    let mut plans = Vec::new();
    for (path, t) in touched {
        let Some(context) = snapshot.context(path) else {
            continue;
        };
        if t.created && t.draining {
            plans.push(Plan::Abandon(Arc::clone(context)));
            continue;
        }
        if t.draining {
            plans.push(Plan::Retire(Arc::clone(context)));
            continue;
        }

        let added = t
            .added
            .iter()
            .filter_map(|id| snapshot.endpoint(id))
            .map(Arc::clone)
            .collect();
        // Added and removed within the same batch: the backend never saw it.
        let removed = t
            .removed
            .into_iter()
            .filter(|id| !t.added.contains(id))
            .collect();
        let delta = ContextDelta {
            context: Arc::clone(context),
            initial: t.created,
            added,
            removed,
        };
        if !delta.is_empty() {
            plans.push(Plan::Provision(delta));
        }
    }
    plans
}

pub struct ContextController {
    backend: Arc<dyn ProvisioningBackend>,
    applier: ApplierHandle,
    registry: Arc<ModelRegistry>,
    events: broadcast::Sender<EngineEvent>,
    policy: RetryPolicy,
    rx: mpsc::UnboundedReceiver<ReconcileTask>,
}

impl ContextController {
    pub fn new(
        backend: Arc<dyn ProvisioningBackend>,
        applier: ApplierHandle,
        registry: Arc<ModelRegistry>,
        events: broadcast::Sender<EngineEvent>,
        policy: RetryPolicy,
        rx: mpsc::UnboundedReceiver<ReconcileTask>,
    ) -> Self {
        Self {
            backend,
            applier,
            registry,
            events,
            policy,
            rx,
        }
    }

    /// Reconcile batches in commit order until shutdown.
    ///
    /// Tasks left in the queue are dropped; their receipts report that the
    /// controller stopped.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!("context controller started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                task = self.rx.recv() => match task {
                    Some(task) => self.reconcile(task).await,
                    None => break,
                },
            }
        }
        tracing::debug!("context controller stopped");
    }

    async fn reconcile(&self, task: ReconcileTask) {
        let mut failures = Vec::new();
        for plan in plan(&task.snapshot, &task.deltas) {
            if let Err(failure) = self.execute(task.batch_id, plan).await {
                failures.push(failure);
            }
        }

        let status = if failures.is_empty() {
            ProvisioningStatus::Succeeded
        } else {
            ProvisioningStatus::Failed(failures)
        };
        task.status.send_replace(status);
    }

    async fn execute(&self, batch_id: BatchId, plan: Plan) -> Result<(), ProvisioningFailure> {
        match plan {
            Plan::Provision(delta) => self.provision(batch_id, delta).await,
            Plan::Abandon(context) => {
                self.record(&context, ContextState::Destroyed).await;
                Ok(())
            }
            Plan::Retire(context) => {
                if !self.is_current(&context) {
                    tracing::debug!(context = %context.path, "context is gone or replaced, skipping deprovision");
                    return Ok(());
                }
                let outcome = retry(&self.policy, |_| self.backend.deprovision(&context)).await;
                self.record(&context, ContextState::Destroyed).await;
                outcome.map_err(|e| self.fail(batch_id, &context.path, e.attempts, e.last.to_string()))
            }
        }
    }

    async fn provision(&self, batch_id: BatchId, delta: ContextDelta) -> Result<(), ProvisioningFailure> {
        let path = delta.path().clone();
        if !delta.initial && !self.is_current(&delta.context) {
            tracing::debug!(context = %path, "context is gone or replaced, skipping endpoint update");
            return Ok(());
        }

        match retry(&self.policy, |_| self.backend.provision(&delta)).await {
            Ok(()) => {
                if delta.initial {
                    self.record(&delta.context, ContextState::Active).await;
                }
                Ok(())
            }
            Err(e) => {
                if delta.initial {
                    if let Err(cleanup) = self.backend.deprovision(&delta.context).await {
                        tracing::debug!(context = %path, error = %cleanup, "cleanup after failed provisioning failed");
                    }
                    self.record(&delta.context, ContextState::Destroyed).await;
                }
                Err(self.fail(batch_id, &path, e.attempts, e.last.to_string()))
            }
        }
    }

    fn fail(&self, batch_id: BatchId, context: &ContextPath, attempts: u32, error: String) -> ProvisioningFailure {
        tracing::warn!(batch = %batch_id, context = %context, attempts, error = %error, "backend reconciliation failed");
        emit(
            &self.events,
            EngineEvent::ProvisioningFailed {
                batch_id,
                context: context.clone(),
                attempts,
                error: error.clone(),
            },
        );
        ProvisioningFailure {
            context: context.clone(),
            attempts,
            error,
        }
    }

    /// Whether the model still holds the same context this plan was made for.
    fn is_current(&self, context: &ContextModel) -> bool {
        self.registry
            .current_snapshot()
            .context(&context.path)
            .is_some_and(|current| current.incarnation == context.incarnation)
    }

    async fn record(&self, context: &ContextModel, to: ContextState) {
        let path = &context.path;
        match self.applier.transition(path.clone(), context.incarnation, to).await {
            Ok(_) => {}
            Err(e @ TransitionError::Halted(_)) => {
                tracing::warn!(context = %path, to = %to, error = %e, "lifecycle step dropped");
            }
            Err(e) => {
                // A later batch already moved the context on.
                tracing::debug!(context = %path, to = %to, error = %e, "lifecycle step skipped");
            }
        }
    }
}
