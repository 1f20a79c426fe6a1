//! Single-writer apply loop.
//!
//! Every write to the model (batches from owners, lifecycle steps from the
//! context controller) is a command on one mpsc queue, handled to completion
//! before the next is read. Readers are never involved: they keep loading
//! whatever snapshot the registry currently points at.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::apply::builder::{apply, RegistryBuilder};
use crate::apply::error::{Rejection, TransitionError};
use crate::change::{Batch, BatchId};
use crate::controller::{ProvisioningStatus, ReconcileError, ReconcileTask};
use crate::events::{emit, EngineEvent};
use crate::model::{ContextPath, ContextState, ModelRegistry, Snapshot, SnapshotId};

/// Queued commands before `enqueue` starts waiting for room.
pub const QUEUE_DEPTH: usize = 256;

const QUEUED: u8 = 0;
const PICKED: u8 = 1;
const CANCELLED: u8 = 2;

#[derive(Debug)]
struct Ticket(AtomicU8);

impl Ticket {
    fn new() -> Arc<Self> {
        Arc::new(Self(AtomicU8::new(QUEUED)))
    }

    fn cancel(&self) -> bool {
        self.0
            .compare_exchange(QUEUED, CANCELLED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn pick(&self) -> bool {
        self.0
            .compare_exchange(QUEUED, PICKED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

enum Command {
    Submit {
        batch: Batch,
        ticket: Arc<Ticket>,
        reply: oneshot::Sender<Result<Receipt, Rejection>>,
    },
    Transition {
        path: ContextPath,
        incarnation: SnapshotId,
        to: ContextState,
        reply: oneshot::Sender<Result<SnapshotId, TransitionError>>,
    },
}

/// Result of a committed (or no-op) batch.
#[derive(Debug)]
pub struct Receipt {
    pub batch_id: BatchId,
    /// Snapshot in force after the batch. Equal to the previous one when the
    /// batch changed nothing.
    pub snapshot_id: SnapshotId,
    pub changed: bool,
    provisioning: watch::Receiver<ProvisioningStatus>,
}

impl Receipt {
    fn settled(batch_id: BatchId, snapshot_id: SnapshotId) -> Self {
        let (_, provisioning) = watch::channel(ProvisioningStatus::NotRequired);
        Self {
            batch_id,
            snapshot_id,
            changed: false,
            provisioning,
        }
    }

    /// Current backend reconciliation status, without waiting.
    pub fn provisioning_status(&self) -> ProvisioningStatus {
        self.provisioning.borrow().clone()
    }

    /// Wait until the context controller has reconciled this batch.
    pub async fn provisioned(&mut self) -> Result<(), ReconcileError> {
        let status = self
            .provisioning
            .wait_for(ProvisioningStatus::is_settled)
            .await
            .map_err(|_| ReconcileError::ControllerStopped)?
            .clone();
        match status {
            ProvisioningStatus::Failed(failures) => Err(ReconcileError::Failed(failures)),
            _ => Ok(()),
        }
    }
}

/// A batch waiting in the queue.
#[derive(Debug)]
pub struct PendingBatch {
    id: BatchId,
    ticket: Arc<Ticket>,
    reply: oneshot::Receiver<Result<Receipt, Rejection>>,
}

impl PendingBatch {
    pub fn id(&self) -> BatchId {
        self.id
    }

    /// Withdraw the batch. Returns `false` once the apply loop has picked it
    /// up; from then on the outcome is whatever the loop decides.
    pub fn cancel(&self) -> bool {
        self.ticket.cancel()
    }

    pub async fn outcome(self) -> Result<Receipt, Rejection> {
        self.reply
            .await
            .unwrap_or_else(|_| Err(Rejection::Halted("apply loop stopped".into())))
    }
}

/// Cheap, cloneable entry point into the apply loop.
#[derive(Debug, Clone)]
pub struct ApplierHandle {
    tx: mpsc::Sender<Command>,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Submit { batch, .. } => write!(f, "Submit({})", batch.id()),
            Command::Transition { path, incarnation, to, .. } => {
                write!(f, "Transition({}@{} -> {})", path, incarnation, to)
            }
        }
    }
}

impl ApplierHandle {
    /// Queue a batch and return immediately.
    pub async fn enqueue(&self, batch: Batch) -> PendingBatch {
        let (reply_tx, reply) = oneshot::channel();
        let ticket = Ticket::new();
        let id = batch.id();
        // A closed queue drops `reply_tx`, which `outcome` reports as halted.
        let _ = self
            .tx
            .send(Command::Submit {
                batch,
                ticket: Arc::clone(&ticket),
                reply: reply_tx,
            })
            .await;
        PendingBatch { id, ticket, reply }
    }

    /// Queue a batch and wait for the model commit (not for provisioning).
    pub async fn submit(&self, batch: Batch) -> Result<Receipt, Rejection> {
        self.enqueue(batch).await.outcome().await
    }

    /// Record a lifecycle step for the context created in `incarnation`.
    pub async fn transition(
        &self,
        path: ContextPath,
        incarnation: SnapshotId,
        to: ContextState,
    ) -> Result<SnapshotId, TransitionError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Transition {
                path,
                incarnation,
                to,
                reply,
            })
            .await
            .map_err(|_| TransitionError::Halted("apply loop stopped".into()))?;
        rx.await
            .unwrap_or_else(|_| Err(TransitionError::Halted("apply loop stopped".into())))
    }
}

pub struct ApplyLoop {
    registry: Arc<ModelRegistry>,
    rx: mpsc::Receiver<Command>,
    events: broadcast::Sender<EngineEvent>,
    reconcile: mpsc::UnboundedSender<ReconcileTask>,
}

impl ApplyLoop {
    pub fn new(
        registry: Arc<ModelRegistry>,
        events: broadcast::Sender<EngineEvent>,
        reconcile: mpsc::UnboundedSender<ReconcileTask>,
    ) -> (Self, ApplierHandle) {
        let (tx, rx) = mpsc::channel(QUEUE_DEPTH);
        let apply_loop = Self {
            registry,
            rx,
            events,
            reconcile,
        };
        (apply_loop, ApplierHandle { tx })
    }

    /// Handle commands until shutdown or until every handle is dropped.
    ///
    /// Batches still queued at shutdown are rejected as halted.
    pub async fn run(mut self, mut shutdown: broadcast::Receiver<()>) {
        tracing::debug!("apply loop started");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.recv() => break,
                cmd = self.rx.recv() => match cmd {
                    Some(cmd) => self.handle(cmd),
                    None => break,
                },
            }
        }

        self.rx.close();
        while let Ok(cmd) = self.rx.try_recv() {
            match cmd {
                Command::Submit { reply, .. } => {
                    let _ = reply.send(Err(Rejection::Halted("engine is shutting down".into())));
                }
                Command::Transition { reply, .. } => {
                    let _ = reply.send(Err(TransitionError::Halted("engine is shutting down".into())));
                }
            }
        }
        tracing::debug!("apply loop stopped");
    }

    fn handle(&self, cmd: Command) {
        match cmd {
            Command::Submit { batch, ticket, reply } => {
                let outcome = if ticket.pick() {
                    self.commit(&batch)
                } else {
                    Err(Rejection::Cancelled)
                };
                self.report(&batch, &outcome);
                let _ = reply.send(outcome);
            }
            Command::Transition {
                path,
                incarnation,
                to,
                reply,
            } => {
                let outcome = self.transition(&path, incarnation, to);
                if let Err(e) = &outcome {
                    tracing::debug!(context = %path, to = %to, error = %e, "transition not recorded");
                }
                let _ = reply.send(outcome);
            }
        }
    }

    fn halted(&self) -> Option<String> {
        self.registry
            .is_halted()
            .then(|| self.registry.halt_reason().unwrap_or_default())
    }

    /// Check the candidate and make it current. A candidate that fails
    /// verification halts the registry instead of being published.
    fn publish(&self, candidate: Snapshot) -> Result<Arc<Snapshot>, String> {
        if let Err(e) = candidate.verify() {
            let reason = e.to_string();
            tracing::error!(error = %reason, "refusing to publish corrupted snapshot");
            self.registry.halt(reason.clone());
            emit(&self.events, EngineEvent::Halted { reason: reason.clone() });
            return Err(reason);
        }
        Ok(self.registry.publish(candidate))
    }

    fn commit(&self, batch: &Batch) -> Result<Receipt, Rejection> {
        if let Some(reason) = self.halted() {
            return Err(Rejection::Halted(reason));
        }

        let base = self.registry.current_snapshot();
        let mut builder = RegistryBuilder::new(&base);
        for (index, change) in batch.changes().iter().enumerate() {
            apply(batch.owner(), change, &mut builder).map_err(|e| e.at(index, change.kind()))?;
        }

        let Some(built) = builder.finish() else {
            return Ok(Receipt::settled(batch.id(), base.id));
        };
        let snapshot = self.publish(built.snapshot).map_err(Rejection::Halted)?;

        let (status, provisioning) = if built.deltas.is_empty() {
            watch::channel(ProvisioningStatus::NotRequired)
        } else {
            watch::channel(ProvisioningStatus::Pending)
        };
        if !built.deltas.is_empty() {
            let task = ReconcileTask {
                batch_id: batch.id(),
                snapshot: Arc::clone(&snapshot),
                deltas: built.deltas,
                status,
            };
            if self.reconcile.send(task).is_err() {
                tracing::warn!(batch = %batch.id(), "context controller is gone, backend will not be reconciled");
            }
        }

        Ok(Receipt {
            batch_id: batch.id(),
            snapshot_id: snapshot.id,
            changed: true,
            provisioning,
        })
    }

    fn transition(
        &self,
        path: &ContextPath,
        incarnation: SnapshotId,
        to: ContextState,
    ) -> Result<SnapshotId, TransitionError> {
        if let Some(reason) = self.halted() {
            return Err(TransitionError::Halted(reason));
        }

        let base = self.registry.current_snapshot();
        let mut builder = RegistryBuilder::new(&base);
        let from = builder.transition(path, incarnation, to)?;
        let Some(built) = builder.finish() else {
            return Ok(base.id);
        };
        let snapshot = self.publish(built.snapshot).map_err(TransitionError::Halted)?;

        tracing::debug!(context = %path, from = %from, to = %to, snapshot = %snapshot.id, "context state changed");
        emit(
            &self.events,
            EngineEvent::ContextStateChanged {
                path: path.clone(),
                from,
                to,
                snapshot: snapshot.id,
            },
        );
        Ok(snapshot.id)
    }

    fn report(&self, batch: &Batch, outcome: &Result<Receipt, Rejection>) {
        let event = match outcome {
            Ok(receipt) if receipt.changed => EngineEvent::Committed {
                batch_id: batch.id(),
                owner: batch.owner().clone(),
                changes: batch.changes().to_vec(),
                snapshot: receipt.snapshot_id,
            },
            Ok(receipt) => EngineEvent::Unchanged {
                batch_id: batch.id(),
                owner: batch.owner().clone(),
                snapshot: receipt.snapshot_id,
            },
            Err(rejection) => EngineEvent::Rejected {
                batch_id: batch.id(),
                owner: batch.owner().clone(),
                kind: rejection.kind(),
                reason: rejection.to_string(),
            },
        };
        emit(&self.events, event);
    }
}
