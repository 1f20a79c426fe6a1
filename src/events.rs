//! Structural-change events published by the engine.
//!
//! The core never logs commits itself. Every outcome is sent on a broadcast
//! channel; `observability::events` turns them into log lines and metrics,
//! and tests subscribe to assert on them.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::apply::RejectionKind;
use crate::change::{BatchId, Change};
use crate::model::{ContextPath, ContextState, OwnerId, SnapshotId};

/// Buffered events per subscriber before the slowest one starts lagging.
pub const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
    Committed {
        batch_id: BatchId,
        owner: OwnerId,
        changes: Vec<Change>,
        snapshot: SnapshotId,
    },
    /// The batch applied cleanly but changed nothing.
    Unchanged {
        batch_id: BatchId,
        owner: OwnerId,
        snapshot: SnapshotId,
    },
    Rejected {
        batch_id: BatchId,
        owner: OwnerId,
        kind: RejectionKind,
        reason: String,
    },
    ContextStateChanged {
        path: ContextPath,
        from: ContextState,
        to: ContextState,
        snapshot: SnapshotId,
    },
    ProvisioningFailed {
        batch_id: BatchId,
        context: ContextPath,
        attempts: u32,
        error: String,
    },
    Halted {
        reason: String,
    },
}

pub fn channel() -> broadcast::Sender<EngineEvent> {
    broadcast::channel(EVENT_CAPACITY).0
}

/// Send without caring whether anyone listens.
pub(crate) fn emit(tx: &broadcast::Sender<EngineEvent>, event: EngineEvent) {
    let _ = tx.send(event);
}
