//! Engine event logger.
//!
//! The engine core publishes events and never logs commits itself. This
//! task is the observability collaborator: one log line and the matching
//! metrics per event.

use tokio::sync::broadcast::{self, error::RecvError};

use crate::events::EngineEvent;
use crate::observability::metrics;

/// Log and count events until the channel closes or shutdown fires.
pub async fn run_event_logger(mut events: broadcast::Receiver<EngineEvent>, mut shutdown: broadcast::Receiver<()>) {
    loop {
        let event = tokio::select! {
            _ = shutdown.recv() => break,
            event = events.recv() => event,
        };
        match event {
            Ok(event) => record(&event),
            Err(RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event logger fell behind, events dropped");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn record(event: &EngineEvent) {
    match event {
        EngineEvent::Committed {
            batch_id,
            owner,
            changes,
            snapshot,
        } => {
            tracing::info!(batch = %batch_id, owner = %owner, changes = changes.len(), snapshot = %snapshot, "batch committed");
            for change in changes {
                tracing::debug!(batch = %batch_id, "{}", change);
            }
            metrics::record_commit(*snapshot);
        }
        EngineEvent::Unchanged { batch_id, owner, snapshot } => {
            tracing::info!(batch = %batch_id, owner = %owner, snapshot = %snapshot, "batch changed nothing");
        }
        EngineEvent::Rejected {
            batch_id,
            owner,
            kind,
            reason,
        } => {
            tracing::warn!(batch = %batch_id, owner = %owner, kind = kind.as_str(), reason = %reason, "batch rejected");
            metrics::record_rejection(*kind);
        }
        EngineEvent::ContextStateChanged { path, from, to, snapshot } => {
            tracing::info!(context = %path, from = %from, to = %to, snapshot = %snapshot, "context state changed");
            metrics::record_snapshot(*snapshot);
        }
        EngineEvent::ProvisioningFailed {
            batch_id,
            context,
            attempts,
            error,
        } => {
            tracing::error!(batch = %batch_id, context = %context, attempts, error = %error, "provisioning failed");
            metrics::record_provisioning_failure();
        }
        EngineEvent::Halted { reason } => {
            tracing::error!(reason = %reason, "registry halted, writes are refused");
        }
    }
}
