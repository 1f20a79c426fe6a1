//! The authoritative snapshot pointer.
//!
//! Readers load the current `Arc<Snapshot>` without locking. Only the apply
//! loop publishes, so there is exactly one writer at a time.

use arc_swap::ArcSwap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::model::snapshot::Snapshot;
use crate::model::types::SnapshotId;

#[derive(Debug)]
pub struct ModelRegistry {
    current: ArcSwap<Snapshot>,
    halted: AtomicBool,
    halt_reason: Mutex<Option<String>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::with_snapshot(Snapshot::empty())
    }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            current: ArcSwap::from_pointee(snapshot),
            halted: AtomicBool::new(false),
            halt_reason: Mutex::new(None),
        }
    }

    /// The snapshot in force right now. Never blocks.
    pub fn current_snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn current_id(&self) -> SnapshotId {
        self.current.load().id
    }

    pub(crate) fn publish(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        self.current.store(Arc::clone(&snapshot));
        snapshot
    }

    /// Stop accepting writes after an invariant violation.
    ///
    /// The first reason wins; later calls keep the registry halted.
    pub fn halt(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.halt_reason.lock() {
            slot.get_or_insert_with(|| reason.into());
        }
        self.halted.store(true, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn halt_reason(&self) -> Option<String> {
        self.halt_reason.lock().ok().and_then(|slot| slot.clone())
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_readers_keep_their_snapshot() {
        let registry = ModelRegistry::new();
        let before = registry.current_snapshot();

        let mut next = (*before).clone();
        next.id = before.id.next();
        registry.publish(next);

        assert_eq!(before.id, SnapshotId(0));
        assert_eq!(registry.current_id(), SnapshotId(1));
    }

    #[test]
    fn test_halt_keeps_first_reason() {
        let registry = ModelRegistry::new();
        assert!(!registry.is_halted());
        registry.halt("first");
        registry.halt("second");
        assert!(registry.is_halted());
        assert_eq!(registry.halt_reason().as_deref(), Some("first"));
    }
}
