//! Filter chain lookup.

use crate::model::{ContextPath, EndpointId, Snapshot};

/// Filters that apply to `path` in `context`, in chain order.
///
/// The chain is empty for unknown or non-ACTIVE contexts. Order is fixed at
/// commit time: higher priority first, then earlier registration.
pub fn resolve_filters(snapshot: &Snapshot, context: &ContextPath, path: &str) -> Vec<EndpointId> {
    let Some(ctx) = snapshot.context(context) else {
        return Vec::new();
    };
    if !ctx.is_active() {
        return Vec::new();
    }
    ctx.mappings
        .filters()
        .iter()
        .filter(|entry| entry.patterns.iter().any(|p| p.matches(path)))
        .map(|entry| entry.id.clone())
        .collect()
}
