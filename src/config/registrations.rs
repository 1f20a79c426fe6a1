//! Static registrations declared in the configuration file.
//!
//! The configuration acts as one more registering owner, `config`. Loading
//! and every reload become a single batch, so a reload either lands whole
//! or leaves the previous registrations in place.

use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::mpsc;

use crate::change::{Batch, EndpointSpec};
use crate::config::schema::{EngineConfig, RegistrationsConfig, StaticEndpoint};
use crate::engine::Engine;
use crate::lifecycle::Shutdown;
use crate::model::{ContextPath, EndpointId, IdentError, OwnerId};

/// Owner id used for registrations coming from the configuration.
pub const CONFIG_OWNER: &str = "config";

pub fn config_owner() -> Result<OwnerId, IdentError> {
    OwnerId::new(CONFIG_OWNER)
}

fn spec(ep: &StaticEndpoint) -> Result<EndpointSpec, IdentError> {
    let mut spec = EndpointSpec::servlet(
        EndpointId::new(ep.id.as_str())?,
        ContextPath::parse(&ep.context)?,
        ep.patterns.iter().cloned(),
    )
    .with_kind(ep.kind)
    .with_priority(ep.priority);
    spec.enabled = ep.enabled;
    Ok(spec)
}

/// Batch moving the static registrations from `previous` to `next`.
///
/// Changed endpoints are removed and re-added. Contexts dropped from the
/// file are destroyed after their endpoints are gone. Both inputs are
/// expected to have passed validation.
pub fn plan_reload(previous: &RegistrationsConfig, next: &RegistrationsConfig) -> Result<Batch, IdentError> {
    let old_eps: BTreeMap<&str, &StaticEndpoint> = previous.endpoints.iter().map(|e| (e.id.as_str(), e)).collect();
    let new_eps: BTreeMap<&str, &StaticEndpoint> = next.endpoints.iter().map(|e| (e.id.as_str(), e)).collect();

    let old_ctx = previous
        .contexts
        .iter()
        .map(|c| ContextPath::parse(&c.path))
        .collect::<Result<BTreeSet<_>, _>>()?;
    let new_ctx = next
        .contexts
        .iter()
        .map(|c| ContextPath::parse(&c.path))
        .collect::<Result<BTreeSet<_>, _>>()?;

    let mut batch = Batch::new(config_owner()?);

    for (id, old) in &old_eps {
        if new_eps.get(id) != Some(old) {
            batch = batch.remove_endpoint(EndpointId::new(*id)?);
        }
    }
    for path in new_ctx.difference(&old_ctx) {
        batch = batch.ensure_context(path.clone());
    }
    for (id, new) in &new_eps {
        if old_eps.get(id) != Some(new) {
            batch = batch.add_endpoint(spec(new)?);
        }
    }
    for path in old_ctx.difference(&new_ctx) {
        batch = batch.destroy_context(path.clone());
    }

    Ok(batch)
}

/// Apply reloaded configurations until shutdown.
///
/// A rejected reload is logged and the previous registrations stay current,
/// so the next reload is planned against them.
pub async fn apply_reloads(
    engine: Engine,
    initial: EngineConfig,
    mut updates: mpsc::UnboundedReceiver<EngineConfig>,
    shutdown: Shutdown,
) {
    let mut current = initial.registrations;
    let mut stop = shutdown.subscribe();

    loop {
        let next = tokio::select! {
            _ = stop.recv() => break,
            update = updates.recv() => match update {
                Some(config) => config.registrations,
                None => break,
            },
        };

        let batch = match plan_reload(&current, &next) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::error!(error = %e, "cannot plan registration reload");
                continue;
            }
        };
        if batch.is_empty() {
            tracing::debug!("reload leaves static registrations unchanged");
            current = next;
            continue;
        }

        let changes = batch.len();
        match engine.submit(batch).await {
            Ok(receipt) => {
                tracing::info!(snapshot = %receipt.snapshot_id, changes, "static registrations reloaded");
                current = next;
            }
            Err(e) => {
                tracing::error!(error = %e, "registration reload rejected, keeping previous registrations");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::{Change, ChangeKind};
    use crate::config::schema::StaticContext;
    use crate::model::EndpointKind;

    fn regs(contexts: &[&str], endpoints: &[(&str, &str, &str)]) -> RegistrationsConfig {
        RegistrationsConfig {
            contexts: contexts.iter().map(|p| StaticContext { path: p.to_string() }).collect(),
            endpoints: endpoints
                .iter()
                .map(|(id, ctx, pattern)| StaticEndpoint {
                    id: id.to_string(),
                    context: ctx.to_string(),
                    kind: EndpointKind::Servlet,
                    patterns: vec![pattern.to_string()],
                    priority: 0,
                    enabled: true,
                })
                .collect(),
        }
    }

    fn kinds(batch: &Batch) -> Vec<ChangeKind> {
        batch.changes().iter().map(Change::kind).collect()
    }

    #[test]
    fn test_initial_load() {
        let batch = plan_reload(&RegistrationsConfig::default(), &regs(&["/app"], &[("a", "/app", "/x")])).unwrap();
        assert_eq!(batch.owner().as_str(), CONFIG_OWNER);
        assert_eq!(kinds(&batch), vec![ChangeKind::Create, ChangeKind::Add]);
        assert!(matches!(batch.changes()[0], Change::CreateContext { upsert: true, .. }));
    }

    #[test]
    fn test_changed_endpoint_is_replaced_and_dropped_context_destroyed() {
        let before = regs(&["/app", "/old"], &[("a", "/app", "/x"), ("b", "/old", "/y")]);
        let after = regs(&["/app"], &[("a", "/app", "/z")]);
        let batch = plan_reload(&before, &after).unwrap();
        assert_eq!(
            kinds(&batch),
            vec![ChangeKind::Remove, ChangeKind::Remove, ChangeKind::Add, ChangeKind::Destroy]
        );
    }

    #[test]
    fn test_identical_config_plans_nothing() {
        let same = regs(&["/app"], &[("a", "/app", "/x")]);
        assert!(plan_reload(&same, &same).unwrap().is_empty());
    }
}
