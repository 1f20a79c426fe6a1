//! Immutable, versioned view of the registration model.

use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

use crate::model::entities::{ContextModel, EndpointModel, ServiceModel};
use crate::model::types::{ContextPath, ContextState, EndpointId, OwnerId, SnapshotId};

/// An invariant violation found in a published or about-to-be-published model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("corrupted model: {0}")]
pub struct CorruptionError(pub String);

/// The whole model at one point in time.
///
/// Entities live in flat maps keyed by stable identifiers; contexts and
/// services refer to endpoints by id. Values are shared between consecutive
/// snapshots through `Arc`, so cloning a snapshot is shallow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub(crate) next_registration: u64,
    pub contexts: BTreeMap<ContextPath, Arc<ContextModel>>,
    pub endpoints: BTreeMap<EndpointId, Arc<EndpointModel>>,
    pub services: BTreeMap<OwnerId, Arc<ServiceModel>>,
}

impl Snapshot {
    /// The empty model published at startup.
    pub fn empty() -> Self {
        Self {
            id: SnapshotId(0),
            next_registration: 1,
            contexts: BTreeMap::new(),
            endpoints: BTreeMap::new(),
            services: BTreeMap::new(),
        }
    }

    pub fn context(&self, path: &ContextPath) -> Option<&Arc<ContextModel>> {
        self.contexts.get(path)
    }

    pub fn endpoint(&self, id: &EndpointId) -> Option<&Arc<EndpointModel>> {
        self.endpoints.get(id)
    }

    pub fn service(&self, owner: &OwnerId) -> Option<&Arc<ServiceModel>> {
        self.services.get(owner)
    }

    /// Endpoints registered in a context, in id order.
    pub fn endpoints_of<'a>(
        &'a self,
        context: &'a ContextModel,
    ) -> impl Iterator<Item = &'a Arc<EndpointModel>> + 'a {
        context.endpoints.iter().filter_map(|id| self.endpoints.get(id))
    }

    /// Pick the context serving `uri`: the longest ACTIVE context path that
    /// is a segment-aligned prefix of the URI. Returns the context and the
    /// remainder of the URI.
    pub fn select_context<'u>(&self, uri: &'u str) -> Option<(&Arc<ContextModel>, &'u str)> {
        self.contexts
            .iter()
            .filter(|(_, ctx)| ctx.is_active())
            .filter_map(|(path, ctx)| path.strip_from(uri).map(|rest| (path, ctx, rest)))
            .max_by_key(|(path, _, _)| path.as_str().len())
            .map(|(_, ctx, rest)| (ctx, rest))
    }

    /// Check every structural invariant of the model.
    pub fn verify(&self) -> Result<(), CorruptionError> {
        let fail = |msg: String| Err(CorruptionError(msg));

        for (path, ctx) in &self.contexts {
            if &ctx.path != path {
                return fail(format!("context keyed {} claims path {}", path, ctx.path));
            }
            if ctx.state == ContextState::Destroyed {
                return fail(format!("destroyed context {} still present", path));
            }
            for id in &ctx.endpoints {
                match self.endpoints.get(id) {
                    Some(ep) if &ep.context == path => {}
                    Some(ep) => {
                        return fail(format!("endpoint {} listed in {} but lives in {}", id, path, ep.context))
                    }
                    None => return fail(format!("context {} lists missing endpoint {}", path, id)),
                }
            }
            for (pattern, id) in ctx.mappings.entries() {
                let Some(ep) = self.endpoints.get(id) else {
                    return fail(format!("mapping '{}' in {} points at missing endpoint {}", pattern, path, id));
                };
                if &ep.context != path || !ep.enabled || ep.kind.is_filter() || !ep.patterns.contains(&pattern) {
                    return fail(format!("mapping '{}' in {} points at ineligible endpoint {}", pattern, path, id));
                }
            }
            for filter in ctx.mappings.filters() {
                match self.endpoints.get(&filter.id) {
                    Some(ep) if ep.enabled && ep.kind.is_filter() && &ep.context == path => {}
                    _ => return fail(format!("filter chain of {} has invalid entry {}", path, filter.id)),
                }
            }
        }

        for (id, ep) in &self.endpoints {
            if &ep.id != id {
                return fail(format!("endpoint keyed {} claims id {}", id, ep.id));
            }
            if ep.registration >= self.next_registration {
                return fail(format!("endpoint {} has registration from the future", id));
            }
            match self.contexts.get(&ep.context) {
                Some(ctx) if ctx.endpoints.contains(id) => {}
                _ => return fail(format!("endpoint {} is not listed by context {}", id, ep.context)),
            }
            match self.services.get(&ep.owner) {
                Some(svc) if svc.endpoints.contains(id) => {}
                _ => return fail(format!("endpoint {} is not indexed under owner {}", id, ep.owner)),
            }
        }

        for (owner, svc) in &self.services {
            if &svc.owner != owner {
                return fail(format!("service keyed {} claims owner {}", owner, svc.owner));
            }
            for id in &svc.endpoints {
                match self.endpoints.get(id) {
                    Some(ep) if &ep.owner == owner => {}
                    _ => return fail(format!("owner {} indexes foreign or missing endpoint {}", owner, id)),
                }
            }
            if let Some(path) = svc.contexts.iter().find(|p| !self.contexts.contains_key(*p)) {
                return fail(format!("owner {} indexes missing context {}", owner, path));
            }
        }

        Ok(())
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}
