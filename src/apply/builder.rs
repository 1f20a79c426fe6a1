//! Working copy of the model used while a batch is applied.
//!
//! # Responsibilities
//! - Apply one change at a time, validating against the state left by the
//!   previous change in the same batch
//! - Record structural deltas for the context controller
//! - Recompile mapping tables of touched contexts on finish
//!
//! # Design Decisions
//! - The published snapshot is never touched; a failed batch just drops the
//!   builder
//! - Entities are copied on write (`Arc::make_mut`), untouched ones stay shared
//! - A change that alters nothing leaves the builder clean, so a batch made of
//!   no-ops publishes no new version

use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::apply::error::{ChangeError, ConflictError, TransitionError, ValidationError};
use crate::change::{Change, EndpointSpec, UrlPattern};
use crate::model::{
    ContextModel, ContextPath, ContextState, EndpointId, EndpointModel, OwnerId, ServiceModel,
    Snapshot, SnapshotId,
};
use crate::routing::table::MappingTable;

/// Structural effect of a committed change, as seen by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "delta", rename_all = "snake_case")]
pub enum StructuralDelta {
    ContextCreated { context: ContextPath },
    ContextDraining { context: ContextPath },
    ContextDestroyed { context: ContextPath },
    EndpointAdded { context: ContextPath, id: EndpointId },
    EndpointRemoved { context: ContextPath, id: EndpointId },
}

impl StructuralDelta {
    pub fn context(&self) -> &ContextPath {
        match self {
            StructuralDelta::ContextCreated { context }
            | StructuralDelta::ContextDraining { context }
            | StructuralDelta::ContextDestroyed { context }
            | StructuralDelta::EndpointAdded { context, .. }
            | StructuralDelta::EndpointRemoved { context, .. } => context,
        }
    }
}

/// Output of a builder that changed something.
#[derive(Debug)]
pub struct Built {
    pub snapshot: Snapshot,
    pub deltas: Vec<StructuralDelta>,
}

pub struct RegistryBuilder {
    base_id: SnapshotId,
    working: Snapshot,
    recompile: BTreeSet<ContextPath>,
    changed: bool,
    deltas: Vec<StructuralDelta>,
}

/// Apply one change to the working copy on behalf of `owner`.
pub(crate) fn apply(owner: &OwnerId, change: &Change, builder: &mut RegistryBuilder) -> Result<(), ChangeError> {
    match change {
        Change::CreateContext { path, upsert } => builder.create_context(owner, path, *upsert),
        Change::DestroyContext { path } => builder.destroy_context(path),
        Change::AddEndpoint(spec) => builder.add_endpoint(owner, spec),
        Change::RemoveEndpoint { id } => builder.remove_endpoint(owner, id),
        Change::EnableEndpoint { id } => builder.set_enabled(owner, id, true),
        Change::DisableEndpoint { id } => builder.set_enabled(owner, id, false),
        Change::UnregisterOwner { owner: departing } => {
            if departing != owner {
                return Err(ValidationError::ForeignOwner {
                    owner: owner.clone(),
                    target: departing.clone(),
                }
                .into());
            }
            builder.unregister_owner(departing)
        }
    }
}

impl RegistryBuilder {
    pub fn new(base: &Snapshot) -> Self {
        Self {
            base_id: base.id,
            working: base.clone(),
            recompile: BTreeSet::new(),
            changed: false,
            deltas: Vec::new(),
        }
    }

    /// Read access to the state as of the last applied change.
    pub fn view(&self) -> &Snapshot {
        &self.working
    }

    fn context_mut(&mut self, path: &ContextPath) -> Option<&mut ContextModel> {
        self.working.contexts.get_mut(path).map(Arc::make_mut)
    }

    fn service_mut(&mut self, owner: &OwnerId) -> &mut ServiceModel {
        let entry = self
            .working
            .services
            .entry(owner.clone())
            .or_insert_with(|| Arc::new(ServiceModel::new(owner.clone())));
        Arc::make_mut(entry)
    }

    fn index_context(&mut self, owner: &OwnerId, path: &ContextPath) {
        let known = self
            .working
            .services
            .get(owner)
            .is_some_and(|svc| svc.contexts.contains(path));
        if !known {
            self.service_mut(owner).contexts.insert(path.clone());
            self.changed = true;
        }
    }

    fn create_context(&mut self, owner: &OwnerId, path: &ContextPath, upsert: bool) -> Result<(), ChangeError> {
        if let Some(existing) = self.working.contexts.get(path) {
            let state = existing.state;
            if upsert && matches!(state, ContextState::Creating | ContextState::Active) {
                self.index_context(owner, path);
                return Ok(());
            }
            return Err(ConflictError::ContextExists { path: path.clone(), state }.into());
        }

        let context = ContextModel::new(path.clone(), owner.clone(), self.base_id.next());
        self.working.contexts.insert(path.clone(), Arc::new(context));
        self.index_context(owner, path);
        self.changed = true;
        self.deltas.push(StructuralDelta::ContextCreated { context: path.clone() });
        Ok(())
    }

    fn destroy_context(&mut self, path: &ContextPath) -> Result<(), ChangeError> {
        let ctx = self
            .context_mut(path)
            .ok_or_else(|| ValidationError::UnknownContext(path.clone()))?;
        if ctx.state == ContextState::Draining {
            return Ok(());
        }
        ctx.state = ContextState::Draining;
        self.changed = true;
        self.deltas.push(StructuralDelta::ContextDraining { context: path.clone() });
        Ok(())
    }

    fn add_endpoint(&mut self, owner: &OwnerId, spec: &EndpointSpec) -> Result<(), ChangeError> {
        let patterns = spec
            .patterns
            .iter()
            .map(|p| UrlPattern::parse(p))
            .collect::<Result<BTreeSet<_>, _>>()?;
        if patterns.is_empty() {
            return Err(ValidationError::NoPatterns(spec.id.clone()).into());
        }
        if self.working.endpoints.contains_key(&spec.id) {
            return Err(ConflictError::DuplicateEndpoint(spec.id.clone()).into());
        }
        match self.working.contexts.get(&spec.context) {
            None => return Err(ValidationError::UnknownContext(spec.context.clone()).into()),
            Some(ctx) if ctx.state == ContextState::Draining => {
                return Err(ValidationError::ContextNotAccepting {
                    path: spec.context.clone(),
                    state: ctx.state,
                }
                .into())
            }
            Some(_) => {}
        }

        let registration = self.working.next_registration;
        self.working.next_registration += 1;
        let endpoint = EndpointModel {
            id: spec.id.clone(),
            owner: owner.clone(),
            context: spec.context.clone(),
            kind: spec.kind,
            patterns,
            priority: spec.priority,
            enabled: spec.enabled,
            registration,
        };
        self.working.endpoints.insert(spec.id.clone(), Arc::new(endpoint));
        if let Some(ctx) = self.context_mut(&spec.context) {
            ctx.endpoints.insert(spec.id.clone());
        }
        let svc = self.service_mut(owner);
        svc.endpoints.insert(spec.id.clone());
        svc.contexts.insert(spec.context.clone());

        self.recompile.insert(spec.context.clone());
        self.changed = true;
        self.deltas.push(StructuralDelta::EndpointAdded {
            context: spec.context.clone(),
            id: spec.id.clone(),
        });
        Ok(())
    }

    fn owned_endpoint(&self, owner: &OwnerId, id: &EndpointId) -> Result<Arc<EndpointModel>, ChangeError> {
        let endpoint = self
            .working
            .endpoints
            .get(id)
            .ok_or_else(|| ValidationError::UnknownEndpoint(id.clone()))?;
        if &endpoint.owner != owner {
            return Err(ValidationError::NotOwner {
                id: id.clone(),
                owner: endpoint.owner.clone(),
            }
            .into());
        }
        Ok(Arc::clone(endpoint))
    }

    fn remove_endpoint(&mut self, owner: &OwnerId, id: &EndpointId) -> Result<(), ChangeError> {
        let endpoint = self.owned_endpoint(owner, id)?;
        self.drop_endpoint(&endpoint);
        Ok(())
    }

    fn drop_endpoint(&mut self, endpoint: &EndpointModel) {
        self.working.endpoints.remove(&endpoint.id);
        if let Some(ctx) = self.context_mut(&endpoint.context) {
            ctx.endpoints.remove(&endpoint.id);
        }
        if self.working.services.contains_key(&endpoint.owner) {
            self.service_mut(&endpoint.owner).endpoints.remove(&endpoint.id);
        }
        self.recompile.insert(endpoint.context.clone());
        self.changed = true;
        self.deltas.push(StructuralDelta::EndpointRemoved {
            context: endpoint.context.clone(),
            id: endpoint.id.clone(),
        });
    }

    fn set_enabled(&mut self, owner: &OwnerId, id: &EndpointId, enabled: bool) -> Result<(), ChangeError> {
        let endpoint = self.owned_endpoint(owner, id)?;
        if endpoint.enabled == enabled {
            return Ok(());
        }
        if let Some(entry) = self.working.endpoints.get_mut(id) {
            Arc::make_mut(entry).enabled = enabled;
        }
        self.recompile.insert(endpoint.context.clone());
        self.changed = true;
        Ok(())
    }

    fn unregister_owner(&mut self, owner: &OwnerId) -> Result<(), ChangeError> {
        let svc = self
            .working
            .services
            .get(owner)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownOwner(owner.clone()))?;

        for id in &svc.endpoints {
            if let Some(endpoint) = self.working.endpoints.get(id).cloned() {
                self.drop_endpoint(&endpoint);
            }
        }

        for path in &svc.contexts {
            let orphaned = self.working.contexts.get(path).is_some_and(|ctx| {
                &ctx.creator == owner
                    && matches!(ctx.state, ContextState::Creating | ContextState::Active)
                    && ctx.endpoints.is_empty()
            });
            if orphaned {
                self.destroy_context(path)?;
            }
        }

        self.working.services.remove(owner);
        self.changed = true;
        Ok(())
    }

    /// Record a lifecycle step reported by the context controller.
    ///
    /// The step only applies to the context created in `incarnation`; a
    /// context since recreated at the same path is left alone. Moving to
    /// `Destroyed` removes the context and every endpoint registered in it
    /// from the model.
    pub fn transition(
        &mut self,
        path: &ContextPath,
        incarnation: SnapshotId,
        to: ContextState,
    ) -> Result<ContextState, TransitionError> {
        let current = self
            .working
            .contexts
            .get(path)
            .ok_or_else(|| TransitionError::UnknownContext(path.clone()))?;
        if current.incarnation != incarnation {
            return Err(TransitionError::Replaced {
                path: path.clone(),
                expected: incarnation,
                found: current.incarnation,
            });
        }
        let from = current.state;
        if !from.can_transition_to(to) {
            return Err(TransitionError::Illegal {
                path: path.clone(),
                from,
                to,
            });
        }

        if to == ContextState::Destroyed {
            if let Some(ctx) = self.working.contexts.remove(path) {
                for id in &ctx.endpoints {
                    if let Some(endpoint) = self.working.endpoints.remove(id) {
                        if self.working.services.contains_key(&endpoint.owner) {
                            self.service_mut(&endpoint.owner).endpoints.remove(id);
                        }
                    }
                }
            }
            let touching: Vec<OwnerId> = self
                .working
                .services
                .values()
                .filter(|svc| svc.contexts.contains(path))
                .map(|svc| svc.owner.clone())
                .collect();
            for owner in touching {
                self.service_mut(&owner).contexts.remove(path);
            }
            self.recompile.remove(path);
            self.deltas.push(StructuralDelta::ContextDestroyed { context: path.clone() });
        } else if let Some(ctx) = self.context_mut(path) {
            ctx.state = to;
        }

        self.changed = true;
        Ok(from)
    }

    /// Produce the next snapshot, or `None` when nothing changed.
    pub fn finish(mut self) -> Option<Built> {
        if !self.changed {
            return None;
        }

        for path in std::mem::take(&mut self.recompile) {
            let Some(ctx) = self.working.contexts.get(&path) else {
                continue;
            };
            let table = MappingTable::compile(self.working.endpoints_of(ctx).map(Arc::as_ref));
            if let Some(ctx) = self.context_mut(&path) {
                ctx.mappings = table;
            }
        }

        self.working.id = self.base_id.next();
        Some(Built {
            snapshot: self.working,
            deltas: self.deltas,
        })
    }
}
