//! Compiled per-context mapping tables.
//!
//! # Responsibilities
//! - Pick the single winner for every pattern claimed in a context (shadowing)
//! - Index winners by pattern class for resolution
//! - Order filters into a chain
//!
//! # Design Decisions
//! - Compiled when a batch commits, frozen inside the snapshot
//! - Disabled endpoints never enter the table
//! - Winner: highest priority, then lowest registration sequence

use serde::Serialize;
use std::collections::BTreeMap;

use crate::change::pattern::UrlPattern;
use crate::model::{EndpointId, EndpointModel};

/// Pattern → endpoint winners for one context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingTable {
    pub(crate) context_root: Option<EndpointId>,
    pub(crate) default: Option<EndpointId>,
    pub(crate) exact: BTreeMap<String, EndpointId>,
    pub(crate) prefix: BTreeMap<String, EndpointId>,
    pub(crate) extension: BTreeMap<String, EndpointId>,
    /// Enabled filters in chain order.
    pub(crate) filters: Vec<FilterEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterEntry {
    pub id: EndpointId,
    pub patterns: Vec<UrlPattern>,
}

/// Sort key: higher priority first, then earlier registration.
fn rank(endpoint: &EndpointModel) -> (std::cmp::Reverse<i32>, u64) {
    (std::cmp::Reverse(endpoint.priority), endpoint.registration)
}

impl MappingTable {
    /// Compile the table from every endpoint registered in one context.
    pub fn compile<'a, I>(endpoints: I) -> Self
    where
        I: IntoIterator<Item = &'a EndpointModel>,
    {
        let mut winners: BTreeMap<&'a UrlPattern, &'a EndpointModel> = BTreeMap::new();
        let mut filters: Vec<&'a EndpointModel> = Vec::new();

        for endpoint in endpoints.into_iter().filter(|e| e.enabled) {
            if endpoint.kind.is_filter() {
                filters.push(endpoint);
                continue;
            }
            for pattern in &endpoint.patterns {
                winners
                    .entry(pattern)
                    .and_modify(|current| {
                        if rank(endpoint) < rank(current) {
                            *current = endpoint;
                        }
                    })
                    .or_insert(endpoint);
            }
        }

        let mut table = MappingTable::default();
        for (pattern, endpoint) in winners {
            let id = endpoint.id.clone();
            match pattern {
                UrlPattern::ContextRoot => table.context_root = Some(id),
                UrlPattern::Default => table.default = Some(id),
                UrlPattern::Exact(literal) => {
                    table.exact.insert(literal.clone(), id);
                }
                UrlPattern::Prefix(prefix) => {
                    table.prefix.insert(prefix.clone(), id);
                }
                UrlPattern::Extension(ext) => {
                    table.extension.insert(ext.clone(), id);
                }
            }
        }

        filters.sort_by_key(|f| rank(f));
        table.filters = filters
            .into_iter()
            .map(|f| FilterEntry {
                id: f.id.clone(),
                patterns: f.patterns.iter().cloned().collect(),
            })
            .collect();

        table
    }

    /// Every (pattern, winner) pair, used for integrity checks.
    pub fn entries(&self) -> impl Iterator<Item = (UrlPattern, &EndpointId)> {
        let root = self.context_root.iter().map(|id| (UrlPattern::ContextRoot, id));
        let default = self.default.iter().map(|id| (UrlPattern::Default, id));
        let exact = self.exact.iter().map(|(p, id)| (UrlPattern::Exact(p.clone()), id));
        let prefix = self.prefix.iter().map(|(p, id)| (UrlPattern::Prefix(p.clone()), id));
        let ext = self
            .extension
            .iter()
            .map(|(p, id)| (UrlPattern::Extension(p.clone()), id));
        root.chain(default).chain(exact).chain(prefix).chain(ext)
    }

    pub fn filters(&self) -> &[FilterEntry] {
        &self.filters
    }

    /// Winner for a pattern, if any endpoint claims it.
    pub fn winner(&self, pattern: &UrlPattern) -> Option<&EndpointId> {
        match pattern {
            UrlPattern::ContextRoot => self.context_root.as_ref(),
            UrlPattern::Default => self.default.as_ref(),
            UrlPattern::Exact(p) => self.exact.get(p),
            UrlPattern::Prefix(p) => self.prefix.get(p),
            UrlPattern::Extension(p) => self.extension.get(p),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.context_root.is_none()
            && self.default.is_none()
            && self.exact.is_empty()
            && self.prefix.is_empty()
            && self.extension.is_empty()
            && self.filters.is_empty()
    }
}
