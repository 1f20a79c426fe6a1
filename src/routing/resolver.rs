//! Request path → endpoint resolution.
//!
//! # Precedence
//! ```text
//! 1. "/" with a "" mapping          → CONTEXT_ROOT
//! 2. literal equal to the path      → EXACT
//! 3. longest "<prefix>/*" covering  → PREFIX
//! 4. "*.<ext>" of the last segment  → EXTENSION
//! 5. "/"                            → DEFAULT
//! 6. nothing                        → not found
//! ```
//!
//! Shadowing was settled when the mapping table was compiled, so every
//! step is a single map lookup. Resolution is a pure function of the
//! snapshot and never blocks.

use serde::Serialize;
use std::fmt;

use crate::change::pattern::extension_of;
use crate::model::{ContextPath, CorruptionError, EndpointId, Snapshot, SnapshotId};
use crate::routing::table::MappingTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchKind {
    ContextRoot,
    Exact,
    Prefix,
    Extension,
    Default,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MatchKind::ContextRoot => "context_root",
            MatchKind::Exact => "exact",
            MatchKind::Prefix => "prefix",
            MatchKind::Extension => "extension",
            MatchKind::Default => "default",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The winning endpoint and how the request path splits around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub endpoint: EndpointId,
    pub context_path: ContextPath,
    /// Part of the path that selected the endpoint.
    pub servlet_path: String,
    /// Remainder below the servlet path, for prefix and context-root matches.
    pub path_info: Option<String>,
    pub match_kind: MatchKind,
    /// Snapshot the decision was taken against.
    pub snapshot: SnapshotId,
}

/// Resolve `path` (relative to `context`, starting with `/`).
///
/// Returns `Ok(None)` when nothing matches or the context is not ACTIVE.
/// An error means the snapshot references an endpoint it does not contain.
pub fn resolve(snapshot: &Snapshot, context: &ContextPath, path: &str) -> Result<Option<Resolution>, CorruptionError> {
    let Some(ctx) = snapshot.context(context) else {
        return Ok(None);
    };
    if !ctx.is_active() || !path.starts_with('/') {
        return Ok(None);
    }

    let Some((endpoint, kind, servlet_path, path_info)) = lookup(&ctx.mappings, path) else {
        return Ok(None);
    };
    if snapshot.endpoint(endpoint).is_none() {
        return Err(CorruptionError(format!(
            "context {} maps '{}' to unknown endpoint {}",
            context, path, endpoint
        )));
    }

    Ok(Some(Resolution {
        endpoint: endpoint.clone(),
        context_path: context.clone(),
        servlet_path: servlet_path.to_string(),
        path_info: path_info.map(str::to_string),
        match_kind: kind,
        snapshot: snapshot.id,
    }))
}

/// Resolve a full request URI: pick the context, then resolve the rest.
///
/// A URI naming a non-root context without a trailing slash (`/c1`) does not
/// resolve.
pub fn resolve_uri(snapshot: &Snapshot, uri: &str) -> Result<Option<Resolution>, CorruptionError> {
    let Some((ctx, rest)) = snapshot.select_context(uri) else {
        return Ok(None);
    };
    if rest.is_empty() {
        return Ok(None);
    }
    resolve(snapshot, &ctx.path, rest)
}

type Hit<'t, 'p> = (&'t EndpointId, MatchKind, &'p str, Option<&'p str>);

fn lookup<'t, 'p>(table: &'t MappingTable, path: &'p str) -> Option<Hit<'t, 'p>> {
    if path == "/" {
        if let Some(id) = &table.context_root {
            return Some((id, MatchKind::ContextRoot, "", Some("/")));
        }
    }

    if let Some(id) = table.exact.get(path) {
        return Some((id, MatchKind::Exact, path, None));
    }

    // Walk "/a/b/c", "/a/b", "/a", "" so the longest prefix is found first.
    let mut candidate = path;
    loop {
        if let Some(id) = table.prefix.get(candidate) {
            let rest = &path[candidate.len()..];
            let info = (!rest.is_empty()).then_some(rest);
            return Some((id, MatchKind::Prefix, candidate, info));
        }
        match candidate.rfind('/') {
            Some(i) => candidate = &candidate[..i],
            None => break,
        }
    }

    if let Some(id) = extension_of(path).and_then(|ext| table.extension.get(ext)) {
        return Some((id, MatchKind::Extension, path, None));
    }

    table.default.as_ref().map(|id| (id, MatchKind::Default, path, None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apply::builder::{apply, RegistryBuilder};
    use crate::change::{Batch, EndpointSpec};
    use crate::model::{ContextState, OwnerId};

    fn active(batch: Batch) -> Snapshot {
        let mut builder = RegistryBuilder::new(&Snapshot::empty());
        for change in batch.changes() {
            apply(batch.owner(), change, &mut builder).unwrap();
        }
        let born: Vec<(ContextPath, SnapshotId)> = builder
            .view()
            .contexts
            .values()
            .map(|ctx| (ctx.path.clone(), ctx.incarnation))
            .collect();
        for (path, incarnation) in born {
            builder.transition(&path, incarnation, ContextState::Active).unwrap();
        }
        builder.finish().unwrap().snapshot
    }

    fn ctx(p: &str) -> ContextPath {
        ContextPath::parse(p).unwrap()
    }

    fn servlet(id: &str, context: &str, patterns: &[&str]) -> EndpointSpec {
        EndpointSpec::servlet(EndpointId::new(id).unwrap(), ctx(context), patterns.iter().copied())
    }

    fn mixed(context: &str) -> Snapshot {
        active(
            Batch::new(OwnerId::new("a").unwrap())
                .create_context(ctx(context))
                .add_endpoint(servlet("root", context, &[""]))
                .add_endpoint(servlet("p", context, &["/p/*"]))
                .add_endpoint(servlet("action", context, &["*.action"]))
                .add_endpoint(servlet("x", context, &["/x"])),
        )
    }

    fn split(r: &Resolution) -> (&str, &str, Option<&str>, MatchKind) {
        (r.endpoint.as_str(), r.servlet_path.as_str(), r.path_info.as_deref(), r.match_kind)
    }

    #[test]
    fn test_precedence_in_root_context() {
        let snap = mixed("");
        let root = ContextPath::root();
        let get = |p: &str| resolve(&snap, &root, p).unwrap();

        assert_eq!(split(&get("/").unwrap()), ("root", "", Some("/"), MatchKind::ContextRoot));
        assert_eq!(split(&get("/p/anything").unwrap()), ("p", "/p", Some("/anything"), MatchKind::Prefix));
        assert_eq!(split(&get("/p").unwrap()), ("p", "/p", None, MatchKind::Prefix));
        assert_eq!(
            split(&get("/anything.action").unwrap()),
            ("action", "/anything.action", None, MatchKind::Extension)
        );
        assert_eq!(split(&get("/x").unwrap()), ("x", "/x", None, MatchKind::Exact));
        assert_eq!(get("/y"), None);
    }

    #[test]
    fn test_prefix_beats_extension() {
        let snap = mixed("");
        let r = resolve(&snap, &ContextPath::root(), "/p/page.action").unwrap().unwrap();
        assert_eq!(r.match_kind, MatchKind::Prefix);
    }

    #[test]
    fn test_longest_prefix_wins() {
        let snap = active(
            Batch::new(OwnerId::new("a").unwrap())
                .create_context(ContextPath::root())
                .add_endpoint(servlet("short", "", &["/p/*"]))
                .add_endpoint(servlet("long", "", &["/p/q/*"]))
                .add_endpoint(servlet("all", "", &["/*"])),
        );
        let root = ContextPath::root();
        let r = resolve(&snap, &root, "/p/q/anything").unwrap().unwrap();
        assert_eq!(split(&r), ("long", "/p/q", Some("/anything"), MatchKind::Prefix));

        let r = resolve(&snap, &root, "/p/qq").unwrap().unwrap();
        assert_eq!(r.endpoint.as_str(), "short");

        let r = resolve(&snap, &root, "/other").unwrap().unwrap();
        assert_eq!(split(&r), ("all", "", Some("/other"), MatchKind::Prefix));
    }

    #[test]
    fn test_default_catches_the_rest() {
        let snap = active(
            Batch::new(OwnerId::new("a").unwrap())
                .create_context(ContextPath::root())
                .add_endpoint(servlet("default", "", &["/"])),
        );
        let r = resolve(&snap, &ContextPath::root(), "/").unwrap().unwrap();
        assert_eq!(split(&r), ("default", "/", None, MatchKind::Default));
    }

    #[test]
    fn test_uri_selects_longest_context() {
        let mut batch = Batch::new(OwnerId::new("a").unwrap())
            .create_context(ctx("/c1"))
            .add_endpoint(servlet("c1-x", "/c1", &["/x"]))
            .create_context(ContextPath::root())
            .add_endpoint(servlet("root-default", "", &["/"]));
        batch.push(crate::change::Change::AddEndpoint(servlet("c1-root", "/c1", &[""])));
        let snap = active(batch);

        let r = resolve_uri(&snap, "/c1/x").unwrap().unwrap();
        assert_eq!((r.context_path.as_str(), r.endpoint.as_str()), ("/c1", "c1-x"));

        let r = resolve_uri(&snap, "/c1/").unwrap().unwrap();
        assert_eq!(r.match_kind, MatchKind::ContextRoot);

        assert_eq!(resolve_uri(&snap, "/c1").unwrap(), None);

        let r = resolve_uri(&snap, "/c10/x").unwrap().unwrap();
        assert_eq!(r.endpoint.as_str(), "root-default");
    }

    #[test]
    fn test_inactive_context_does_not_resolve() {
        let owner = OwnerId::new("a").unwrap();
        let batch = Batch::new(owner).create_context(ctx("/c1")).add_endpoint(servlet("x", "/c1", &["/x"]));
        let mut builder = RegistryBuilder::new(&Snapshot::empty());
        for change in batch.changes() {
            apply(batch.owner(), change, &mut builder).unwrap();
        }
        let creating = builder.finish().unwrap().snapshot;
        assert_eq!(resolve(&creating, &ctx("/c1"), "/x").unwrap(), None);
        assert_eq!(resolve_uri(&creating, "/c1/x").unwrap(), None);
    }

    #[test]
    fn test_dangling_winner_is_corruption() {
        let mut snap = mixed("");
        snap.endpoints.remove(&EndpointId::new("x").unwrap());
        assert!(resolve(&snap, &ContextPath::root(), "/x").is_err());
    }
}
