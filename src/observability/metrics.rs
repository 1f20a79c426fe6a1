//! Metrics collection and exposition.
//!
//! # Metrics
//! - `router_batches_committed_total` (counter)
//! - `router_batches_rejected_total` (counter): by `kind`
//! - `router_resolutions_total` (counter): by `match` (`none` on a miss)
//! - `router_snapshot_id` (gauge): version currently published
//! - `router_provisioning_failures_total` (counter)
//! - `router_resolution_duration_seconds` (histogram)
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed, so tests and
//!   embedders pay nothing
//! - Labels are closed sets (rejection kinds, match kinds)

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

use crate::apply::RejectionKind;
use crate::model::SnapshotId;
use crate::routing::MatchKind;

/// Install the Prometheus recorder and its scrape listener.
pub fn init_metrics(addr: SocketAddr) -> Result<(), metrics_exporter_prometheus::BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "metrics endpoint listening");
    Ok(())
}

pub fn record_commit(snapshot: SnapshotId) {
    counter!("router_batches_committed_total").increment(1);
    gauge!("router_snapshot_id").set(snapshot.0 as f64);
}

pub fn record_snapshot(snapshot: SnapshotId) {
    gauge!("router_snapshot_id").set(snapshot.0 as f64);
}

pub fn record_rejection(kind: RejectionKind) {
    counter!("router_batches_rejected_total", "kind" => kind.as_str()).increment(1);
}

pub fn record_resolution(kind: Option<MatchKind>, started: Instant) {
    let label = kind.map_or("none", MatchKind::as_str);
    counter!("router_resolutions_total", "match" => label).increment(1);
    histogram!("router_resolution_duration_seconds").record(started.elapsed().as_secs_f64());
}

pub fn record_provisioning_failure() {
    counter!("router_provisioning_failures_total").increment(1);
}
