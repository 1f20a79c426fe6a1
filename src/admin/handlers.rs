use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::admin::AdminState;
use crate::apply::{Rejection, RejectionKind};
use crate::change::{Batch, BatchId};
use crate::controller::ProvisioningStatus;
use crate::model::{ContextPath, ContextState, Snapshot, SnapshotId};

#[derive(Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub halt_reason: Option<String>,
    pub snapshot: SnapshotId,
    pub owners: usize,
    pub endpoints: usize,
    pub contexts: Vec<ContextStatus>,
}

#[derive(Serialize)]
pub struct ContextStatus {
    pub path: ContextPath,
    pub state: ContextState,
    pub endpoints: usize,
}

#[derive(Serialize)]
pub struct Submitted {
    pub batch_id: BatchId,
    pub snapshot: SnapshotId,
    pub changed: bool,
    pub provisioning: ProvisioningStatus,
}

#[derive(Serialize)]
pub struct RejectedBody {
    pub error: RejectionKind,
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SubmitParams {
    /// Hold the response until the backend is reconciled.
    pub wait: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    pub uri: String,
}

pub async fn get_status(State(state): State<AdminState>) -> Json<SystemStatus> {
    let snapshot = state.engine.snapshot();
    let halt_reason = state.engine.registry().halt_reason();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: if halt_reason.is_some() { "halted" } else { "operational" },
        halt_reason,
        snapshot: snapshot.id,
        owners: snapshot.services.len(),
        endpoints: snapshot.endpoints.len(),
        contexts: snapshot
            .contexts
            .values()
            .map(|ctx| ContextStatus {
                path: ctx.path.clone(),
                state: ctx.state,
                endpoints: ctx.endpoints.len(),
            })
            .collect(),
    })
}

pub async fn get_snapshot(State(state): State<AdminState>) -> Json<Arc<Snapshot>> {
    Json(state.engine.snapshot())
}

pub async fn get_resolve(State(state): State<AdminState>, Query(params): Query<ResolveParams>) -> Response {
    match state.engine.route(&params.uri) {
        Ok(Some(routed)) => Json(routed).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

pub async fn post_batch(
    State(state): State<AdminState>,
    Query(params): Query<SubmitParams>,
    Json(batch): Json<Batch>,
) -> Response {
    let owner = batch.owner().clone();
    match state.engine.submit(batch).await {
        Ok(mut receipt) => {
            if params.wait {
                // Failures are reported through the status below.
                let _ = receipt.provisioned().await;
            }
            let body = Submitted {
                batch_id: receipt.batch_id,
                snapshot: receipt.snapshot_id,
                changed: receipt.changed,
                provisioning: receipt.provisioning_status(),
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(rejection) => {
            tracing::debug!(owner = %owner, error = %rejection, "admin batch rejected");
            (status_for(&rejection), Json(RejectedBody {
                error: rejection.kind(),
                reason: rejection.to_string(),
            }))
                .into_response()
        }
    }
}

fn status_for(rejection: &Rejection) -> StatusCode {
    match rejection.kind() {
        RejectionKind::ValidationError => StatusCode::UNPROCESSABLE_ENTITY,
        RejectionKind::Conflict | RejectionKind::Cancelled => StatusCode::CONFLICT,
        RejectionKind::Halted => StatusCode::SERVICE_UNAVAILABLE,
    }
}
