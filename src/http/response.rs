//! Response bodies of the resolution front.
//!
//! # Design Decisions
//! - Every response is JSON, hits and misses alike
//! - A miss is a normal 404, not an error of the engine
//! - A halted model answers 503 so load balancers take the instance out

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::engine::Routed;
use crate::model::SnapshotId;

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uri: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<SnapshotId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

pub fn resolved(routed: Routed) -> Response {
    (StatusCode::OK, Json(routed)).into_response()
}

pub fn not_found(uri: &str, snapshot: SnapshotId) -> Response {
    let body = ErrorBody {
        error: "not_found",
        uri: Some(uri),
        snapshot: Some(snapshot),
        reason: None,
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

pub fn unavailable(reason: String) -> Response {
    let body = ErrorBody {
        error: "model_corrupted",
        uri: None,
        snapshot: None,
        reason: Some(reason),
    };
    (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
}
