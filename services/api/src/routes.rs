use crate::infra::{AppState, MemoryComplianceService};
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use renay::compliance::{compliance_router, BlobStore, SignatureError};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub(crate) struct SignedFileQuery {
    pub(crate) expires: i64,
    pub(crate) signature: String,
}

pub(crate) fn with_compliance_routes(service: Arc<MemoryComplianceService>) -> axum::Router {
    compliance_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/files/*key", axum::routing::get(signed_file_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Serve an uploaded file to the holder of a signed URL.
pub(crate) async fn signed_file_endpoint(
    Extension(state): Extension<AppState>,
    Path(key): Path<String>,
    Query(query): Query<SignedFileQuery>,
) -> Response {
    if let Err(err) = state.blobs.verify_signed(&key, query.expires, &query.signature) {
        debug!(%key, error = %err, "signed file request rejected");
        let status = match &err {
            SignatureError::Mismatch => StatusCode::FORBIDDEN,
            SignatureError::Expired => StatusCode::GONE,
        };
        return (status, Json(json!({ "error": err.to_string() }))).into_response();
    }

    match state.blobs.get(&key) {
        Ok(blob) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, blob.content_type)],
            blob.bytes,
        )
            .into_response(),
        Err(err) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}
