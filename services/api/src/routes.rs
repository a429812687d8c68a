use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use norae_hybe::ledger::SubmissionLedger;
use norae_hybe::notify::Mailer;
use norae_hybe::registration::{registration_router, RegistrationService};
use norae_hybe::uploads::ProofUploader;
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_registration_routes<M, L, U>(
    service: Arc<RegistrationService<M, L, U>>,
    max_body_bytes: usize,
) -> axum::Router
where
    M: Mailer + 'static,
    L: SubmissionLedger,
    U: ProofUploader + 'static,
{
    registration_router(service, max_body_bytes)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
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
