use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::{error, warn};

use super::domain::parse_body;
use super::service::{RegistrationError, RegistrationService};
use crate::ledger::SubmissionLedger;
use crate::notify::Mailer;
use crate::uploads::ProofUploader;

pub const REGISTRATION_PATH: &str = "/api/generate-ticket";

/// Router exposing the registration endpoint. Methods other than POST answer 405.
///
/// `max_body_bytes` replaces axum's 2 MB default, which a form carrying base64 images outgrows.
pub fn registration_router<M, L, U>(
    service: Arc<RegistrationService<M, L, U>>,
    max_body_bytes: usize,
) -> Router
where
    M: Mailer + 'static,
    L: SubmissionLedger,
    U: ProofUploader + 'static,
{
    Router::new()
        .route(
            REGISTRATION_PATH,
            post(register_handler::<M, L, U>)
                .fallback(method_not_allowed)
                .layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .with_state(service)
}

/// Reads the raw body so clients that omit or mislabel the content type are still served.
pub(crate) async fn register_handler<M, L, U>(
    State(service): State<Arc<RegistrationService<M, L, U>>>,
    body: Result<Bytes, BytesRejection>,
) -> Response
where
    M: Mailer + 'static,
    L: SubmissionLedger,
    U: ProofUploader + 'static,
{
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(status = %rejection.status(), "registration body rejected");
            return (
                rejection.status(),
                Json(json!({ "error": rejection.body_text() })),
            )
                .into_response();
        }
    };

    let result = match parse_body(&body) {
        Ok(request) => service.register(request).await,
        Err(err) => Err(RegistrationError::from(err)),
    };

    match result {
        Ok(receipt) => (StatusCode::OK, Json(receipt.view())).into_response(),
        Err(err) => {
            if err.status_code().is_server_error() {
                error!(error = %err, "registration failed");
            }
            err.into_response()
        }
    }
}

pub(crate) async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "error": "Method Not Allowed" })),
    )
        .into_response()
}
