/// verify-and-attest endpoint
use crate::{
    attestation::{AttestationReport, AttestationRequest},
    error::{AttestError, ErrorKind},
    AppContext,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use std::time::Instant;
use tracing::{info_span, warn, Instrument};
use uuid::Uuid;

/// Build verify-and-attest routes
pub fn routes() -> Router<AppContext> {
    Router::new().route("/api/v1/verify-and-attest", post(verify_and_attest))
}

/// POST /api/v1/verify-and-attest
///
/// Verify that the connected wallet controls the DID, then write any
/// missing attestations. The body is always an [`AttestationReport`].
pub async fn verify_and_attest(
    State(ctx): State<AppContext>,
    body: Result<Json<AttestationRequest>, JsonRejection>,
) -> Response {
    let started = Instant::now();
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            let error = AttestError::Format(rejection.body_text());
            warn!(error = %error, "unreadable verify-and-attest body");
            let report = AttestationReport::rejected(&error, started);
            return (status_for(&report), Json(report)).into_response();
        }
    };

    let request_id = Uuid::new_v4();
    let span = info_span!("verify_and_attest", %request_id, did = %request.did);
    let mut report = ctx
        .orchestrator
        .verify_and_attest(&request)
        .instrument(span)
        .await;

    if !ctx.config.service.debug_responses {
        report.debug = None;
    }

    (status_for(&report), Json(report)).into_response()
}

fn status_for(report: &AttestationReport) -> StatusCode {
    if report.ok {
        return StatusCode::OK;
    }
    match report.error_kind {
        Some(ErrorKind::Format) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorKind::Mismatch) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(ErrorKind::TransientNetwork) => StatusCode::BAD_GATEWAY,
        Some(ErrorKind::Configuration) | Some(ErrorKind::Internal) | None => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
