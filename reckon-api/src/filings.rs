use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::AppError;
use crate::state::AppState;
use reckon_filing::FilingStatus;

#[derive(Debug, Deserialize)]
pub struct SubmitFilingRequest {
    pub email: String,
}

/// POST /v1/users/{uid}/filings/{fid}/submit
/// Kick off the submission saga. Returns as soon as the saga is
/// running; the client polls the status endpoint.
pub async fn submit_filing(
    State(state): State<AppState>,
    Path((uid, fid)): Path<(String, String)>,
    Json(req): Json<SubmitFilingRequest>,
) -> Result<StatusCode, AppError> {
    state.filings.submit(&uid, &req.email, &fid).await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /v1/users/{uid}/filings/{fid}/status
pub async fn filing_status(
    State(state): State<AppState>,
    Path((uid, fid)): Path<(String, String)>,
) -> Result<Json<FilingStatus>, AppError> {
    state
        .filings
        .get_status(&uid, &fid)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFoundError(format!("No status for filing {}", fid)))
}

/// POST /v1/users/{uid}/filings/{fid}/draft
pub async fn move_to_draft(
    State(state): State<AppState>,
    Path((uid, fid)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    state.filings.move_to_draft(&uid, &fid).await?;
    Ok(StatusCode::OK)
}
