//! Batch submission endpoints
//!
//! A batch is accepted immediately and processed in the background; the
//! caller gets the batch id back and can poll GET /batch/{id}.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::auth::session_id;
use crate::models::BatchSubmission;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct BatchAccepted {
    pub status: String,
    pub batch_id: Uuid,
    pub jobs: usize,
}

#[derive(Debug, Serialize)]
pub struct BatchStatus {
    pub batch_id: Uuid,
    pub finished: bool,
}

/// POST /batch (also POST /)
pub async fn submit_batch(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(submission): Json<BatchSubmission>,
) -> ApiResult<(StatusCode, Json<BatchAccepted>)> {
    if submission.jobs.is_empty() {
        return Err(ApiError::BadRequest("at least one job is required".to_string()));
    }

    let session = session_id(&headers);
    if !state.credential_store.is_connected(session.as_deref()).await? {
        return Err(ApiError::Unauthorized("document store not connected".to_string()));
    }

    let handle = state.batch_runner.submit(submission.jobs, session);
    let accepted = BatchAccepted {
        status: "processing_started".to_string(),
        batch_id: handle.id(),
        jobs: handle.job_count(),
    };
    info!(batch_id = %accepted.batch_id, jobs = accepted.jobs, "Batch accepted");

    state.batches.insert(handle);
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// GET /batch/{id}
pub async fn batch_status(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> ApiResult<Json<BatchStatus>> {
    let finished = state
        .batches
        .status(batch_id)
        .ok_or_else(|| ApiError::NotFound(format!("batch {}", batch_id)))?;

    Ok(Json(BatchStatus { batch_id, finished }))
}

/// Build batch routes
pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_batch))
        .route("/batch", post(submit_batch))
        .route("/batch/:batch_id", get(batch_status))
}
