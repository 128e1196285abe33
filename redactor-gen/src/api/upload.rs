//! Upload of an already generated article

use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use super::auth::session_id;
use crate::models::DocumentRef;
use crate::{ApiError, ApiResult, AppState};

/// POST /upload-to-drive request body
#[derive(Debug, Deserialize)]
pub struct UploadRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub document: DocumentRef,
}

/// POST /upload-to-drive
pub async fn upload_to_drive(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UploadRequest>,
) -> ApiResult<Json<UploadResponse>> {
    if body.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content is required".to_string()));
    }
    let title = match body.title.trim() {
        "" => "Untitled article",
        title => title,
    };

    let session = session_id(&headers);
    let credentials = state
        .credential_store
        .lookup(session.as_deref())
        .await?
        .ok_or_else(|| ApiError::Unauthorized("document store not connected".to_string()))?;

    let publication = state
        .publisher
        .publish(session.as_deref(), &credentials, title, &body.content)
        .await?;

    Ok(Json(UploadResponse {
        document: publication.document,
    }))
}

/// Build upload routes
pub fn upload_routes() -> Router<AppState> {
    Router::new().route("/upload-to-drive", post(upload_to_drive))
}
