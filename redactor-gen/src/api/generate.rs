//! Article generation endpoints
//!
//! POST /generate runs the four-stage pipeline for one topic. By default the
//! response is an NDJSON stream of progress events; with `stream: false` the
//! handler waits and returns the whole article as one JSON document.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::auth::session_id;
use crate::db::settings;
use crate::models::{DocumentRef, GeneratedArticle, GenerationRequest, TopicRecord};
use crate::services::{ndjson_lines, ChannelEmitter, NullSink};
use crate::{ApiError, ApiResult, AppState};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// POST /generate request body
#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_stream")]
    pub stream: bool,
    #[serde(default)]
    pub save_to_drive: bool,
}

fn default_stream() -> bool {
    true
}

/// Result of the optional upload after a non-streamed generation
#[derive(Debug, Serialize)]
pub struct DriveStatus {
    pub saved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<DocumentRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Non-streamed POST /generate response
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    #[serde(flatten)]
    pub article: GeneratedArticle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drive: Option<DriveStatus>,
}

/// POST /generate
pub async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GenerateRequest>,
) -> ApiResult<Response> {
    let request = GenerationRequest::new(body.topic, body.title)?;
    record_last_topic(&state, &request).await;

    if body.stream {
        if body.save_to_drive {
            warn!("save_to_drive ignored for streamed generation");
        }
        return Ok(stream_generation(&state, request));
    }

    let article = state.pipeline.run(&request, &NullSink).await?;

    let drive = if body.save_to_drive {
        Some(save_article(&state, &headers, &request, &article).await)
    } else {
        None
    };

    Ok(Json(GenerateResponse { article, drive }).into_response())
}

/// Run the pipeline on its own task and stream its events as they arrive
fn stream_generation(state: &AppState, request: GenerationRequest) -> Response {
    let (emitter, rx) = ChannelEmitter::channel();
    let pipeline = state.pipeline.clone();

    tokio::spawn(async move {
        // Outcome already reported through the emitter
        let _ = pipeline.run(&request, &emitter).await;
    });

    let body = Body::from_stream(ndjson_lines(rx));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn save_article(
    state: &AppState,
    headers: &HeaderMap,
    request: &GenerationRequest,
    article: &GeneratedArticle,
) -> DriveStatus {
    let session = session_id(headers);
    let credentials = match state.credential_store.lookup(session.as_deref()).await {
        Ok(Some(credentials)) => credentials,
        Ok(None) => {
            return DriveStatus {
                saved: false,
                document: None,
                error: Some("document store not connected".to_string()),
            }
        }
        Err(e) => {
            return DriveStatus {
                saved: false,
                document: None,
                error: Some(e.to_string()),
            }
        }
    };

    match state
        .publisher
        .publish(
            session.as_deref(),
            &credentials,
            request.document_title(),
            &article.final_article,
        )
        .await
    {
        Ok(publication) => DriveStatus {
            saved: true,
            document: Some(publication.document),
            error: None,
        },
        Err(e) => {
            warn!("Article generated but not saved: {}", e);
            DriveStatus {
                saved: false,
                document: None,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn record_last_topic(state: &AppState, request: &GenerationRequest) {
    let record = TopicRecord::from_request(request);
    if let Err(e) = settings::set_last_topic(&state.db, &record).await {
        warn!("Failed to record last topic: {}", e);
    } else {
        info!(topic = %record.topic, "Topic submitted");
    }
}

/// GET /last-topic
pub async fn last_topic(State(state): State<AppState>) -> ApiResult<Json<TopicRecord>> {
    settings::get_last_topic(&state.db)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("no topic submitted yet".to_string()))
}

/// Build generation routes
pub fn generate_routes() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generate))
        .route("/last-topic", get(last_topic))
}
