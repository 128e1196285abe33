//! Document store authorization
//!
//! Each browser gets a session cookie on its first authorization attempt.
//! Credentials obtained through the callback land in that session and in the
//! durable settings record.

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{ApiError, ApiResult, AppState};

/// Cookie carrying the session id
pub const SESSION_COOKIE: &str = "redactor_session";

/// Session id from the request's cookies
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

fn session_cookie(session_id: &str) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, session_id
    ))
    .map_err(|e| ApiError::Internal(e.to_string()))
}

/// GET /authorize
pub async fn authorize(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    if !state.oauth.is_configured() {
        return Err(ApiError::Internal(
            "OAuth client id and secret are not configured".to_string(),
        ));
    }

    let session = session_id(&headers).unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    let csrf_state = state.authorizations.begin(&session).await;
    let url = state.oauth.authorization_url(&csrf_state)?;

    let mut response = Redirect::to(&url).into_response();
    response
        .headers_mut()
        .insert(header::SET_COOKIE, session_cookie(&session)?);
    Ok(response)
}

/// GET /oauth2callback query
#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub state: Option<String>,
    pub code: Option<String>,
    pub error: Option<String>,
}

/// GET /oauth2callback
pub async fn oauth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> ApiResult<Redirect> {
    if let Some(error) = params.error {
        warn!("Authorization denied: {}", error);
        return Err(ApiError::Unauthorized(format!("authorization denied: {}", error)));
    }

    let csrf_state = params
        .state
        .ok_or_else(|| ApiError::BadRequest("missing state".to_string()))?;
    let code = params
        .code
        .ok_or_else(|| ApiError::BadRequest("missing code".to_string()))?;

    let session = state
        .authorizations
        .complete(&csrf_state)
        .await
        .ok_or_else(|| ApiError::Unauthorized("unknown or reused state".to_string()))?;

    let credentials = state.oauth.exchange_code(&code).await?;
    state
        .credential_store
        .save(Some(session.as_str()), &credentials)
        .await?;

    info!("Document store connected");
    Ok(Redirect::to("/"))
}

/// POST /disconnect
pub async fn disconnect(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<AuthStatus>> {
    let session = session_id(&headers);
    state.credential_store.disconnect(session.as_deref()).await?;
    Ok(Json(AuthStatus { connected: false }))
}

#[derive(Debug, Serialize)]
pub struct AuthStatus {
    pub connected: bool,
}

/// GET /auth/status
pub async fn auth_status(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<AuthStatus>> {
    let session = session_id(&headers);
    let connected = state
        .credential_store
        .is_connected(session.as_deref())
        .await?;
    Ok(Json(AuthStatus { connected }))
}

/// Build authorization routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/authorize", get(authorize))
        .route("/oauth2callback", get(oauth_callback))
        .route("/disconnect", post(disconnect))
        .route("/auth/status", get(auth_status))
}
