//! OAuth 2.0 authorization-code flow for the document store

use chrono::{Duration as ChronoDuration, Utc};
use redactor_common::config::DriveConfig;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use super::document_store::PersistenceError;
use crate::models::Credentials;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// OAuth client for the consent screen and the token endpoint
pub struct OAuthClient {
    http_client: reqwest::Client,
    config: DriveConfig,
}

impl OAuthClient {
    pub fn new(config: &DriveConfig) -> Result<Self, PersistenceError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            config: config.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.config.client_id.trim().is_empty() && !self.config.client_secret.trim().is_empty()
    }

    /// Consent screen URL carrying `state`
    pub fn authorization_url(&self, state: &str) -> Result<String, PersistenceError> {
        let scopes = self.config.scopes.join(" ");
        let url = reqwest::Url::parse_with_params(
            &self.config.auth_uri,
            &[
                ("response_type", "code"),
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("scope", scopes.as_str()),
                ("access_type", "offline"),
                ("prompt", "consent"),
                ("include_granted_scopes", "true"),
                ("state", state),
            ],
        )
        .map_err(|e| PersistenceError::Decode(format!("invalid auth_uri: {}", e)))?;

        Ok(url.to_string())
    }

    /// Trade an authorization code for credentials
    pub async fn exchange_code(&self, code: &str) -> Result<Credentials, PersistenceError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
        ];

        let token = self
            .token_request(&self.config.token_uri, &params)
            .await
            .map_err(|e| match e {
                PersistenceError::RefreshFailed(msg) => PersistenceError::Unauthorized(msg),
                other => other,
            })?;

        info!("Authorization code exchanged for credentials");
        Ok(Credentials {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            token_endpoint: self.config.token_uri.clone(),
            client_id: self.config.client_id.clone(),
            client_secret: self.config.client_secret.clone(),
            scopes: token
                .scope
                .map(|s| s.split_whitespace().map(str::to_string).collect())
                .unwrap_or_else(|| self.config.scopes.clone()),
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        })
    }

    /// New access token for `credentials`, keeping the refresh token when none is returned
    pub async fn refresh(&self, credentials: &Credentials) -> Result<Credentials, PersistenceError> {
        let refresh_token = credentials
            .refresh_token
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| PersistenceError::RefreshFailed("no refresh token".to_string()))?;

        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        let token = self
            .token_request(&credentials.token_endpoint, &params)
            .await?;

        info!("Access token refreshed");
        Ok(Credentials {
            access_token: token.access_token,
            refresh_token: token
                .refresh_token
                .or_else(|| credentials.refresh_token.clone()),
            token_endpoint: credentials.token_endpoint.clone(),
            client_id: credentials.client_id.clone(),
            client_secret: credentials.client_secret.clone(),
            scopes: credentials.scopes.clone(),
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + ChronoDuration::seconds(secs)),
        })
    }

    async fn token_request(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<TokenResponse, PersistenceError> {
        let response = self
            .http_client
            .post(endpoint)
            .form(params)
            .send()
            .await
            .map_err(|e| PersistenceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Token endpoint rejected the request");
            return Err(PersistenceError::RefreshFailed(format!("{}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| PersistenceError::Decode(e.to_string()))
    }
}

const PENDING_STATE_TTL: Duration = Duration::from_secs(10 * 60);

/// Authorization requests awaiting their callback, keyed by CSRF state
///
/// States older than the TTL are rejected and dropped on the next `begin`.
#[derive(Debug)]
pub struct PendingAuthorizations {
    states: Mutex<HashMap<String, (String, Instant)>>,
    ttl: Duration,
}

impl Default for PendingAuthorizations {
    fn default() -> Self {
        Self::with_ttl(PENDING_STATE_TTL)
    }
}

impl PendingAuthorizations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Issue a state for `session_id`
    pub async fn begin(&self, session_id: &str) -> String {
        let state = Uuid::new_v4().simple().to_string();
        let mut states = self.states.lock().await;
        states.retain(|_, (_, issued_at)| issued_at.elapsed() < self.ttl);
        states.insert(state.clone(), (session_id.to_string(), Instant::now()));
        state
    }

    /// Session that issued `state`; each state is accepted once, before it expires
    pub async fn complete(&self, state: &str) -> Option<String> {
        let (session_id, issued_at) = self.states.lock().await.remove(state)?;
        if issued_at.elapsed() >= self.ttl {
            warn!("Authorization state expired");
            return None;
        }
        Some(session_id)
    }

    /// States currently awaiting a callback
    pub async fn len(&self) -> usize {
        self.states.lock().await.len()
    }
}
