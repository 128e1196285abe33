//! redactor-gen library interface
//!
//! Exposes the router, state and services for the binary and for tests.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use redactor_common::config::TomlConfig;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::services::{
    BatchRegistry, BatchRunner, CompletionProvider, CredentialStore, DocumentPublisher,
    DocumentStore, OAuthClient, PendingAuthorizations, StagePipeline,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Settings database (credentials, last topic)
    pub db: SqlitePool,
    pub pipeline: Arc<StagePipeline>,
    pub credential_store: Arc<CredentialStore>,
    pub oauth: Arc<OAuthClient>,
    /// OAuth states awaiting their callback
    pub authorizations: Arc<PendingAuthorizations>,
    pub publisher: Arc<DocumentPublisher>,
    pub batch_runner: BatchRunner,
    /// Batches started by this process
    pub batches: Arc<BatchRegistry>,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the services around a provider and a document store
    pub fn new(
        db: SqlitePool,
        provider: Arc<dyn CompletionProvider>,
        document_store: Arc<dyn DocumentStore>,
        config: &TomlConfig,
        shutdown: CancellationToken,
    ) -> redactor_common::Result<Self> {
        let pipeline = Arc::new(StagePipeline::new(provider, config.pipeline.clone()));
        let credential_store = Arc::new(CredentialStore::new(db.clone()));
        let oauth = Arc::new(
            OAuthClient::new(&config.drive)
                .map_err(|e| redactor_common::Error::Config(e.to_string()))?,
        );
        let publisher = Arc::new(DocumentPublisher::new(
            document_store,
            oauth.clone(),
            credential_store.clone(),
            config.drive.folder_name.clone(),
        ));
        let batch_runner = BatchRunner::new(
            pipeline.clone(),
            publisher.clone(),
            Duration::from_secs(config.batch.delay_secs),
            shutdown,
        );

        Ok(Self {
            db,
            pipeline,
            credential_store,
            oauth,
            authorizations: Arc::new(PendingAuthorizations::new()),
            publisher,
            batch_runner,
            batches: Arc::new(BatchRegistry::new()),
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::generate_routes())
        .merge(api::batch_routes())
        .merge(api::auth_routes())
        .merge(api::upload_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        // Spreadsheet scripts and the browser UI call from other origins
        .layer(CorsLayer::permissive())
        .with_state(state)
}
