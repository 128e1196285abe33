//! Shared fakes for redactor-gen integration tests
//!
//! `ScriptedProvider` answers each stage with a canned reply and records the
//! prompts it received. `RecordingStore` keeps uploaded documents in memory.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use redactor_common::config::{DriveConfig, PipelineConfig, TomlConfig};
use redactor_common::{ProgressEvent, StageId};
use redactor_gen::models::{Credentials, DocumentRef};
use redactor_gen::services::stage_pipeline::prompts::PROMPT_OPENINGS;
use redactor_gen::services::{
    CompletionError, CompletionProvider, CredentialStore, DocumentPublisher, DocumentStore,
    EmitError, FragmentStream, OAuthClient, PersistenceError, ProgressSink, StagePipeline,
};
use redactor_gen::AppState;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Canned answer for one stage
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Fragments(Vec<String>),
    Fail(CompletionError),
    /// Streams the fragments, then fails mid-stream
    FragmentsThenFail(Vec<String>, CompletionError),
}

impl Reply {
    pub fn text(s: &str) -> Self {
        Reply::Text(s.to_string())
    }

    pub fn fragments(parts: &[&str]) -> Self {
        Reply::Fragments(parts.iter().map(|p| p.to_string()).collect())
    }
}

/// One call the provider received
#[derive(Debug, Clone)]
pub struct ProviderCall {
    pub stage: StageId,
    pub prompt: String,
    pub max_output: u32,
    pub streamed: bool,
}

/// Fake completion provider keyed on the stage each prompt belongs to
pub struct ScriptedProvider {
    replies: [Reply; 4],
    calls: Mutex<Vec<ProviderCall>>,
    /// Topics whose plan comes back empty
    empty_plan_topics: Mutex<Vec<String>>,
    /// Delay before each streamed fragment
    fragment_delay: Duration,
}

impl ScriptedProvider {
    pub fn new(plan: Reply, draft: Reply, critique: Reply, final_article: Reply) -> Self {
        Self {
            replies: [plan, draft, critique, final_article],
            calls: Mutex::new(Vec::new()),
            empty_plan_topics: Mutex::new(Vec::new()),
            fragment_delay: Duration::ZERO,
        }
    }

    /// Provider that succeeds for every stage
    pub fn happy() -> Self {
        Self::new(
            Reply::text("H1: Electric bikes\nH2: Range\nH2: Price"),
            Reply::fragments(&["<h1>Electric bikes</h1>", "<p>Range matters.</p>", "<p>So does price.</p>"]),
            Reply::text("Shorten the second paragraph."),
            Reply::fragments(&["<h1>Electric bikes</h1>", "<p>Range and price matter.</p>"]),
        )
    }

    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = delay;
        self
    }

    /// Answer the planning stage for `topic` with blank text
    pub fn empty_plan_for(&self, topic: &str) {
        self.empty_plan_topics.lock().unwrap().push(topic.to_string());
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, stage: StageId) -> Vec<ProviderCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.stage == stage)
            .collect()
    }

    fn record(&self, prompt: &str, max_output: u32, streamed: bool) -> Reply {
        let stage = stage_of(prompt);
        self.calls.lock().unwrap().push(ProviderCall {
            stage,
            prompt: prompt.to_string(),
            max_output,
            streamed,
        });
        if stage == StageId::Planning
            && self
                .empty_plan_topics
                .lock()
                .unwrap()
                .iter()
                .any(|t| prompt.contains(&format!("sobre: {}.", t)))
        {
            return Reply::Text(String::new());
        }
        self.replies[(stage.number() - 1) as usize].clone()
    }
}

/// Stage a prompt was built for, by its opening words
pub fn stage_of(prompt: &str) -> StageId {
    let stage = PROMPT_OPENINGS
        .iter()
        .position(|opening| prompt.starts_with(opening))
        .unwrap_or(3);
    StageId::ALL[stage]
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str, max_output: u32) -> Result<String, CompletionError> {
        match self.record(prompt, max_output, false) {
            Reply::Text(text) => Ok(text),
            Reply::Fragments(parts) => Ok(parts.concat()),
            Reply::Fail(err) | Reply::FragmentsThenFail(_, err) => Err(err),
        }
    }

    async fn complete_stream(
        &self,
        prompt: &str,
        max_output: u32,
    ) -> Result<FragmentStream, CompletionError> {
        let items: Vec<Result<String, CompletionError>> =
            match self.record(prompt, max_output, true) {
                Reply::Text(text) => vec![Ok(text)],
                Reply::Fragments(parts) => parts.into_iter().map(Ok).collect(),
                Reply::Fail(err) => return Err(err),
                Reply::FragmentsThenFail(parts, err) => parts
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(err)))
                    .collect(),
            };
        let delay = self.fragment_delay;
        Ok(futures::stream::iter(items)
            .then(move |item| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .boxed())
    }
}

/// Sink that keeps every event
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn emit(&self, event: ProgressEvent) -> Result<(), EmitError> {
        self.events.lock().unwrap().push(event);
        Ok(())
    }
}

/// One stored document
#[derive(Debug, Clone)]
pub struct Upload {
    pub access_token: String,
    pub title: String,
    pub html: String,
    pub folder_id: String,
}

/// In-memory document store
#[derive(Default)]
pub struct RecordingStore {
    uploads: Mutex<Vec<Upload>>,
    /// Titles whose upload fails
    failing_titles: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn fail_title(&self, title: &str) {
        self.failing_titles.lock().unwrap().push(title.to_string());
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn find_or_create_folder(
        &self,
        _access_token: &str,
        _name: &str,
    ) -> Result<String, PersistenceError> {
        Ok("folder-1".to_string())
    }

    async fn create_document(
        &self,
        access_token: &str,
        title: &str,
        html: &str,
        parent_id: &str,
    ) -> Result<DocumentRef, PersistenceError> {
        if self.failing_titles.lock().unwrap().iter().any(|t| t == title) {
            return Err(PersistenceError::Api {
                status: 500,
                message: "backend error".to_string(),
            });
        }

        let mut uploads = self.uploads.lock().unwrap();
        uploads.push(Upload {
            access_token: access_token.to_string(),
            title: title.to_string(),
            html: html.to_string(),
            folder_id: parent_id.to_string(),
        });
        let id = format!("doc-{}", uploads.len());
        Ok(DocumentRef {
            link: format!("https://docs.example.com/{}", id),
            id,
        })
    }
}

/// Single-connection in-memory database with tables created
pub async fn test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    redactor_gen::db::init_tables(&pool).await.unwrap();
    pool
}

/// Credentials that never expire
pub fn test_credentials() -> Credentials {
    Credentials {
        access_token: "access-1".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        token_endpoint: "https://oauth2.example.com/token".to_string(),
        client_id: "client".to_string(),
        client_secret: "secret".to_string(),
        scopes: vec!["https://www.googleapis.com/auth/drive.file".to_string()],
        expires_at: None,
    }
}

pub fn test_pipeline(provider: Arc<ScriptedProvider>, config: PipelineConfig) -> StagePipeline {
    StagePipeline::new(provider, config)
}

/// Publisher over `store` with `test_credentials` saved as the durable record
pub async fn test_publisher(db: SqlitePool, store: Arc<RecordingStore>) -> Arc<DocumentPublisher> {
    let oauth = Arc::new(OAuthClient::new(&DriveConfig::default()).unwrap());
    let credential_store = Arc::new(CredentialStore::new(db));
    credential_store.save(None, &test_credentials()).await.unwrap();
    Arc::new(DocumentPublisher::new(
        store,
        oauth,
        credential_store,
        "Redactor Articles".to_string(),
    ))
}

/// App state around fakes, with no pause between batch jobs
pub async fn test_app_state(
    provider: Arc<ScriptedProvider>,
    store: Arc<RecordingStore>,
) -> AppState {
    let mut config = TomlConfig::default();
    config.batch.delay_secs = 0;
    AppState::new(
        test_db().await,
        provider,
        store,
        &config,
        CancellationToken::new(),
    )
    .unwrap()
}
