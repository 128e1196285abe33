//! Services for redactor-gen
//!
//! Generation: completion client, stage pipeline, progress emitter, batch runner.
//! Persistence: OAuth flow, credential store, document store and publisher.

pub mod batch_runner;
pub mod completion_client;
pub mod credential_store;
pub mod document_publisher;
pub mod document_store;
pub mod drive_client;
pub mod gemini_client;
pub mod model_resolver;
pub mod oauth_client;
pub mod progress_emitter;
pub mod sse_decoder;
pub mod stage_pipeline;

pub use batch_runner::{BatchHandle, BatchRegistry, BatchRunner};
pub use completion_client::{CompletionError, CompletionProvider, FragmentStream};
pub use credential_store::CredentialStore;
pub use document_publisher::{DocumentPublisher, Publication};
pub use document_store::{DocumentStore, PersistenceError};
pub use drive_client::DriveClient;
pub use gemini_client::GeminiClient;
pub use oauth_client::{OAuthClient, PendingAuthorizations};
pub use progress_emitter::{ndjson_lines, ChannelEmitter, EmitError, NullSink, ProgressSink};
pub use stage_pipeline::{PipelineError, StagePipeline};
