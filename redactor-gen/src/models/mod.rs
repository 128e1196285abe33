//! Data models for redactor-gen

pub mod batch;
pub mod credentials;
pub mod document;
pub mod generation;
pub mod pipeline_run;

pub use batch::{BatchJob, BatchReport, BatchSubmission, JobOutcome};
pub use credentials::Credentials;
pub use document::DocumentRef;
pub use generation::{GeneratedArticle, GenerationRequest, StageResult, TopicRecord};
pub use pipeline_run::{FailureReason, InvalidTransition, PipelineRun, PipelineState};
