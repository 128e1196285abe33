//! Completion client contract
//!
//! One call to the text-generation provider, in a non-streaming form that
//! returns the whole text and a streaming form that yields fragments in
//! arrival order. Implementations apply the fixed system instruction and
//! perform no retries.

use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;

use super::model_resolver::ResolutionError;

/// Persona applied to every prompt as the system instruction
pub const SYSTEM_INSTRUCTION: &str = "Eres un experto redactor SEO y copywriter.";

/// Forward-only sequence of text fragments from one streaming call
pub type FragmentStream = BoxStream<'static, Result<String, CompletionError>>;

/// Provider-level failures
#[derive(Debug, Clone, Error)]
pub enum CompletionError {
    #[error("The provider returned no content")]
    EmptyResult,

    #[error("The provider withheld the content under its safety policy")]
    SafetyBlocked,

    #[error("The output hit the length limit before any content was produced")]
    Truncated,

    #[error("Provider quota exceeded for model {0}")]
    QuotaExceeded(String),

    #[error("Model {0} not found")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("No model available: {0}")]
    NoModelAvailable(#[from] ResolutionError),

    #[error("Provider API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Could not decode provider response: {0}")]
    Decode(String),
}

impl CompletionError {
    /// Errors after which the cached model choice is stale
    pub fn invalidates_model(&self) -> bool {
        matches!(
            self,
            CompletionError::QuotaExceeded(_) | CompletionError::ModelNotFound(_)
        )
    }
}

/// Text-generation capability used by the stage pipeline
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Whole text of one completion
    async fn complete(&self, prompt: &str, max_output: u32) -> Result<String, CompletionError>;

    /// Fragments of one completion; the stream ends when the provider finishes
    async fn complete_stream(
        &self,
        prompt: &str,
        max_output: u32,
    ) -> Result<FragmentStream, CompletionError>;
}
