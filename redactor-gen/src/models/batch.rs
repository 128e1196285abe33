//! Batch submission types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::document::DocumentRef;
use super::pipeline_run::FailureReason;

/// One queued article
///
/// Also accepts the field names sent by spreadsheet-driven clients
/// (`palabra_clave`, `titulo_sugerido`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchJob {
    #[serde(default, alias = "palabra_clave")]
    pub topic: String,
    #[serde(default, alias = "title", alias = "titulo_sugerido")]
    pub suggested_title: Option<String>,
}

/// Body of a batch submission
#[derive(Debug, Clone, Deserialize)]
pub struct BatchSubmission {
    #[serde(default, alias = "filas")]
    pub jobs: Vec<BatchJob>,
}

/// How one job ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum JobOutcome {
    /// Generated and stored
    Uploaded { document: DocumentRef },
    /// Rejected before any stage ran
    Rejected { message: String },
    /// Generation failed; nothing was uploaded. `reason` is None for failures
    /// not tied to a stage.
    GenerationFailed {
        reason: Option<FailureReason>,
        detail: String,
    },
    /// Not stored, either because the upload failed or the store was disconnected
    NotSaved { error: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Uploaded { .. })
    }
}

/// Outcomes of a finished batch, in job order
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub batch_id: Uuid,
    pub outcomes: Vec<JobOutcome>,
    /// Set when shutdown stopped the batch before its last job
    pub cancelled: bool,
}

impl BatchReport {
    pub fn uploaded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }
}
