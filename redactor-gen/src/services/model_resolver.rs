//! Provider model selection
//!
//! Candidates are tried in preference order. A candidate that is over quota or
//! unknown to the provider is skipped; any other probe failure stops the
//! resolution. The choice is cached by the client that owns the [`ModelCache`]
//! and cleared when a later call reports quota or not-found.

use thiserror::Error;
use tokio::sync::RwLock;

/// Result of probing one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Available,
    QuotaExceeded,
    NotFound,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("No candidate models configured")]
    NoCandidates,

    #[error("No usable model among candidates: {}", skipped.join(", "))]
    Exhausted { skipped: Vec<String> },

    #[error("Probing model {model} failed: {message}")]
    ProbeFailed { model: String, message: String },
}

/// Pick the first available candidate from probe outcomes listed in preference order
pub fn resolve_model(probes: &[(String, ProbeOutcome)]) -> Result<String, ResolutionError> {
    if probes.is_empty() {
        return Err(ResolutionError::NoCandidates);
    }

    let mut skipped = Vec::new();
    for (model, outcome) in probes {
        match outcome {
            ProbeOutcome::Available => return Ok(model.clone()),
            ProbeOutcome::QuotaExceeded | ProbeOutcome::NotFound => skipped.push(model.clone()),
            ProbeOutcome::Failed(message) => {
                return Err(ResolutionError::ProbeFailed {
                    model: model.clone(),
                    message: message.clone(),
                })
            }
        }
    }

    Err(ResolutionError::Exhausted { skipped })
}

/// Cached model choice
#[derive(Debug, Default)]
pub struct ModelCache {
    selected: RwLock<Option<String>>,
}

impl ModelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self) -> Option<String> {
        self.selected.read().await.clone()
    }

    pub async fn set(&self, model: String) {
        *self.selected.write().await = Some(model);
    }

    /// Forget the choice so the next call resolves again
    pub async fn clear(&self) {
        *self.selected.write().await = None;
    }
}
