//! Generation run state machine
//!
//! A run progresses through four stages and ends in one terminal state:
//! PLANNING → DRAFTING → REVIEWING → FINALIZING → COMPLETE, or FAILED from any
//! non-terminal state.

use chrono::{DateTime, Utc};
use redactor_common::StageId;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Why a run ended in FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Planning failed or produced no usable outline
    PlanningFailed,
    /// Drafting failed or accumulated no content
    DraftEmpty,
    /// Reviewing failed or produced no usable critique
    ReviewFailed,
    /// Finalizing failed or accumulated no content
    FinalizeEmpty,
}

impl FailureReason {
    /// The one reason each stage can fail with
    pub fn for_stage(stage: StageId) -> Self {
        match stage {
            StageId::Planning => FailureReason::PlanningFailed,
            StageId::Drafting => FailureReason::DraftEmpty,
            StageId::Reviewing => FailureReason::ReviewFailed,
            StageId::Finalizing => FailureReason::FinalizeEmpty,
        }
    }

    pub fn stage(self) -> StageId {
        match self {
            FailureReason::PlanningFailed => StageId::Planning,
            FailureReason::DraftEmpty => StageId::Drafting,
            FailureReason::ReviewFailed => StageId::Reviewing,
            FailureReason::FinalizeEmpty => StageId::Finalizing,
        }
    }

    /// Wire code used in error events
    pub fn code(self) -> &'static str {
        match self {
            FailureReason::PlanningFailed => "planning_failed",
            FailureReason::DraftEmpty => "draft_empty",
            FailureReason::ReviewFailed => "review_failed",
            FailureReason::FinalizeEmpty => "finalize_empty",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::PlanningFailed => "Stage 1 failed (planning)",
            FailureReason::DraftEmpty => "Stage 2 failed (drafting)",
            FailureReason::ReviewFailed => "Stage 3 failed (reviewing)",
            FailureReason::FinalizeEmpty => "Stage 4 failed (finalizing)",
        };
        f.write_str(text)
    }
}

/// Run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PipelineState {
    Planning,
    Drafting,
    Reviewing,
    Finalizing,
    Complete,
    Failed,
}

impl PipelineState {
    /// State in which `stage` runs
    pub fn of_stage(stage: StageId) -> Self {
        match stage {
            StageId::Planning => PipelineState::Planning,
            StageId::Drafting => PipelineState::Drafting,
            StageId::Reviewing => PipelineState::Reviewing,
            StageId::Finalizing => PipelineState::Finalizing,
        }
    }

    /// State a successful stage hands over to
    pub fn successor(self) -> Option<Self> {
        match self {
            PipelineState::Planning => Some(PipelineState::Drafting),
            PipelineState::Drafting => Some(PipelineState::Reviewing),
            PipelineState::Reviewing => Some(PipelineState::Finalizing),
            PipelineState::Finalizing => Some(PipelineState::Complete),
            PipelineState::Complete | PipelineState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, PipelineState::Complete | PipelineState::Failed)
    }
}

/// Rejected state change
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid transition {from:?} -> {to:?}")]
pub struct InvalidTransition {
    pub from: PipelineState,
    pub to: PipelineState,
}

/// Bookkeeping for one run
///
/// Each run owns its state exclusively; nothing here is shared between runs.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub state: PipelineState,
    pub failure: Option<FailureReason>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: PipelineState::Planning,
            failure: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Move to the next stage (or COMPLETE after finalizing)
    pub fn advance(&mut self) -> Result<PipelineState, InvalidTransition> {
        let next = self.state.successor().ok_or(InvalidTransition {
            from: self.state,
            to: self.state,
        })?;
        self.state = next;
        if next.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        Ok(next)
    }

    /// Move to FAILED
    pub fn fail(&mut self, reason: FailureReason) -> Result<(), InvalidTransition> {
        if self.state.is_terminal() {
            return Err(InvalidTransition {
                from: self.state,
                to: PipelineState::Failed,
            });
        }
        self.state = PipelineState::Failed;
        self.failure = Some(reason);
        self.ended_at = Some(Utc::now());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}
