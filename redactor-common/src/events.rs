//! Progress events emitted by one generation run
//!
//! Events travel to the client as newline-delimited JSON, one object per line,
//! tagged by `status`. For a single run they are ordered stage 1 → 2 → 3 → 4 and
//! end with exactly one `complete` or `error` event.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Generation stage, serialized as its number (1-4)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum StageId {
    Planning,
    Drafting,
    Reviewing,
    Finalizing,
}

impl StageId {
    pub const ALL: [StageId; 4] = [
        StageId::Planning,
        StageId::Drafting,
        StageId::Reviewing,
        StageId::Finalizing,
    ];

    pub fn number(self) -> u8 {
        match self {
            StageId::Planning => 1,
            StageId::Drafting => 2,
            StageId::Reviewing => 3,
            StageId::Finalizing => 4,
        }
    }

    /// Stages whose output reaches the client fragment by fragment
    pub fn is_streamed(self) -> bool {
        matches!(self, StageId::Drafting | StageId::Finalizing)
    }

    pub fn label(self) -> &'static str {
        match self {
            StageId::Planning => "planning",
            StageId::Drafting => "drafting",
            StageId::Reviewing => "reviewing",
            StageId::Finalizing => "finalizing",
        }
    }
}

impl From<StageId> for u8 {
    fn from(stage: StageId) -> u8 {
        stage.number()
    }
}

impl TryFrom<u8> for StageId {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(StageId::Planning),
            2 => Ok(StageId::Drafting),
            3 => Ok(StageId::Reviewing),
            4 => Ok(StageId::Finalizing),
            other => Err(format!("stage must be 1-4, got {}", other)),
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One line of the progress stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A stage started
    PhaseStart { phase: StageId, message: String },

    /// A streamed fragment of the drafting or finalizing output
    PhaseChunk { phase: StageId, chunk: String },

    /// A stage finished; non-streamed stages carry their full output
    PhaseDone {
        phase: StageId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<String>,
        /// Later stages only see a prefix of this output
        #[serde(default)]
        truncated: bool,
    },

    /// The run failed; nothing follows
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        phase: Option<StageId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
        message: String,
    },

    /// The run finished; nothing follows
    Complete {
        final_article: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        plan: Option<String>,
    },
}

impl ProgressEvent {
    /// Stage this event belongs to (terminal `complete` has none)
    pub fn phase(&self) -> Option<StageId> {
        match self {
            ProgressEvent::PhaseStart { phase, .. }
            | ProgressEvent::PhaseChunk { phase, .. }
            | ProgressEvent::PhaseDone { phase, .. } => Some(*phase),
            ProgressEvent::Error { phase, .. } => *phase,
            ProgressEvent::Complete { .. } => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProgressEvent::Error { .. } | ProgressEvent::Complete { .. }
        )
    }

    /// Encode as one NDJSON line, trailing newline included
    pub fn to_ndjson_line(&self) -> crate::Result<String> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phase_start_wire_shape() {
        let event = ProgressEvent::PhaseStart {
            phase: StageId::Planning,
            message: "Planning outline".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"status": "phase_start", "phase": 1, "message": "Planning outline"})
        );
    }

    #[test]
    fn test_error_without_phase_omits_field() {
        let event = ProgressEvent::Error {
            phase: None,
            reason: None,
            message: "topic is required".to_string(),
        };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value, json!({"status": "error", "message": "topic is required"}));
        assert!(event.is_terminal());
        assert_eq!(event.phase(), None);
    }

    #[test]
    fn test_ndjson_line_is_single_line() {
        let event = ProgressEvent::PhaseChunk {
            phase: StageId::Drafting,
            chunk: "<p>line one\nline two</p>".to_string(),
        };
        let line = event.to_ndjson_line().unwrap();
        assert!(line.ends_with('\n'));
        assert_eq!(line.matches('\n').count(), 1);

        let parsed: ProgressEvent = serde_json::from_str(line.trim_end()).unwrap();
        assert_eq!(parsed, event);
    }

    #[test]
    fn test_stage_number_out_of_range_rejected() {
        let result: Result<ProgressEvent, _> =
            serde_json::from_value(json!({"status": "phase_done", "phase": 5}));
        assert!(result.is_err());
    }

    #[test]
    fn test_stage_ordering_follows_pipeline() {
        assert!(StageId::Planning < StageId::Drafting);
        assert!(StageId::Reviewing < StageId::Finalizing);
        assert!(StageId::Drafting.is_streamed());
        assert!(!StageId::Reviewing.is_streamed());
    }
}
