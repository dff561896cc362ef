//! Transport Events
//!
//! Ordered event stream handed to the transport. Every event is tagged with
//! one of `status`, `update`, `complete` or `error` and carries a JSON payload.

use serde::Serialize;

use super::metrics::Metrics;
use super::projector::StageTransition;
use super::report::{AvailabilityFlags, FinalReport};
use super::stage::StageStatus;
use crate::types::{PulseError, SessionErrorKind};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum SessionEvent {
    /// A stage changed lifecycle state
    Status { agent: String, status: StageStatus },

    /// A new message unit with the running totals after it
    Update {
        message: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        message_type: Option<String>,
        tool_calls: u64,
        metrics: Metrics,
    },

    /// Terminal success
    Complete {
        record_id: i64,
        decision: String,
        report: FinalReport,
        availability: AvailabilityFlags,
        metrics: Metrics,
        stages: Vec<StageSummary>,
    },

    /// Terminal failure
    Error {
        kind: SessionErrorKind,
        detail: String,
    },
}

/// Final state of one stage, as reported in `complete`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageSummary {
    pub agent: String,
    pub status: StageStatus,
}

impl SessionEvent {
    pub fn status(transition: &StageTransition) -> Self {
        Self::Status {
            agent: transition.stage.name().to_string(),
            status: transition.status,
        }
    }

    pub fn error(err: &PulseError) -> Self {
        Self::Error {
            kind: err.kind().unwrap_or(SessionErrorKind::ProducerFailure),
            detail: err.to_string(),
        }
    }

    /// Event tag as it appears on the wire
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Update { .. } => "update",
            Self::Complete { .. } => "complete",
            Self::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete { .. } | Self::Error { .. })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
