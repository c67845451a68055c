//! Telemetry event types describing unlock activity exposed to the
//! diagnostics CLI.

use serde::{Deserialize, Serialize};

use crate::unlock::{AttemptResult, CoordinatorState};

/// Unlock lifecycle events published on the telemetry hub.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum UnlockEvent {
    StateChanged {
        from: CoordinatorState,
        to: CoordinatorState,
        timestamp_ms: u64,
    },
    AttemptStarted {
        attempt_id: u64,
        timestamp_ms: u64,
    },
    AttemptSettled {
        attempt_id: u64,
        outcome: AttemptResult,
        duration_ms: u64,
        #[serde(skip_serializing_if = "Option::is_none", default)]
        error_code: Option<i32>,
    },
    PreconditionRejected {
        code: i32,
        reason: String,
    },
}

impl UnlockEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            UnlockEvent::StateChanged { .. } => "state_changed",
            UnlockEvent::AttemptStarted { .. } => "attempt_started",
            UnlockEvent::AttemptSettled { .. } => "attempt_settled",
            UnlockEvent::PreconditionRejected { .. } => "precondition_rejected",
        }
    }
}
