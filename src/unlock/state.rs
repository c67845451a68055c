//! Coordinator state machine and attempt log types.

use serde::{Deserialize, Serialize};

/// Unlock coordinator state
///
/// ```text
/// Uninitialized ──► Initializing ──► Initialized (terminal)
///       │              ▲    │
///       │              │    ▼
///       └──► WaitingForUser ◄── Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CoordinatorState {
    /// No attempt made yet
    #[default]
    Uninitialized,
    /// One attempt is in flight
    Initializing,
    /// Audio output is unlocked
    Initialized,
    /// The last attempt failed
    Failed,
    /// A manual gesture was explicitly requested
    WaitingForUser,
}

impl CoordinatorState {
    pub fn description(&self) -> &'static str {
        match self {
            CoordinatorState::Uninitialized => "Audio not yet unlocked",
            CoordinatorState::Initializing => "Unlocking audio",
            CoordinatorState::Initialized => "Audio unlocked",
            CoordinatorState::Failed => "Audio unlock failed",
            CoordinatorState::WaitingForUser => "Waiting for user to enable audio",
        }
    }

    /// Whether the coordinator may move from `self` to `next`.
    pub fn can_transition_to(&self, next: CoordinatorState) -> bool {
        use CoordinatorState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Failed, Initializing)
                | (WaitingForUser, Initializing)
                | (Initializing, Initialized)
                | (Initializing, Failed)
                | (Uninitialized, WaitingForUser)
                | (Failed, WaitingForUser)
        )
    }

    /// States in which the manual "Enable Audio" button is offered.
    pub fn shows_unlock_button(&self) -> bool {
        matches!(
            self,
            CoordinatorState::Failed | CoordinatorState::WaitingForUser
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CoordinatorState::Initialized)
    }
}

/// Outcome column of the attempt log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptResult {
    Success,
    Failure,
}

/// One row of the append-only attempt log.
///
/// Timestamps are milliseconds since the coordinator was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub id: u64,
    pub started_ms: u64,
    pub settled_ms: u64,
    pub outcome: AttemptResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state() {
        assert_eq!(CoordinatorState::default(), CoordinatorState::Uninitialized);
    }

    #[test]
    fn test_allowed_transitions() {
        use CoordinatorState::*;
        assert!(Uninitialized.can_transition_to(Initializing));
        assert!(Initializing.can_transition_to(Initialized));
        assert!(Initializing.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Initializing));
        assert!(Failed.can_transition_to(WaitingForUser));
        assert!(WaitingForUser.can_transition_to(Initializing));
    }

    #[test]
    fn test_initialized_is_terminal() {
        use CoordinatorState::*;
        for next in [Uninitialized, Initializing, Failed, WaitingForUser] {
            assert!(!Initialized.can_transition_to(next));
        }
        assert!(Initialized.is_terminal());
    }

    #[test]
    fn test_rejected_transitions() {
        use CoordinatorState::*;
        assert!(!Uninitialized.can_transition_to(Initialized));
        assert!(!Uninitialized.can_transition_to(Failed));
        assert!(!Initializing.can_transition_to(Initializing));
        assert!(!Initializing.can_transition_to(WaitingForUser));
    }

    #[test]
    fn test_button_states() {
        assert!(CoordinatorState::Failed.shows_unlock_button());
        assert!(CoordinatorState::WaitingForUser.shows_unlock_button());
        assert!(!CoordinatorState::Initialized.shows_unlock_button());
        assert!(!CoordinatorState::Initializing.shows_unlock_button());
        assert!(!CoordinatorState::Uninitialized.shows_unlock_button());
    }

    #[test]
    fn test_record_omits_missing_error_code() {
        let record = AttemptRecord {
            id: 1,
            started_ms: 10,
            settled_ms: 20,
            outcome: AttemptResult::Success,
            error_code: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("error_code"));
    }
}
