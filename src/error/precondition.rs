// Precondition error types and constants

use crate::error::ErrorCode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Precondition error code constants
///
/// Error code range: 3001-3005
pub struct PreconditionErrorCodes {}

impl PreconditionErrorCodes {
    /// Audio output is already unlocked
    pub const ALREADY_INITIALIZED: i32 = 3001;

    /// Another unlock attempt is live
    pub const IN_PROGRESS: i32 = 3002;

    /// Previous attempt settled inside the debounce window
    pub const DEBOUNCED: i32 = 3003;

    /// No trusted user gesture inside the gesture window
    pub const NO_USER_GESTURE: i32 = 3004;

    /// Application warm-up has not elapsed
    pub const APP_NOT_READY: i32 = 3005;
}

/// Reasons an unlock request is refused before any platform call is made.
///
/// These are expected and frequent. They are never surfaced to the user and
/// never logged above debug level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PreconditionError {
    /// Coordinator already reached `Initialized`
    AlreadyInitialized,

    /// Coordinator is `Initializing`
    InProgress,

    /// Last attempt settled less than the debounce window ago
    Debounced { retry_in_ms: u64 },

    /// No recent trusted gesture and no explicit override
    NoUserGesture,

    /// Warm-up timer still running
    AppNotReady { ready_in_ms: u64 },
}

impl ErrorCode for PreconditionError {
    fn code(&self) -> i32 {
        match self {
            PreconditionError::AlreadyInitialized => PreconditionErrorCodes::ALREADY_INITIALIZED,
            PreconditionError::InProgress => PreconditionErrorCodes::IN_PROGRESS,
            PreconditionError::Debounced { .. } => PreconditionErrorCodes::DEBOUNCED,
            PreconditionError::NoUserGesture => PreconditionErrorCodes::NO_USER_GESTURE,
            PreconditionError::AppNotReady { .. } => PreconditionErrorCodes::APP_NOT_READY,
        }
    }

    fn message(&self) -> String {
        match self {
            PreconditionError::AlreadyInitialized => "Audio output already unlocked".to_string(),
            PreconditionError::InProgress => "Unlock attempt already in progress".to_string(),
            PreconditionError::Debounced { retry_in_ms } => {
                format!("Unlock debounced, retry in {}ms", retry_in_ms)
            }
            PreconditionError::NoUserGesture => {
                "No recent user gesture to unlock audio with".to_string()
            }
            PreconditionError::AppNotReady { ready_in_ms } => {
                format!("Application warming up, ready in {}ms", ready_in_ms)
            }
        }
    }
}

impl fmt::Display for PreconditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PreconditionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PreconditionError {}
