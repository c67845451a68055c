// Unlock attempt error types and constants

use crate::error::{ErrorCode, PlatformError, PreconditionError};
use crate::unlock::UnlockStrategy;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unlock error code constants
///
/// Precondition refusals keep their own 3xxx codes; the codes below cover
/// attempts that actually ran (or could not be started).
///
/// Error code range: 5001-5003
pub struct UnlockErrorCodes {}

impl UnlockErrorCodes {
    /// Every strategy in the chain failed
    pub const EXECUTION_FAILED: i32 = 5001;

    /// The attempt task died before reporting an outcome
    pub const ABORTED: i32 = 5002;

    /// No tokio runtime to drive the attempt
    pub const RUNTIME_UNAVAILABLE: i32 = 5003;
}

/// One failed step of the unlock strategy chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyFailure {
    pub strategy: UnlockStrategy,
    pub error: PlatformError,
}

/// Log an unlock error at the level its kind deserves
///
/// Precondition refusals are routine and stay at debug level. Execution
/// failures are warnings: they are recoverable by retry and surface in the UI
/// through the unlock button rather than as hard errors.
pub fn log_unlock_error(err: &UnlockError, context: &str) {
    if err.is_precondition() {
        debug!(
            "[UnlockCoordinator] {} skipped: code={}, message={}",
            context,
            err.code(),
            err.message()
        );
    } else {
        warn!(
            "Unlock error in {}: code={}, component=UnlockCoordinator, message={}",
            context,
            err.code(),
            err.message()
        );
    }
}

/// Errors returned to callers of the unlock coordinator.
///
/// Cloneable so one settled attempt can hand the same outcome to every caller
/// that joined it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum UnlockError {
    /// Request refused before any platform call
    Precondition(PreconditionError),

    /// All strategies failed
    Execution { failures: Vec<StrategyFailure> },

    /// Attempt task was cancelled or panicked
    Aborted { reason: String },

    /// Called outside a tokio runtime
    RuntimeUnavailable,
}

impl UnlockError {
    /// True for refusals that must not be shown to the user.
    pub fn is_precondition(&self) -> bool {
        matches!(self, UnlockError::Precondition(_))
    }

    pub fn precondition(&self) -> Option<PreconditionError> {
        match self {
            UnlockError::Precondition(reason) => Some(*reason),
            _ => None,
        }
    }

    /// Last platform error of an execution failure, if any.
    pub fn last_platform_error(&self) -> Option<&PlatformError> {
        match self {
            UnlockError::Execution { failures } => failures.last().map(|failure| &failure.error),
            _ => None,
        }
    }
}

impl From<PreconditionError> for UnlockError {
    fn from(err: PreconditionError) -> Self {
        UnlockError::Precondition(err)
    }
}

impl ErrorCode for UnlockError {
    fn code(&self) -> i32 {
        match self {
            UnlockError::Precondition(reason) => reason.code(),
            UnlockError::Execution { .. } => UnlockErrorCodes::EXECUTION_FAILED,
            UnlockError::Aborted { .. } => UnlockErrorCodes::ABORTED,
            UnlockError::RuntimeUnavailable => UnlockErrorCodes::RUNTIME_UNAVAILABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            UnlockError::Precondition(reason) => reason.message(),
            UnlockError::Execution { failures } if failures.is_empty() => {
                "No unlock strategy was applicable".to_string()
            }
            UnlockError::Execution { failures } => {
                let steps: Vec<String> = failures
                    .iter()
                    .map(|failure| format!("{}: {}", failure.strategy.as_str(), failure.error.message()))
                    .collect();
                format!("All unlock strategies failed ({})", steps.join("; "))
            }
            UnlockError::Aborted { reason } => format!("Unlock attempt aborted: {}", reason),
            UnlockError::RuntimeUnavailable => {
                "No tokio runtime available to run the unlock attempt".to_string()
            }
        }
    }
}

impl fmt::Display for UnlockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "UnlockError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for UnlockError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn execution_failure() -> UnlockError {
        UnlockError::Execution {
            failures: vec![
                StrategyFailure {
                    strategy: UnlockStrategy::CreateAndResume,
                    error: PlatformError::ResumeRejected {
                        reason: "blocked".to_string(),
                    },
                },
                StrategyFailure {
                    strategy: UnlockStrategy::SilentPrimer,
                    error: PlatformError::StillSuspended,
                },
            ],
        }
    }

    #[test]
    fn test_unlock_error_codes() {
        assert_eq!(
            UnlockError::Precondition(PreconditionError::NoUserGesture).code(),
            3004
        );
        assert_eq!(execution_failure().code(), 5001);
        assert_eq!(
            UnlockError::Aborted {
                reason: "test".to_string()
            }
            .code(),
            5002
        );
        assert_eq!(UnlockError::RuntimeUnavailable.code(), 5003);
    }

    #[test]
    fn test_unlock_error_display_format() {
        let display = UnlockError::RuntimeUnavailable.to_string();
        assert!(display.starts_with("UnlockError::RuntimeUnavailable (code 5003): "));

        let display = execution_failure().to_string();
        assert!(display.starts_with("UnlockError::Execution"));
        assert!(display.contains("(code 5001)"));
    }

    #[test]
    fn test_precondition_classification() {
        let err: UnlockError = PreconditionError::Debounced { retry_in_ms: 10 }.into();
        assert!(err.is_precondition());
        assert_eq!(
            err.precondition(),
            Some(PreconditionError::Debounced { retry_in_ms: 10 })
        );
        assert!(!execution_failure().is_precondition());
        assert_eq!(execution_failure().precondition(), None);
    }

    #[test]
    fn test_execution_message_lists_each_strategy() {
        let message = execution_failure().message();
        assert!(message.contains("create_and_resume"));
        assert!(message.contains("silent_primer"));
        assert!(message.contains("blocked"));
    }

    #[test]
    fn test_last_platform_error() {
        assert_eq!(
            execution_failure().last_platform_error(),
            Some(&PlatformError::StillSuspended)
        );
        assert_eq!(UnlockError::RuntimeUnavailable.last_platform_error(), None);
    }
}
