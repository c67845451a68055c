// Error types for the audio unlock coordinator
//
// This module defines custom error types for unlock preconditions, platform audio
// calls and whole unlock attempts, with numeric error codes for UI and diagnostics.

mod platform;
mod precondition;
mod unlock;

pub use platform::{log_platform_error, PlatformError, PlatformErrorCodes};
pub use precondition::{PreconditionError, PreconditionErrorCodes};
pub use unlock::{log_unlock_error, StrategyFailure, UnlockError, UnlockErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the UI boundary and the diagnostics log.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
