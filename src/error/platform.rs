// Platform audio error types and constants

use crate::error::ErrorCode;
use log::error;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform error code constants
///
/// Error code range: 4001-4006
pub struct PlatformErrorCodes {}

impl PlatformErrorCodes {
    /// No output device could be opened
    pub const NO_OUTPUT_DEVICE: i32 = 4001;

    /// Creating an audio context failed
    pub const CONTEXT_CREATE_FAILED: i32 = 4002;

    /// The platform rejected a resume call
    pub const RESUME_REJECTED: i32 = 4003;

    /// Resume returned but the context stayed suspended
    pub const STILL_SUSPENDED: i32 = 4004;

    /// The context was closed underneath us
    pub const CONTEXT_CLOSED: i32 = 4005;

    /// Primer buffer playback failed
    pub const PLAYBACK_FAILED: i32 = 4006;
}

/// Log a platform error with structured context
///
/// Platform failures are diagnostics for developers; the raw detail is never
/// shown verbatim to the end user.
pub fn log_platform_error(err: &PlatformError, context: &str) {
    error!(
        "Platform error in {}: code={}, component=AudioPlatform, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by an [`AudioPlatform`](crate::platform::AudioPlatform) call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlatformError {
    /// No default output device available
    NoOutputDevice,

    /// Audio context could not be created
    ContextCreateFailed { reason: String },

    /// Resume was rejected by the platform
    ResumeRejected { reason: String },

    /// Resume was silently ignored
    StillSuspended,

    /// Context is closed and cannot be resumed
    ContextClosed,

    /// Playing the primer buffer failed
    PlaybackFailed { reason: String },
}

impl ErrorCode for PlatformError {
    fn code(&self) -> i32 {
        match self {
            PlatformError::NoOutputDevice => PlatformErrorCodes::NO_OUTPUT_DEVICE,
            PlatformError::ContextCreateFailed { .. } => PlatformErrorCodes::CONTEXT_CREATE_FAILED,
            PlatformError::ResumeRejected { .. } => PlatformErrorCodes::RESUME_REJECTED,
            PlatformError::StillSuspended => PlatformErrorCodes::STILL_SUSPENDED,
            PlatformError::ContextClosed => PlatformErrorCodes::CONTEXT_CLOSED,
            PlatformError::PlaybackFailed { .. } => PlatformErrorCodes::PLAYBACK_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            PlatformError::NoOutputDevice => "No audio output device found".to_string(),
            PlatformError::ContextCreateFailed { reason } => {
                format!("Failed to create audio context: {}", reason)
            }
            PlatformError::ResumeRejected { reason } => {
                format!("Audio context resume rejected: {}", reason)
            }
            PlatformError::StillSuspended => {
                "Audio context still suspended after resume".to_string()
            }
            PlatformError::ContextClosed => "Audio context is closed".to_string(),
            PlatformError::PlaybackFailed { reason } => {
                format!("Primer playback failed: {}", reason)
            }
        }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PlatformError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for PlatformError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_codes() {
        assert_eq!(PlatformError::NoOutputDevice.code(), 4001);
        assert_eq!(
            PlatformError::ContextCreateFailed {
                reason: "test".to_string()
            }
            .code(),
            4002
        );
        assert_eq!(
            PlatformError::ResumeRejected {
                reason: "test".to_string()
            }
            .code(),
            4003
        );
        assert_eq!(PlatformError::StillSuspended.code(), 4004);
        assert_eq!(PlatformError::ContextClosed.code(), 4005);
        assert_eq!(
            PlatformError::PlaybackFailed {
                reason: "test".to_string()
            }
            .code(),
            4006
        );
    }

    #[test]
    fn test_platform_error_display() {
        let err = PlatformError::ResumeRejected {
            reason: "not allowed".to_string(),
        };
        let display = format!("{}", err);
        assert!(display.contains("PlatformError"));
        assert!(display.contains("4003"));
        assert!(display.contains("not allowed"));
    }
}
