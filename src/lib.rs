// Audio Unlock - coordinated, de-duplicated audio output unlocking
// Single-flight unlock attempts shared by every caller that wants sound

// Module declarations
pub mod affordance;
pub mod config;
pub mod error;
pub mod gesture;
pub mod platform;
pub mod telemetry;
pub mod unlock;

// Re-exports for convenience
pub use affordance::{ButtonLabel, ButtonStatus, UnlockButton};
pub use config::AppConfig;
pub use error::{ErrorCode, PlatformError, PreconditionError, UnlockError};
pub use gesture::{GestureTracker, InputEvent, InputEventKind};
pub use platform::{AudioPlatform, ContextState, SystemTimeSource, TimeSource};
pub use unlock::{
    AttemptOutcome, AttemptRecord, CoordinatorState, GestureOverride, UnlockCoordinator,
    UnlockStrategy,
};

/// Install a stderr `tracing` subscriber that also captures `log` records.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_is_idempotent() {
        init_logging(false);
        init_logging(true);
        log::debug!("[Test] logging initialised twice");
    }
}
