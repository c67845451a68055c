//! Platform abstractions for audio unlocking.
//!
//! The coordinator never talks to an audio API directly; it goes through
//! [`AudioPlatform`], and reads time through [`TimeSource`] so tests can drive
//! debounce and warm-up windows deterministically.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

pub mod primer;

/// Run state of a platform audio context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextState {
    Suspended,
    Running,
    Closed,
}

/// Trait implemented by platform-specific audio output backends.
///
/// Calls are synchronous and may block (device open, stream start, primer
/// playback); the executor runs them on tokio's blocking pool. Behavior is
/// platform dependent and unreliable: some platforms ignore a resume that is
/// not close enough to a user gesture and simply stay suspended.
pub trait AudioPlatform: Send + Sync {
    /// State of the main context, `None` if none was created yet.
    fn context_state(&self) -> Option<ContextState>;

    /// Create the main context, replacing any closed one.
    fn create_context(&self) -> Result<ContextState, PlatformError>;

    /// Resume the main context.
    fn resume(&self) -> Result<ContextState, PlatformError>;

    /// Play a near-silent buffer through a throwaway context for `hold`, then
    /// drop that context.
    fn play_silent_buffer(&self, hold: Duration) -> Result<(), PlatformError>;

    /// Platforms with strict autoplay policies get the unlock button up front.
    fn requires_explicit_gesture(&self) -> bool {
        false
    }
}

/// Trait representing a monotonic time source.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for tests and simulations.
///
/// Time only moves when [`ManualTimeSource::advance`] is called.
pub struct ManualTimeSource {
    now: Mutex<Instant>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        *now += by;
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(not(target_os = "android"))]
mod cpal;
#[cfg(not(target_os = "android"))]
pub use cpal::CpalPlatform;

mod stub;
pub use stub::{StubCallCounts, StubPlatform};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_advanced() {
        let clock = ManualTimeSource::new();
        let start = clock.now();
        assert_eq!(clock.now(), start);

        clock.advance_ms(250);
        assert_eq!(clock.now() - start, Duration::from_millis(250));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemTimeSource::default();
        let first = clock.now();
        assert!(clock.now() >= first);
    }
}
