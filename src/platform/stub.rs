use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::PlatformError;

use super::{AudioPlatform, ContextState};

/// How many times each platform entry point was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StubCallCounts {
    pub create: u32,
    pub resume: u32,
    pub primer: u32,
}

/// Scripted platform backend used for deterministic testing and CLI simulation.
///
/// It simulates a context that starts suspended, can be told to reject the
/// next N resumes, and can emulate strict platforms that ignore `resume()`
/// until a primer buffer has been played.
pub struct StubPlatform {
    context: Mutex<Option<ContextState>>,
    create_calls: AtomicU32,
    resume_calls: AtomicU32,
    primer_calls: AtomicU32,
    create_failures: Mutex<VecDeque<PlatformError>>,
    resume_failures: Mutex<VecDeque<PlatformError>>,
    ignore_resume_until_primed: AtomicBool,
    strict: bool,
    latency: Duration,
}

impl StubPlatform {
    pub fn new() -> Self {
        Self {
            context: Mutex::new(None),
            create_calls: AtomicU32::new(0),
            resume_calls: AtomicU32::new(0),
            primer_calls: AtomicU32::new(0),
            create_failures: Mutex::new(VecDeque::new()),
            resume_failures: Mutex::new(VecDeque::new()),
            ignore_resume_until_primed: AtomicBool::new(false),
            strict: false,
            latency: Duration::ZERO,
        }
    }

    /// Report a strict autoplay policy.
    pub fn strict(mut self) -> Self {
        self.strict = true;
        self
    }

    /// Block every resume call for `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Start with an already-created suspended context.
    pub fn with_suspended_context(self) -> Self {
        *self.lock_context() = Some(ContextState::Suspended);
        self
    }

    /// Reject the next `count` resume calls.
    pub fn fail_next_resumes(&self, count: usize, reason: &str) {
        let mut queue = self.resume_failures.lock().unwrap_or_else(|p| p.into_inner());
        for _ in 0..count {
            queue.push_back(PlatformError::ResumeRejected {
                reason: reason.to_string(),
            });
        }
    }

    /// Fail the next `count` context creations.
    pub fn fail_next_creates(&self, count: usize, reason: &str) {
        let mut queue = self.create_failures.lock().unwrap_or_else(|p| p.into_inner());
        for _ in 0..count {
            queue.push_back(PlatformError::ContextCreateFailed {
                reason: reason.to_string(),
            });
        }
    }

    /// Silently ignore resume until a primer buffer has played.
    pub fn ignore_resume_until_primed(&self) {
        self.ignore_resume_until_primed.store(true, Ordering::SeqCst);
    }

    /// Close the main context, as a platform might on device loss.
    pub fn close_context(&self) {
        let mut context = self.lock_context();
        if context.is_some() {
            *context = Some(ContextState::Closed);
        }
    }

    pub fn calls(&self) -> StubCallCounts {
        StubCallCounts {
            create: self.create_calls.load(Ordering::SeqCst),
            resume: self.resume_calls.load(Ordering::SeqCst),
            primer: self.primer_calls.load(Ordering::SeqCst),
        }
    }

    fn lock_context(&self) -> std::sync::MutexGuard<'_, Option<ContextState>> {
        self.context.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn next_failure(queue: &Mutex<VecDeque<PlatformError>>) -> Option<PlatformError> {
        queue.lock().unwrap_or_else(|p| p.into_inner()).pop_front()
    }
}

impl Default for StubPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioPlatform for StubPlatform {
    fn context_state(&self) -> Option<ContextState> {
        *self.lock_context()
    }

    fn create_context(&self) -> Result<ContextState, PlatformError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = Self::next_failure(&self.create_failures) {
            return Err(err);
        }
        *self.lock_context() = Some(ContextState::Suspended);
        Ok(ContextState::Suspended)
    }

    fn resume(&self) -> Result<ContextState, PlatformError> {
        self.resume_calls.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        if let Some(err) = Self::next_failure(&self.resume_failures) {
            return Err(err);
        }

        let mut context = self.lock_context();
        match *context {
            None => Err(PlatformError::ResumeRejected {
                reason: "no context to resume".to_string(),
            }),
            Some(ContextState::Closed) => Err(PlatformError::ContextClosed),
            Some(_) if self.ignore_resume_until_primed.load(Ordering::SeqCst) => {
                Ok(ContextState::Suspended)
            }
            Some(_) => {
                *context = Some(ContextState::Running);
                Ok(ContextState::Running)
            }
        }
    }

    fn play_silent_buffer(&self, _hold: Duration) -> Result<(), PlatformError> {
        self.primer_calls.fetch_add(1, Ordering::SeqCst);
        self.ignore_resume_until_primed.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn requires_explicit_gesture(&self) -> bool {
        self.strict
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resume_without_context_is_rejected() {
        let platform = StubPlatform::new();
        assert!(matches!(
            platform.resume(),
            Err(PlatformError::ResumeRejected { .. })
        ));
        assert_eq!(platform.calls().resume, 1);
    }

    #[test]
    fn created_context_starts_suspended_then_runs() {
        let platform = StubPlatform::new();
        assert_eq!(platform.create_context(), Ok(ContextState::Suspended));
        assert_eq!(platform.resume(), Ok(ContextState::Running));
        assert_eq!(platform.context_state(), Some(ContextState::Running));
    }

    #[test]
    fn queued_failures_are_consumed_in_order() {
        let platform = StubPlatform::new().with_suspended_context();
        platform.fail_next_resumes(2, "blocked");

        assert!(platform.resume().is_err());
        assert!(platform.resume().is_err());
        assert_eq!(platform.resume(), Ok(ContextState::Running));
        assert_eq!(platform.calls().resume, 3);
    }

    #[test]
    fn primer_lifts_ignored_resume() {
        let platform = StubPlatform::new().with_suspended_context();
        platform.ignore_resume_until_primed();

        assert_eq!(platform.resume(), Ok(ContextState::Suspended));
        platform.play_silent_buffer(Duration::from_millis(100)).unwrap();
        assert_eq!(platform.resume(), Ok(ContextState::Running));
    }

    #[test]
    fn closed_context_cannot_resume() {
        let platform = StubPlatform::new().with_suspended_context();
        platform.close_context();
        assert_eq!(platform.resume(), Err(PlatformError::ContextClosed));
    }
}
