//! Unlock attempt executor.
//!
//! Runs an ordered list of unlock strategies against the platform and reports
//! the first success, or every failure if none succeeds. The executor does
//! not de-duplicate attempts; that is the coordinator's job.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::ExecutorConfig;
use crate::error::{PlatformError, StrategyFailure, UnlockError};
use crate::platform::{AudioPlatform, ContextState};

/// Result of one unlock attempt: the final context state or why it failed.
pub type AttemptOutcome = Result<ContextState, UnlockError>;

/// One step of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockStrategy {
    /// Resume the existing context; skipped when there is none
    ResumeExisting,
    /// Create a fresh context and resume it
    CreateAndResume,
    /// Play a near-silent buffer through a throwaway context, then resume
    SilentPrimer,
}

enum StepResult {
    Unlocked(ContextState),
    Skipped,
    Failed(PlatformError),
}

impl UnlockStrategy {
    pub fn default_chain() -> Vec<UnlockStrategy> {
        vec![
            UnlockStrategy::ResumeExisting,
            UnlockStrategy::CreateAndResume,
            UnlockStrategy::SilentPrimer,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnlockStrategy::ResumeExisting => "resume_existing",
            UnlockStrategy::CreateAndResume => "create_and_resume",
            UnlockStrategy::SilentPrimer => "silent_primer",
        }
    }

    fn run(&self, platform: &dyn AudioPlatform, hold: Duration) -> StepResult {
        let result = match self {
            UnlockStrategy::ResumeExisting => match platform.context_state() {
                None | Some(ContextState::Closed) => return StepResult::Skipped,
                Some(ContextState::Running) => Ok(ContextState::Running),
                Some(ContextState::Suspended) => platform.resume().and_then(expect_running),
            },
            UnlockStrategy::CreateAndResume => platform
                .create_context()
                .and_then(|_| platform.resume())
                .and_then(expect_running),
            UnlockStrategy::SilentPrimer => platform
                .play_silent_buffer(hold)
                .and_then(|_| ensure_context(platform))
                .and_then(|_| platform.resume())
                .and_then(expect_running),
        };

        match result {
            Ok(state) => StepResult::Unlocked(state),
            Err(err) => StepResult::Failed(err),
        }
    }
}

/// A resume that returns without error is not proof of an unlock; some
/// platforms leave the context suspended.
fn expect_running(state: ContextState) -> Result<ContextState, PlatformError> {
    match state {
        ContextState::Running => Ok(state),
        ContextState::Suspended => Err(PlatformError::StillSuspended),
        ContextState::Closed => Err(PlatformError::ContextClosed),
    }
}

fn ensure_context(platform: &dyn AudioPlatform) -> Result<ContextState, PlatformError> {
    match platform.context_state() {
        Some(state) if state != ContextState::Closed => Ok(state),
        _ => platform.create_context(),
    }
}

/// Runs the configured strategy chain against a platform.
pub struct UnlockExecutor {
    platform: Arc<dyn AudioPlatform>,
    strategies: Vec<UnlockStrategy>,
    silent_hold: Duration,
}

impl UnlockExecutor {
    pub fn new(platform: Arc<dyn AudioPlatform>, strategies: Vec<UnlockStrategy>, silent_hold: Duration) -> Self {
        Self {
            platform,
            strategies,
            silent_hold,
        }
    }

    pub fn from_config(platform: Arc<dyn AudioPlatform>, config: &ExecutorConfig) -> Self {
        Self::new(platform, config.strategies.clone(), config.silent_hold())
    }

    pub fn platform(&self) -> &Arc<dyn AudioPlatform> {
        &self.platform
    }

    pub fn strategies(&self) -> &[UnlockStrategy] {
        &self.strategies
    }

    /// Run one unlock attempt.
    ///
    /// Platform calls may block, so the chain runs on tokio's blocking pool.
    /// Never panics: a lost blocking task is reported as
    /// [`UnlockError::Aborted`].
    pub async fn attempt_unlock(&self) -> AttemptOutcome {
        let platform = Arc::clone(&self.platform);
        let strategies = self.strategies.clone();
        let hold = self.silent_hold;

        match tokio::task::spawn_blocking(move || run_chain(platform.as_ref(), &strategies, hold)).await {
            Ok(outcome) => outcome,
            Err(err) => Err(UnlockError::Aborted {
                reason: err.to_string(),
            }),
        }
    }

    /// Run the chain on the current thread.
    pub fn attempt_unlock_blocking(&self) -> AttemptOutcome {
        run_chain(self.platform.as_ref(), &self.strategies, self.silent_hold)
    }
}

fn run_chain(platform: &dyn AudioPlatform, strategies: &[UnlockStrategy], hold: Duration) -> AttemptOutcome {
    let mut failures = Vec::new();

    for strategy in strategies {
        match strategy.run(platform, hold) {
            StepResult::Unlocked(state) => {
                log::info!(
                    "[UnlockExecutor] Unlocked via {} ({} earlier failures)",
                    strategy.as_str(),
                    failures.len()
                );
                return Ok(state);
            }
            StepResult::Skipped => {
                log::debug!("[UnlockExecutor] Skipping {}: not applicable", strategy.as_str());
            }
            StepResult::Failed(error) => {
                log::debug!("[UnlockExecutor] {} failed: {}", strategy.as_str(), error);
                failures.push(StrategyFailure {
                    strategy: *strategy,
                    error,
                });
            }
        }
    }

    Err(UnlockError::Execution { failures })
}
