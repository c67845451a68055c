//! Precondition checks run before an unlock attempt is allowed to start.
//!
//! The checker is a pure function over a snapshot of coordinator state; the
//! coordinator gathers the inputs under its lock and acts on the verdict.

use std::time::{Duration, Instant};

use crate::error::PreconditionError;

use super::CoordinatorState;

/// Policy knobs for the checker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreconditionPolicy {
    pub debounce: Duration,
}

/// Snapshot evaluated by [`check_preconditions`].
#[derive(Debug, Clone, Copy)]
pub struct PreconditionInput {
    pub state: CoordinatorState,
    /// When the last attempt settled, if any attempt ever did
    pub last_attempt: Option<Instant>,
    /// Recent trusted gesture, or the caller vouches for one
    pub gesture_present: bool,
    /// `None` once warm-up is over, otherwise how long is left
    pub warmup_remaining: Option<Duration>,
    pub now: Instant,
}

/// Decide whether an unlock attempt may start.
///
/// Checks run in a fixed order and the first failing one is returned:
/// already initialized, in progress, debounced, no gesture, app not ready.
pub fn check_preconditions(
    input: &PreconditionInput,
    policy: &PreconditionPolicy,
) -> Result<(), PreconditionError> {
    match input.state {
        CoordinatorState::Initialized => return Err(PreconditionError::AlreadyInitialized),
        CoordinatorState::Initializing => return Err(PreconditionError::InProgress),
        _ => {}
    }

    if let Some(last) = input.last_attempt {
        let elapsed = input.now.saturating_duration_since(last);
        if elapsed < policy.debounce {
            return Err(PreconditionError::Debounced {
                retry_in_ms: (policy.debounce - elapsed).as_millis() as u64,
            });
        }
    }

    if !input.gesture_present {
        return Err(PreconditionError::NoUserGesture);
    }

    if let Some(remaining) = input.warmup_remaining {
        return Err(PreconditionError::AppNotReady {
            ready_in_ms: remaining.as_millis() as u64,
        });
    }

    Ok(())
}
