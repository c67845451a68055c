//! UnlockCoordinator: single-flight owner of the unlock state machine.
//!
//! Every caller that wants sound goes through [`UnlockCoordinator::request_unlock`].
//! At most one attempt runs at a time; callers arriving while it is in flight
//! (or during the grace period after it settles) get a clone of the same
//! shared future and therefore the same outcome.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use futures::future::{self, BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::{oneshot, watch};

use crate::config::{AppConfig, CoordinatorConfig};
use crate::error::{log_unlock_error, ErrorCode, UnlockError};
use crate::gesture::GestureTracker;
use crate::platform::{AudioPlatform, TimeSource};
use crate::telemetry;

use super::executor::{AttemptOutcome, UnlockExecutor};
use super::preconditions::{check_preconditions, PreconditionInput, PreconditionPolicy};
use super::state::{AttemptRecord, AttemptResult, CoordinatorState};

/// Future handed to every caller of `request_unlock`.
pub type UnlockFuture = BoxFuture<'static, AttemptOutcome>;

type SharedAttempt = Shared<BoxFuture<'static, AttemptOutcome>>;

/// Whether the caller vouches for a user gesture the tracker may not have seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GestureOverride {
    /// Require a recent tracked gesture
    #[default]
    None,
    /// The request comes straight from a click handler, which is itself the gesture
    UserClick,
}

/// Serializable view of the coordinator for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorSnapshot {
    pub state: CoordinatorState,
    pub pending_attempt: Option<u64>,
    pub app_ready: bool,
    pub attempts: Vec<AttemptRecord>,
}

struct PendingAttempt {
    id: u64,
    future: SharedAttempt,
    /// Set once the attempt settles; the grace period counts from here
    settled_at: Option<Instant>,
}

struct CoordinatorInner {
    state: CoordinatorState,
    pending: Option<PendingAttempt>,
    attempts: Vec<AttemptRecord>,
    last_settled: Option<Instant>,
    next_attempt_id: u64,
}

struct CoordinatorCore {
    inner: Mutex<CoordinatorInner>,
    state_tx: watch::Sender<CoordinatorState>,
    executor: UnlockExecutor,
    gestures: Arc<GestureTracker>,
    clock: Arc<dyn TimeSource>,
    config: CoordinatorConfig,
    created_at: Instant,
    app_ready: AtomicBool,
}

/// Process-wide unlock coordinator.
///
/// Construct one at application start and share it (it is a cheap `Clone`
/// handle). Nothing outside this type mutates the state.
#[derive(Clone)]
pub struct UnlockCoordinator {
    core: Arc<CoordinatorCore>,
}

impl UnlockCoordinator {
    pub fn new(
        config: CoordinatorConfig,
        executor: UnlockExecutor,
        gestures: Arc<GestureTracker>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let (state_tx, _) = watch::channel(CoordinatorState::Uninitialized);
        let created_at = clock.now();

        if config.grace_ms > config.debounce_ms {
            log::warn!(
                "[UnlockCoordinator] grace_ms={} exceeds debounce_ms={}, clamping grace to {}ms",
                config.grace_ms,
                config.debounce_ms,
                config.debounce_ms
            );
        }

        log::info!(
            "[UnlockCoordinator] Created (debounce={}ms, grace={}ms, warmup={}ms)",
            config.debounce_ms,
            config.grace_ms,
            config.warmup_ms
        );

        Self {
            core: Arc::new(CoordinatorCore {
                inner: Mutex::new(CoordinatorInner {
                    state: CoordinatorState::Uninitialized,
                    pending: None,
                    attempts: Vec::new(),
                    last_settled: None,
                    next_attempt_id: 1,
                }),
                state_tx,
                executor,
                gestures,
                clock,
                config,
                created_at,
                app_ready: AtomicBool::new(false),
            }),
        }
    }

    /// Wire a coordinator, its executor and its gesture tracker from config.
    pub fn from_app_config(
        config: &AppConfig,
        platform: Arc<dyn AudioPlatform>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let gestures = Arc::new(GestureTracker::new(
            Arc::clone(&clock),
            config.gestures.window(),
        ));
        let executor = UnlockExecutor::from_config(platform, &config.executor);
        Self::new(config.coordinator.clone(), executor, gestures, clock)
    }

    /// Request an unlock, requiring a recently tracked gesture.
    pub fn request_unlock(&self) -> UnlockFuture {
        self.request_unlock_with(GestureOverride::None)
    }

    /// Request an unlock.
    ///
    /// If an attempt is pending, the returned future is a clone of it.
    /// Otherwise preconditions are checked; a refusal resolves immediately to
    /// `Err(UnlockError::Precondition(..))` and leaves state untouched. On
    /// success the state moves to `Initializing` and a new attempt is spawned
    /// before this function returns.
    ///
    /// Must be called from within a tokio runtime for an attempt to start.
    pub fn request_unlock_with(&self, gesture: GestureOverride) -> UnlockFuture {
        let core = &self.core;
        let mut inner = core.lock_inner();
        let now = core.clock.now();
        core.release_expired(&mut inner, now);

        if let Some(pending) = &inner.pending {
            log::debug!("[UnlockCoordinator] Joining pending attempt {}", pending.id);
            return pending.future.clone().boxed();
        }

        let input = PreconditionInput {
            state: inner.state,
            last_attempt: inner.last_settled,
            gesture_present: gesture == GestureOverride::UserClick
                || core.gestures.has_recent_gesture_default(),
            warmup_remaining: core.warmup_remaining(now),
            now,
        };
        let policy = PreconditionPolicy {
            debounce: core.config.debounce(),
        };

        if let Err(reason) = check_preconditions(&input, &policy) {
            telemetry::hub().record_precondition_rejected(reason);
            return rejected(UnlockError::Precondition(reason));
        }

        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => return rejected(UnlockError::RuntimeUnavailable),
        };

        let id = inner.next_attempt_id;
        inner.next_attempt_id += 1;
        core.transition(&mut inner, CoordinatorState::Initializing);

        let (tx, rx) = oneshot::channel();
        let attempt: SharedAttempt = rx
            .map(|received| {
                received.unwrap_or_else(|_| {
                    Err(UnlockError::Aborted {
                        reason: "attempt task dropped before settling".to_string(),
                    })
                })
            })
            .boxed()
            .shared();
        inner.pending = Some(PendingAttempt {
            id,
            future: attempt.clone(),
            settled_at: None,
        });
        drop(inner);

        log::info!("[UnlockCoordinator] Starting unlock attempt {}", id);
        telemetry::hub().record_attempt_started(id);
        // The guard travels inside the task so it fires even if the task is
        // dropped before its first poll.
        let guard = SettleOnDrop {
            core: Arc::clone(core),
            id,
            started_at: now,
            armed: true,
        };
        runtime.spawn(CoordinatorCore::run_attempt(guard, tx));

        attempt.boxed()
    }

    /// Ask for a manual gesture (strict autoplay platforms).
    ///
    /// Moves to `WaitingForUser` from `Uninitialized` or `Failed`; returns
    /// whether the state changed.
    pub fn await_user_gesture(&self) -> bool {
        let mut inner = self.core.lock_inner();
        if !inner.state.can_transition_to(CoordinatorState::WaitingForUser) {
            log::debug!(
                "[UnlockCoordinator] Not waiting for user gesture in state {:?}",
                inner.state
            );
            return false;
        }
        self.core.transition(&mut inner, CoordinatorState::WaitingForUser)
    }

    /// Signal that application bootstrap finished, ending warm-up early.
    pub fn mark_app_ready(&self) {
        if !self.core.app_ready.swap(true, Ordering::SeqCst) {
            log::info!("[UnlockCoordinator] Application marked ready");
        }
    }

    pub fn is_app_ready(&self) -> bool {
        self.core.warmup_remaining(self.core.clock.now()).is_none()
    }

    pub fn state(&self) -> CoordinatorState {
        self.core.lock_inner().state
    }

    /// Receiver that observes every state change.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.core.state_tx.subscribe()
    }

    pub fn has_pending_attempt(&self) -> bool {
        let mut inner = self.core.lock_inner();
        self.core.release_expired(&mut inner, self.core.clock.now());
        inner.pending.is_some()
    }

    /// Copy of the attempt log, oldest first.
    pub fn attempts(&self) -> Vec<AttemptRecord> {
        self.core.lock_inner().attempts.clone()
    }

    /// Failed attempts since the last success.
    pub fn failure_count(&self) -> usize {
        self.core
            .lock_inner()
            .attempts
            .iter()
            .rev()
            .take_while(|record| record.outcome == AttemptResult::Failure)
            .count()
    }

    pub fn gestures(&self) -> &Arc<GestureTracker> {
        &self.core.gestures
    }

    pub fn platform(&self) -> &Arc<dyn AudioPlatform> {
        self.core.executor.platform()
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.core.config
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        let app_ready = self.is_app_ready();
        let mut inner = self.core.lock_inner();
        self.core.release_expired(&mut inner, self.core.clock.now());
        CoordinatorSnapshot {
            state: inner.state,
            pending_attempt: inner.pending.as_ref().map(|pending| pending.id),
            app_ready,
            attempts: inner.attempts.clone(),
        }
    }
}

fn rejected(err: UnlockError) -> UnlockFuture {
    log_unlock_error(&err, "request_unlock");
    future::ready(Err(err)).boxed()
}

impl CoordinatorCore {
    fn lock_inner(&self) -> MutexGuard<'_, CoordinatorInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn warmup_remaining(&self, now: Instant) -> Option<Duration> {
        if self.app_ready.load(Ordering::SeqCst) {
            return None;
        }
        let elapsed = now.saturating_duration_since(self.created_at);
        let warmup = self.config.warmup();
        if elapsed >= warmup {
            None
        } else {
            Some(warmup - elapsed)
        }
    }

    /// Drop a settled attempt whose grace period is over.
    ///
    /// The grace timer task normally does this, but it is lost if the
    /// runtime that hosted it shut down.
    fn release_expired(&self, inner: &mut CoordinatorInner, now: Instant) {
        let expired = match &inner.pending {
            Some(PendingAttempt {
                id,
                settled_at: Some(at),
                ..
            }) if now.saturating_duration_since(*at) >= self.config.grace() => Some(*id),
            _ => None,
        };
        if let Some(id) = expired {
            Self::take_pending(inner, id);
        }
    }

    fn millis_since_start(&self, at: Instant) -> u64 {
        at.saturating_duration_since(self.created_at).as_millis() as u64
    }

    fn transition(&self, inner: &mut CoordinatorInner, next: CoordinatorState) -> bool {
        let current = inner.state;
        if !current.can_transition_to(next) {
            log::warn!(
                "[UnlockCoordinator] Refusing transition {:?} -> {:?}",
                current,
                next
            );
            return false;
        }

        inner.state = next;
        self.state_tx.send_replace(next);
        telemetry::hub().record_state_change(current, next);
        log::info!(
            "[UnlockCoordinator] {:?} -> {:?} ({})",
            current,
            next,
            next.description()
        );
        true
    }

    async fn run_attempt(mut guard: SettleOnDrop, tx: oneshot::Sender<AttemptOutcome>) {
        let core = Arc::clone(&guard.core);
        let (id, started_at) = (guard.id, guard.started_at);

        let outcome = core.executor.attempt_unlock().await;
        guard.armed = false;

        // With no grace period the slot is freed before anyone sees the
        // outcome, so a caller reacting to it can start a fresh attempt.
        let grace = core.config.grace();
        core.settle(id, started_at, &outcome, grace.is_zero());
        let _ = tx.send(outcome);

        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
            core.clear_pending(id);
        }
    }

    fn settle(&self, id: u64, started_at: Instant, outcome: &AttemptOutcome, clear_pending: bool) {
        let settled_at = self.clock.now();
        let (next, result, error_code) = match outcome {
            Ok(_) => (CoordinatorState::Initialized, AttemptResult::Success, None),
            Err(err) => (CoordinatorState::Failed, AttemptResult::Failure, Some(err.code())),
        };

        let record = AttemptRecord {
            id,
            started_ms: self.millis_since_start(started_at),
            settled_ms: self.millis_since_start(settled_at),
            outcome: result,
            error_code,
        };

        {
            let mut inner = self.lock_inner();
            inner.attempts.push(record.clone());
            inner.last_settled = Some(settled_at);
            self.transition(&mut inner, next);
            if clear_pending {
                Self::take_pending(&mut inner, id);
            } else if let Some(pending) = inner.pending.as_mut().filter(|p| p.id == id) {
                pending.settled_at = Some(settled_at);
            }
        }

        if let Err(err) = outcome {
            log_unlock_error(err, "unlock attempt");
        }
        telemetry::hub().record_attempt_settled(&record);
    }

    fn clear_pending(&self, id: u64) {
        let mut inner = self.lock_inner();
        Self::take_pending(&mut inner, id);
    }

    fn take_pending(inner: &mut CoordinatorInner, id: u64) {
        if inner.pending.as_ref().map(|pending| pending.id) == Some(id) {
            inner.pending = None;
            log::debug!("[UnlockCoordinator] Attempt {} released", id);
        }
    }
}

/// Settles an attempt as aborted if its task is dropped mid-flight, e.g.
/// when the hosting runtime shuts down.
struct SettleOnDrop {
    core: Arc<CoordinatorCore>,
    id: u64,
    started_at: Instant,
    armed: bool,
}

impl Drop for SettleOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let outcome = Err(UnlockError::Aborted {
            reason: "attempt task cancelled before settling".to_string(),
        });
        self.core.settle(self.id, self.started_at, &outcome, true);
    }
}

// ========================================================================
// TEST HELPERS
// ========================================================================
