//! Diagnostics telemetry collector and helpers.
//!
//! The collector multiplexes coordinator state changes, attempt lifecycle and
//! refused requests into a bounded history plus async broadcast stream.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::error::{ErrorCode, PreconditionError};
use crate::unlock::{AttemptRecord, AttemptResult, CoordinatorState};

pub mod events;

pub use events::UnlockEvent;

/// Global telemetry hub shared across the crate.
static HUB: Lazy<TelemetryHub> = Lazy::new(TelemetryHub::default);

/// Access the global telemetry hub.
pub fn hub() -> &'static TelemetryHub {
    &HUB
}

/// Running totals kept alongside the event history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockCounters {
    pub attempts_started: u64,
    pub attempts_succeeded: u64,
    pub attempts_failed: u64,
    pub requests_rejected: u64,
}

/// Snapshot of collector state for CLI reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub recent: Vec<UnlockEvent>,
    pub total_events: u64,
    pub dropped_events: u64,
    pub counters: UnlockCounters,
}

/// Broadcast-based collector retaining a bounded history of events.
pub struct TelemetryCollector {
    tx: broadcast::Sender<UnlockEvent>,
    history: Mutex<VecDeque<UnlockEvent>>,
    history_capacity: usize,
    total_events: AtomicU64,
    dropped_history: AtomicU64,
}

impl TelemetryCollector {
    pub fn new(buffer: usize, history_capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(buffer);
        Self {
            tx,
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
            total_events: AtomicU64::new(0),
            dropped_history: AtomicU64::new(0),
        }
    }

    pub fn publish(&self, event: UnlockEvent) {
        self.total_events.fetch_add(1, Ordering::Relaxed);
        {
            let mut history = self.history.lock().unwrap_or_else(|p| p.into_inner());
            if history.len() == self.history_capacity {
                history.pop_front();
                self.dropped_history.fetch_add(1, Ordering::Relaxed);
            }
            history.push_back(event.clone());
        }

        // No subscribers is the normal case outside the CLI.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UnlockEvent> {
        self.tx.subscribe()
    }

    fn recent(&self) -> (Vec<UnlockEvent>, u64, u64) {
        let history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        (
            history.iter().cloned().collect(),
            self.total_events.load(Ordering::Relaxed),
            self.dropped_history.load(Ordering::Relaxed),
        )
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

/// Top-level hub wrapping collector state plus derived counters.
pub struct TelemetryHub {
    collector: TelemetryCollector,
    counters: Mutex<UnlockCounters>,
}

impl TelemetryHub {
    pub fn new(channel_capacity: usize, history_capacity: usize) -> Self {
        Self {
            collector: TelemetryCollector::new(channel_capacity, history_capacity),
            counters: Mutex::new(UnlockCounters::default()),
        }
    }

    pub fn collector(&self) -> &TelemetryCollector {
        &self.collector
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UnlockEvent> {
        self.collector.subscribe()
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let (recent, total_events, dropped_events) = self.collector.recent();
        TelemetrySnapshot {
            recent,
            total_events,
            dropped_events,
            counters: *self.lock_counters(),
        }
    }

    pub fn record_state_change(&self, from: CoordinatorState, to: CoordinatorState) {
        self.collector.publish(UnlockEvent::StateChanged {
            from,
            to,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_attempt_started(&self, attempt_id: u64) {
        self.lock_counters().attempts_started += 1;
        self.collector.publish(UnlockEvent::AttemptStarted {
            attempt_id,
            timestamp_ms: now_timestamp_ms(),
        });
    }

    pub fn record_attempt_settled(&self, record: &AttemptRecord) {
        {
            let mut counters = self.lock_counters();
            match record.outcome {
                AttemptResult::Success => counters.attempts_succeeded += 1,
                AttemptResult::Failure => counters.attempts_failed += 1,
            }
        }
        self.collector.publish(UnlockEvent::AttemptSettled {
            attempt_id: record.id,
            outcome: record.outcome,
            duration_ms: record.settled_ms.saturating_sub(record.started_ms),
            error_code: record.error_code,
        });
    }

    pub fn record_precondition_rejected(&self, reason: PreconditionError) {
        self.lock_counters().requests_rejected += 1;
        self.collector.publish(UnlockEvent::PreconditionRejected {
            code: reason.code(),
            reason: reason.message(),
        });
    }

    fn lock_counters(&self) -> std::sync::MutexGuard<'_, UnlockCounters> {
        self.counters.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for TelemetryHub {
    fn default() -> Self {
        Self::new(256, 64)
    }
}

fn now_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settled(id: u64, outcome: AttemptResult) -> AttemptRecord {
        AttemptRecord {
            id,
            started_ms: 100,
            settled_ms: 140,
            outcome,
            error_code: match outcome {
                AttemptResult::Success => None,
                AttemptResult::Failure => Some(5001),
            },
        }
    }

    #[test]
    fn collector_preserves_order_within_history() {
        let collector = TelemetryCollector::new(8, 3);
        collector.publish(UnlockEvent::AttemptStarted {
            attempt_id: 1,
            timestamp_ms: 0,
        });
        collector.publish(UnlockEvent::PreconditionRejected {
            code: 3002,
            reason: "busy".to_string(),
        });

        let (recent, total, dropped) = collector.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(total, 2);
        assert_eq!(dropped, 0);
        assert_eq!(recent[0].kind(), "attempt_started");
        assert_eq!(recent[1].kind(), "precondition_rejected");
    }

    #[test]
    fn collector_drops_history_when_full() {
        let collector = TelemetryCollector::new(8, 2);
        for attempt_id in 1..=3 {
            collector.publish(UnlockEvent::AttemptStarted {
                attempt_id,
                timestamp_ms: 0,
            });
        }

        let (recent, _, dropped) = collector.recent();
        assert_eq!(recent.len(), 2);
        assert_eq!(dropped, 1);
        assert!(matches!(
            recent[0],
            UnlockEvent::AttemptStarted { attempt_id: 2, .. }
        ));
    }

    #[test]
    fn hub_counts_attempt_outcomes() {
        let hub = TelemetryHub::new(8, 16);
        hub.record_attempt_started(1);
        hub.record_attempt_settled(&settled(1, AttemptResult::Failure));
        hub.record_attempt_started(2);
        hub.record_attempt_settled(&settled(2, AttemptResult::Success));
        hub.record_precondition_rejected(PreconditionError::NoUserGesture);

        let snapshot = hub.snapshot();
        assert_eq!(
            snapshot.counters,
            UnlockCounters {
                attempts_started: 2,
                attempts_succeeded: 1,
                attempts_failed: 1,
                requests_rejected: 1,
            }
        );
        assert_eq!(snapshot.total_events, 5);
        assert!(snapshot.recent.iter().any(|event| matches!(
            event,
            UnlockEvent::AttemptSettled {
                attempt_id: 1,
                duration_ms: 40,
                error_code: Some(5001),
                ..
            }
        )));
    }

    #[tokio::test]
    async fn subscribers_receive_state_changes() {
        let hub = TelemetryHub::new(8, 8);
        let mut rx = hub.subscribe();

        hub.record_state_change(CoordinatorState::Uninitialized, CoordinatorState::Initializing);

        match rx.recv().await.unwrap() {
            UnlockEvent::StateChanged { from, to, .. } => {
                assert_eq!(from, CoordinatorState::Uninitialized);
                assert_eq!(to, CoordinatorState::Initializing);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn rejected_precondition_carries_code() {
        let hub = TelemetryHub::new(8, 8);
        hub.record_precondition_rejected(PreconditionError::Debounced { retry_in_ms: 300 });

        let snapshot = hub.snapshot();
        match &snapshot.recent[0] {
            UnlockEvent::PreconditionRejected { code, .. } => assert_eq!(*code, 3003),
            other => panic!("unexpected event {:?}", other),
        }
    }
}
