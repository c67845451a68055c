//! Gesture tracking for unlock gating.
//!
//! Platforms only let audio start in response to a genuine user action, so the
//! tracker remembers when the last trusted input event happened. Only the
//! latest timestamp is kept; there is no history.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::platform::TimeSource;

/// Input event kinds delivered by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputEventKind {
    PointerDown,
    TouchStart,
    KeyDown,
    Click,
    /// Anything else the UI forwards (scroll, hover, ...). Never counts.
    Other,
}

/// Event kinds that count as an unlocking gesture.
pub const LISTENED_KINDS: [InputEventKind; 4] = [
    InputEventKind::PointerDown,
    InputEventKind::TouchStart,
    InputEventKind::KeyDown,
    InputEventKind::Click,
];

/// A single input event as seen by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    pub kind: InputEventKind,
    /// Set by the platform for events that originate from real user input,
    /// clear for synthetic or script-dispatched events.
    pub trusted: bool,
}

impl InputEvent {
    pub fn trusted(kind: InputEventKind) -> Self {
        Self {
            kind,
            trusted: true,
        }
    }

    pub fn synthetic(kind: InputEventKind) -> Self {
        Self {
            kind,
            trusted: false,
        }
    }

    fn counts_as_gesture(&self) -> bool {
        self.trusted && LISTENED_KINDS.contains(&self.kind)
    }
}

/// Records the timestamp of the most recent trusted user gesture.
pub struct GestureTracker {
    last_gesture: Mutex<Option<Instant>>,
    window: Duration,
    clock: Arc<dyn TimeSource>,
}

impl GestureTracker {
    pub fn new(clock: Arc<dyn TimeSource>, window: Duration) -> Self {
        Self {
            last_gesture: Mutex::new(None),
            window,
            clock,
        }
    }

    /// Record `event` if it is a trusted gesture of a listened kind.
    ///
    /// Returns whether the timestamp was updated.
    pub fn record_gesture(&self, event: &InputEvent) -> bool {
        if !event.counts_as_gesture() {
            return false;
        }

        let now = self.clock.now();
        *self.lock() = Some(now);
        true
    }

    /// True iff a gesture was recorded less than `window` ago.
    pub fn has_recent_gesture(&self, window: Duration) -> bool {
        match *self.lock() {
            Some(at) => self.clock.now().saturating_duration_since(at) < window,
            None => false,
        }
    }

    /// [`has_recent_gesture`](Self::has_recent_gesture) with the configured window.
    pub fn has_recent_gesture_default(&self) -> bool {
        self.has_recent_gesture(self.window)
    }

    pub fn last_gesture(&self) -> Option<Instant> {
        *self.lock()
    }

    /// Register the process-wide passive listener.
    ///
    /// The returned task feeds every event from `events` into
    /// [`record_gesture`](Self::record_gesture) for as long as a sender is
    /// alive. Call once at startup.
    pub fn spawn_listener(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<InputEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            log::info!("[GestureTracker] Listening for user gestures");
            while let Some(event) = events.recv().await {
                if self.record_gesture(&event) {
                    log::trace!("[GestureTracker] Gesture recorded: {:?}", event.kind);
                }
            }
            log::info!("[GestureTracker] Input source closed, listener stopped");
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Instant>> {
        self.last_gesture.lock().unwrap_or_else(|p| p.into_inner())
    }
}
