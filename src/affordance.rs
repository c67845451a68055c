//! "Enable Audio" button controller.
//!
//! Derives everything it shows from the coordinator's state channel, so the
//! button appears the moment an attempt fails and disappears on success.

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::StreamExt;

use crate::config::AffordanceConfig;
use crate::gesture::{InputEvent, InputEventKind};
use crate::unlock::{CoordinatorState, GestureOverride, UnlockCoordinator, UnlockFuture};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStatus {
    Idle,
    Enabling,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonLabel {
    EnableAudio,
    Enabling,
    Retry,
}

impl ButtonLabel {
    pub fn text(&self) -> &'static str {
        match self {
            ButtonLabel::EnableAudio => "Enable Audio",
            ButtonLabel::Enabling => "Enabling...",
            ButtonLabel::Retry => "Retry Audio",
        }
    }
}

/// Manual unlock affordance bound to one coordinator.
pub struct UnlockButton {
    coordinator: UnlockCoordinator,
    state_rx: watch::Receiver<CoordinatorState>,
}

impl UnlockButton {
    /// Bind to `coordinator`.
    ///
    /// On strict autoplay platforms (and with `proactive_on_strict` set) the
    /// coordinator is moved to `WaitingForUser` right away so the button is
    /// offered before anything has failed.
    pub fn new(coordinator: UnlockCoordinator, config: &AffordanceConfig) -> Self {
        let state_rx = coordinator.subscribe();

        if config.proactive_on_strict
            && coordinator.platform().requires_explicit_gesture()
            && coordinator.await_user_gesture()
        {
            log::info!("[UnlockButton] Strict autoplay platform, showing button proactively");
        }

        Self {
            coordinator,
            state_rx,
        }
    }

    fn current(&self) -> CoordinatorState {
        *self.state_rx.borrow()
    }

    pub fn should_show_unlock_button(&self) -> bool {
        self.current().shows_unlock_button()
    }

    pub fn status(&self) -> ButtonStatus {
        match self.current() {
            CoordinatorState::Initializing => ButtonStatus::Enabling,
            CoordinatorState::Failed => ButtonStatus::Error,
            _ => ButtonStatus::Idle,
        }
    }

    pub fn label(&self) -> ButtonLabel {
        if self.current() == CoordinatorState::Initializing {
            ButtonLabel::Enabling
        } else if self.coordinator.failure_count() > 0 {
            ButtonLabel::Retry
        } else {
            ButtonLabel::EnableAudio
        }
    }

    /// Click handler.
    ///
    /// The click itself is the gesture: it is recorded with the tracker and the
    /// request bypasses the gesture check. Debounce and warm-up still apply.
    /// The returned future resolves to the attempt's outcome; dropping it does
    /// not cancel the attempt.
    pub fn on_user_unlock_click(&self) -> UnlockFuture {
        self.coordinator
            .gestures()
            .record_gesture(&InputEvent::trusted(InputEventKind::Click));
        log::debug!(
            "[UnlockButton] Click in state {:?} ({})",
            self.current(),
            self.label().text()
        );
        self.coordinator
            .request_unlock_with(GestureOverride::UserClick)
    }

    /// Stream of visibility values, starting with the current one.
    pub fn visibility_changes(&self) -> impl Stream<Item = bool> + Send + 'static {
        WatchStream::new(self.coordinator.subscribe()).map(|state| state.shows_unlock_button())
    }

    pub fn coordinator(&self) -> &UnlockCoordinator {
        &self.coordinator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::config::AppConfig;
    use crate::platform::{ManualTimeSource, StubPlatform};

    fn button(platform: StubPlatform, proactive_on_strict: bool) -> (UnlockButton, Arc<StubPlatform>, Arc<ManualTimeSource>) {
        let mut config = AppConfig::default();
        config.coordinator.grace_ms = 0;
        config.affordance.proactive_on_strict = proactive_on_strict;

        let platform = Arc::new(platform);
        let clock = Arc::new(ManualTimeSource::new());
        let coordinator = UnlockCoordinator::from_app_config(&config, platform.clone(), clock.clone());
        coordinator.mark_app_ready();

        (UnlockButton::new(coordinator, &config.affordance), platform, clock)
    }

    #[tokio::test]
    async fn hidden_until_an_attempt_fails() {
        let (button, platform, _clock) = button(StubPlatform::new(), true);
        assert!(!button.should_show_unlock_button());
        assert_eq!(button.status(), ButtonStatus::Idle);
        assert_eq!(button.label(), ButtonLabel::EnableAudio);

        platform.fail_next_creates(2, "device busy");
        assert!(button.on_user_unlock_click().await.is_err());

        assert!(button.should_show_unlock_button());
        assert_eq!(button.status(), ButtonStatus::Error);
        assert_eq!(button.label(), ButtonLabel::Retry);
    }

    #[tokio::test]
    async fn hidden_again_after_success() {
        let (button, platform, clock) = button(StubPlatform::new(), true);
        platform.fail_next_creates(2, "device busy");
        let _ = button.on_user_unlock_click().await;
        assert!(button.should_show_unlock_button());

        clock.advance(Duration::from_millis(1000));
        assert!(button.on_user_unlock_click().await.is_ok());

        assert!(!button.should_show_unlock_button());
        assert_eq!(button.status(), ButtonStatus::Idle);
        assert_eq!(button.label(), ButtonLabel::EnableAudio);
    }

    #[tokio::test]
    async fn click_counts_as_gesture() {
        let (button, _platform, _clock) = button(StubPlatform::new(), true);
        assert!(button.coordinator().gestures().last_gesture().is_none());

        assert!(button.on_user_unlock_click().await.is_ok());
        assert!(button.coordinator().gestures().last_gesture().is_some());
    }

    #[tokio::test]
    async fn label_shows_enabling_while_in_flight() {
        let (button, _platform, _clock) = button(
            StubPlatform::new().with_latency(Duration::from_millis(50)),
            true,
        );

        let pending = button.on_user_unlock_click();
        assert_eq!(button.status(), ButtonStatus::Enabling);
        assert_eq!(button.label(), ButtonLabel::Enabling);
        assert!(!button.should_show_unlock_button());

        assert!(pending.await.is_ok());
        assert_eq!(button.status(), ButtonStatus::Idle);
    }

    #[test]
    fn strict_platform_shows_button_proactively() {
        let (button, platform, _clock) = button(StubPlatform::new().strict(), true);
        assert_eq!(button.coordinator().state(), CoordinatorState::WaitingForUser);
        assert!(button.should_show_unlock_button());
        assert_eq!(platform.calls(), Default::default());
    }

    #[tokio::test]
    async fn strict_platform_leaves_unlocked_coordinator_alone() {
        let mut config = AppConfig::default();
        config.coordinator.grace_ms = 0;
        let coordinator = UnlockCoordinator::from_app_config(
            &config,
            Arc::new(StubPlatform::new().strict()),
            Arc::new(ManualTimeSource::new()),
        );
        coordinator.mark_app_ready();
        coordinator
            .request_unlock_with(GestureOverride::UserClick)
            .await
            .unwrap();

        let button = UnlockButton::new(coordinator.clone(), &config.affordance);
        assert_eq!(coordinator.state(), CoordinatorState::Initialized);
        assert!(!button.should_show_unlock_button());
    }

    #[test]
    fn proactive_mode_can_be_disabled() {
        let (button, _platform, _clock) = button(StubPlatform::new().strict(), false);
        assert_eq!(button.coordinator().state(), CoordinatorState::Uninitialized);
        assert!(!button.should_show_unlock_button());
    }

    #[tokio::test]
    async fn visibility_stream_follows_state() {
        let (button, platform, clock) = button(StubPlatform::new(), true);
        let mut visibility = Box::pin(button.visibility_changes());
        assert_eq!(visibility.next().await, Some(false));

        platform.fail_next_creates(2, "device busy");
        let _ = button.on_user_unlock_click().await;
        assert_eq!(visibility.next().await, Some(true));

        clock.advance(Duration::from_millis(1000));
        button.on_user_unlock_click().await.unwrap();
        assert_eq!(visibility.next().await, Some(false));
    }
}
