//! Configuration management for unlock timing and strategy tuning
//!
//! This module provides runtime configuration loading from JSON files so
//! debounce windows, warm-up delays and the fallback chain can be adjusted
//! per deployment without recompilation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::unlock::UnlockStrategy;

/// Bounds for the silent primer hold
pub const MIN_SILENT_HOLD_MS: u64 = 100;
pub const MAX_SILENT_HOLD_MS: u64 = 500;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub coordinator: CoordinatorConfig,
    pub gestures: GestureConfig,
    pub executor: ExecutorConfig,
    pub affordance: AffordanceConfig,
}

/// Single-flight coordinator timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Minimum gap between a settled attempt and the next one
    pub debounce_ms: u64,
    /// How long a settled attempt keeps absorbing repeat calls
    pub grace_ms: u64,
    /// Warm-up after startup before unlock attempts are allowed
    pub warmup_ms: u64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1000,
            grace_ms: 750,
            warmup_ms: 3000,
        }
    }
}

impl CoordinatorConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Grace period, clamped to the debounce window so a retry that passes
    /// debounce always starts a fresh attempt.
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms.min(self.debounce_ms))
    }

    pub fn warmup(&self) -> Duration {
        Duration::from_millis(self.warmup_ms)
    }
}

/// Gesture tracking parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// A gesture older than this no longer counts as "recent"
    pub window_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self { window_ms: 5000 }
    }
}

impl GestureConfig {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Unlock executor parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Ordered fallback chain, first success wins
    pub strategies: Vec<UnlockStrategy>,
    /// How long the primer buffer plays before its context is dropped
    pub silent_hold_ms: u64,
    /// Peak amplitude of the dithered primer buffer
    pub primer_amplitude: f32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            strategies: UnlockStrategy::default_chain(),
            silent_hold_ms: 250,
            primer_amplitude: 1.0e-4,
        }
    }
}

impl ExecutorConfig {
    /// Primer hold clamped to the supported range.
    pub fn silent_hold(&self) -> Duration {
        Duration::from_millis(
            self.silent_hold_ms
                .clamp(MIN_SILENT_HOLD_MS, MAX_SILENT_HOLD_MS),
        )
    }
}

/// Unlock button behavior
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AffordanceConfig {
    /// Show the button up front on platforms with strict autoplay policies
    pub proactive_on_strict: bool,
}

impl Default for AffordanceConfig {
    fn default() -> Self {
        Self {
            proactive_on_strict: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The parsed configuration, or the defaults if the file is missing or
    /// its JSON is invalid. Missing sections and fields take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/unlock_config.json")
    }
}
