//! Configuration types for the presence tracker
//!
//! This module defines all configuration structures used throughout the crate.
//! Every field has a default, so an empty JSON object is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::TrackingError;

/// Main tracker configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SafeHomeConfig {
    /// Presence decision thresholds
    #[serde(default)]
    pub thresholds: ThresholdConfig,

    /// Sampling cadence requested from the scheduler
    #[serde(default)]
    pub cadence: SamplingCadence,

    /// State store configuration
    #[serde(default)]
    pub state_store: StateStoreConfig,

    /// Arrival notifier configuration
    #[serde(default)]
    pub notifier: NotifierConfig,

    /// Lifecycle manager settings
    #[serde(default)]
    pub tracker: TrackerSettings,
}

impl SafeHomeConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), TrackingError> {
        self.thresholds.validate()?;
        self.cadence.validate()?;
        self.notifier.validate()?;
        self.tracker.validate()?;
        Ok(())
    }
}

/// Thresholds for the presence state machine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    /// Distance beyond which the user has left home
    #[serde(default = "default_exit_threshold_meters")]
    pub exit_threshold_meters: f64,

    /// Distance within which a reading counts toward "returned"
    ///
    /// Must not exceed the exit threshold; the gap between the two is the
    /// hysteresis band.
    #[serde(default = "default_entry_threshold_meters")]
    pub entry_threshold_meters: f64,

    /// Consecutive close readings required before declaring return
    #[serde(default = "default_required_consecutive_readings")]
    pub required_consecutive_readings: u32,

    /// Minimum time between two dispatched notifications (in seconds)
    #[serde(default = "default_notification_cooldown_secs")]
    pub notification_cooldown_secs: u64,
}

impl ThresholdConfig {
    pub fn notification_cooldown(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.notification_cooldown_secs as i64)
    }

    /// Validate the thresholds
    pub fn validate(&self) -> Result<(), TrackingError> {
        for (name, value) in [
            ("exit_threshold_meters", self.exit_threshold_meters),
            ("entry_threshold_meters", self.entry_threshold_meters),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(TrackingError::config(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if self.entry_threshold_meters > self.exit_threshold_meters {
            return Err(TrackingError::config(format!(
                "entry_threshold_meters ({}) cannot exceed exit_threshold_meters ({})",
                self.entry_threshold_meters, self.exit_threshold_meters
            )));
        }
        if self.required_consecutive_readings == 0 {
            return Err(TrackingError::config(
                "required_consecutive_readings must be at least 1",
            ));
        }
        if self.notification_cooldown_secs > i64::MAX as u64 / 1000 {
            return Err(TrackingError::config("notification_cooldown_secs is too large"));
        }
        Ok(())
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            exit_threshold_meters: default_exit_threshold_meters(),
            entry_threshold_meters: default_entry_threshold_meters(),
            required_consecutive_readings: default_required_consecutive_readings(),
            notification_cooldown_secs: default_notification_cooldown_secs(),
        }
    }
}

/// Cadence the scheduler is asked to deliver samples at
///
/// Whichever trigger fires first wins. Any cadence is valid input to the
/// state machine; this is only passed through on registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplingCadence {
    /// Time-based trigger (in seconds)
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Movement-based trigger (in meters)
    #[serde(default = "default_distance_meters")]
    pub distance_meters: f64,
}

impl SamplingCadence {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn validate(&self) -> Result<(), TrackingError> {
        if self.interval_secs == 0 {
            return Err(TrackingError::config("Sampling interval must be > 0"));
        }
        if !self.distance_meters.is_finite() || self.distance_meters < 0.0 {
            return Err(TrackingError::config(
                "Sampling distance must be a non-negative number",
            ));
        }
        Ok(())
    }
}

impl Default for SamplingCadence {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            distance_meters: default_distance_meters(),
        }
    }
}

/// State store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StateStoreConfig {
    /// File-based state store
    File {
        /// Path to the state file
        path: String,
    },

    /// In-memory state store (not persistent)
    #[default]
    Memory,

    /// Custom state store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StateStoreConfig {
    /// Get the store type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            StateStoreConfig::File { .. } => "file",
            StateStoreConfig::Memory => "memory",
            StateStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Arrival notifier configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotifierConfig {
    /// HTTP webhook
    Webhook {
        /// Endpoint receiving the arrival event
        url: String,
        /// Bearer token (optional)
        #[serde(default)]
        api_token: Option<String>,
    },

    /// Write arrivals to the log only
    #[default]
    Log,

    /// Custom notifier
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl NotifierConfig {
    /// Validate the notifier configuration
    pub fn validate(&self) -> Result<(), TrackingError> {
        match self {
            NotifierConfig::Webhook { url, .. } => {
                if url.is_empty() {
                    return Err(TrackingError::config("Webhook URL cannot be empty"));
                }
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(TrackingError::config(format!(
                        "Webhook URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                Ok(())
            }
            NotifierConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(TrackingError::config(
                        "Custom notifier factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(TrackingError::config(
                        "Custom notifier config cannot be null",
                    ));
                }
                Ok(())
            }
            NotifierConfig::Log => Ok(()),
        }
    }

    /// Get the notifier type name used for registry lookup
    pub fn type_name(&self) -> &str {
        match self {
            NotifierConfig::Webhook { .. } => "webhook",
            NotifierConfig::Log => "log",
            NotifierConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Lifecycle manager settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerSettings {
    /// Upper bound on a single arrival dispatch (in milliseconds)
    ///
    /// A dispatch that exceeds it counts as failed.
    #[serde(default = "default_dispatch_timeout_ms")]
    pub dispatch_timeout_ms: u64,

    /// Capacity of the tracker event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl TrackerSettings {
    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_millis(self.dispatch_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), TrackingError> {
        if self.dispatch_timeout_ms == 0 {
            return Err(TrackingError::config("dispatch_timeout_ms must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(TrackingError::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_exit_threshold_meters() -> f64 {
    200.0
}

fn default_entry_threshold_meters() -> f64 {
    100.0
}

fn default_required_consecutive_readings() -> u32 {
    2
}

fn default_notification_cooldown_secs() -> u64 {
    3600
}

fn default_interval_secs() -> u64 {
    45
}

fn default_distance_meters() -> f64 {
    50.0
}

fn default_dispatch_timeout_ms() -> u64 {
    10_000
}

fn default_event_channel_capacity() -> usize {
    1000
}
