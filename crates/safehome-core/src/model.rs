//! Tracker data model
//!
//! These are the values that cross the persistence port and the scheduler
//! boundary. Their serde representation is the on-disk schema:
//!
//! ```json
//! { "latitude": 14.5995, "longitude": 120.9842, "label": "Home" }
//! { "state": "AWAY", "lastNotificationAt": 1736424000000, "consecutiveCloseReadings": 1 }
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, TrackingError};
use crate::geo::GeoPoint;

/// The single circular region the tracker watches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub label: String,
}

impl HomeLocation {
    pub fn new(latitude: f64, longitude: f64, label: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            label: label.into(),
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Reject coordinates no sample could ever be compared against
    pub fn validate(&self) -> Result<()> {
        if !self.point().is_valid() {
            return Err(TrackingError::invalid_input(format!(
                "Home coordinates out of range: ({}, {})",
                self.latitude, self.longitude
            )));
        }
        if self.label.trim().is_empty() {
            return Err(TrackingError::invalid_input("Home label cannot be empty"));
        }
        Ok(())
    }
}

/// One location fix delivered by the scheduler
///
/// Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub captured_at: DateTime<Utc>,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, captured_at: DateTime<Utc>) -> Self {
        Self {
            latitude,
            longitude,
            captured_at,
        }
    }

    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn is_finite(&self) -> bool {
        self.point().is_finite()
    }
}

/// Phase of the presence state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TrackerState {
    /// Presumed at home, nothing pending
    Home,
    /// Left the home region, collecting evidence of return
    Away,
    /// Tracking turned off, samples are ignored
    Disabled,
}

impl fmt::Display for TrackerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrackerState::Home => "HOME",
            TrackerState::Away => "AWAY",
            TrackerState::Disabled => "DISABLED",
        };
        f.write_str(name)
    }
}

/// The entire durable memory of the tracker
///
/// `consecutive_close_readings` only carries meaning while `state` is
/// [`TrackerState::Away`]; every transition into HOME or AWAY zeroes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub state: TrackerState,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub last_notification_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub consecutive_close_readings: u32,
}

impl TrackerSnapshot {
    /// Snapshot written by a fresh `start`
    pub fn initial() -> Self {
        Self {
            state: TrackerState::Home,
            last_notification_at: None,
            consecutive_close_readings: 0,
        }
    }

    /// Same memory, different phase, counters zeroed
    pub(crate) fn entering(&self, state: TrackerState) -> Self {
        Self {
            state,
            last_notification_at: self.last_notification_at,
            consecutive_close_readings: 0,
        }
    }
}

impl Default for TrackerSnapshot {
    fn default() -> Self {
        Self::initial()
    }
}

/// What the dispatcher is told when the user arrives home
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrivalNotice {
    pub label: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub arrived_at: DateTime<Utc>,
}
