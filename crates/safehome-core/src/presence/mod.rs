//! Presence state machine
//!
//! Decides, from the persisted snapshot and one location sample, whether
//! the user has left home or come back. Pure and total: no I/O, no clock,
//! no randomness. The caller supplies `now` and persists the result.
//!
//! ## Transitions
//!
//! ```text
//!            dist > exit
//!   HOME ─────────────────────► AWAY ◄──┐ dist > entry (counter := 0)
//!    ▲                           │  └────┘ dist <= entry (counter += 1)
//!    │ counter reaches required  │
//!    └───────────────────────────┘  notify if cooldown elapsed
//!
//!   DISABLED ── any sample ──► DISABLED
//! ```
//!
//! Exit and entry use different radii so a user idling near the boundary
//! does not flap between states on GPS jitter, and return requires several
//! consecutive close fixes so one multipath reading cannot trigger it.

use chrono::{DateTime, Utc};

use crate::config::ThresholdConfig;
use crate::geo;
use crate::model::{HomeLocation, LocationSample, TrackerSnapshot, TrackerState};

/// Side effect requested by a decision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Tell the dispatcher the user arrived home
    DispatchArrivalNotification,
}

/// Outcome of [`decide`]
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Snapshot to persist
    pub snapshot: TrackerSnapshot,
    /// Effect to perform once the snapshot is durable
    pub effect: Option<SideEffect>,
    /// Distance from home in meters, `None` when the sample was not evaluated
    pub distance_meters: Option<f64>,
}

impl Decision {
    fn unchanged(snapshot: &TrackerSnapshot, distance_meters: Option<f64>) -> Self {
        Self {
            snapshot: snapshot.clone(),
            effect: None,
            distance_meters,
        }
    }

    /// Whether the decision requests an arrival notification
    pub fn dispatches_arrival(&self) -> bool {
        self.effect == Some(SideEffect::DispatchArrivalNotification)
    }
}

/// Compute the next snapshot and side effect for one sample
///
/// A sample with non-finite coordinates is discarded: the snapshot comes
/// back unchanged and `distance_meters` is `None`.
pub fn decide(
    snapshot: &TrackerSnapshot,
    home: &HomeLocation,
    sample: &LocationSample,
    now: DateTime<Utc>,
    config: &ThresholdConfig,
) -> Decision {
    if snapshot.state == TrackerState::Disabled {
        return Decision::unchanged(snapshot, None);
    }

    let dist = geo::distance(&sample.point(), &home.point()).meters();
    if !sample.is_finite() || dist.is_nan() {
        return Decision::unchanged(snapshot, None);
    }

    match snapshot.state {
        TrackerState::Home => {
            if dist > config.exit_threshold_meters {
                Decision {
                    snapshot: snapshot.entering(TrackerState::Away),
                    effect: None,
                    distance_meters: Some(dist),
                }
            } else {
                Decision::unchanged(snapshot, Some(dist))
            }
        }
        TrackerState::Away => decide_away(snapshot, dist, now, config),
        TrackerState::Disabled => Decision::unchanged(snapshot, None),
    }
}

fn decide_away(
    snapshot: &TrackerSnapshot,
    dist: f64,
    now: DateTime<Utc>,
    config: &ThresholdConfig,
) -> Decision {
    if dist > config.entry_threshold_meters {
        let mut next = snapshot.clone();
        next.consecutive_close_readings = 0;
        return Decision {
            snapshot: next,
            effect: None,
            distance_meters: Some(dist),
        };
    }

    let readings = snapshot.consecutive_close_readings.saturating_add(1);
    if readings < config.required_consecutive_readings {
        let mut next = snapshot.clone();
        next.consecutive_close_readings = readings;
        return Decision {
            snapshot: next,
            effect: None,
            distance_meters: Some(dist),
        };
    }

    // Return confirmed. The HOME transition commits even when the
    // cooldown swallows the notification.
    let mut next = snapshot.entering(TrackerState::Home);
    let effect = if cooldown_elapsed(snapshot.last_notification_at, now, config) {
        next.last_notification_at = Some(now);
        Some(SideEffect::DispatchArrivalNotification)
    } else {
        None
    };

    Decision {
        snapshot: next,
        effect,
        distance_meters: Some(dist),
    }
}

/// A notification time in the future (clock skew) counts as not elapsed
fn cooldown_elapsed(
    last_notification_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    config: &ThresholdConfig,
) -> bool {
    match last_notification_at {
        None => true,
        Some(last) => now.signed_duration_since(last) >= config.notification_cooldown(),
    }
}
