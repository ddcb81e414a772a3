//! Wall clock used for presence decisions

use chrono::{DateTime, SubsecRound, Utc};

/// Source of "now" for the lifecycle manager
///
/// Timestamps are persisted at millisecond precision, so implementations
/// should not return finer values than that.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// System time, truncated to milliseconds
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now().trunc_subsecs(3)
    }
}
