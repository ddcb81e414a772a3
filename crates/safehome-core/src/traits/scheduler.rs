// # Location Scheduler Trait
//
// Defines the boundary to the OS facility that wakes the tracker with
// location samples (periodic or movement-triggered).
//
// The scheduler only needs to know whether it should be delivering
// samples and at what cadence. Samples themselves reach the tracker
// through `TrackingLifecycleManager::on_sample` (directly, or via
// `run()` over a sample stream).

use async_trait::async_trait;

use crate::config::SamplingCadence;

/// Trait for background scheduler integrations
///
/// `register` and `unregister` are called with the manager's lifecycle
/// lock held, so implementations never see overlapping calls from one
/// manager. The manager guarantees `unregister` precedes any repeated
/// `register`; implementations need not deduplicate.
///
/// Delivery is assumed at-least-once and possibly overlapping after a
/// process restart. The manager tolerates both.
#[async_trait]
pub trait LocationScheduler: Send + Sync {
    /// Begin delivering samples at the given cadence
    async fn register(&self, cadence: &SamplingCadence) -> Result<(), crate::TrackingError>;

    /// Stop delivering samples
    async fn unregister(&self) -> Result<(), crate::TrackingError>;

    /// Get the scheduler name (for logging/debugging)
    fn scheduler_name(&self) -> &'static str;
}
