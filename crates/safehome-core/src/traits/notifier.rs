// # Arrival Notifier Trait
//
// Defines the interface for delivering the "arrived home" event.
//
// ## Implementations
//
// - Webhook: `safehome-notify-webhook` crate
// - Log-only: `safehomed`
//
// ## Usage
//
// ```rust,ignore
// use safehome_core::{ArrivalNotifier, ArrivalNotice};
//
// let notice = ArrivalNotice { label: "Home".into(), arrived_at: chrono::Utc::now() };
// notifier.dispatch_arrival(&notice).await?;
// ```

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::model::ArrivalNotice;

/// Trait for arrival notifier implementations
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform network calls to their own endpoint only
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (a failed dispatch is dropped for the cycle)
/// - ❌ Access the state store
/// - ❌ Spawn tasks that outlive the call
///
/// The manager bounds every call with a timeout and treats an elapsed
/// timeout exactly like [`DispatchError::Timeout`]. The result never feeds
/// back into presence decisions.
#[async_trait]
pub trait ArrivalNotifier: Send + Sync {
    /// Deliver one arrival event
    async fn dispatch_arrival(&self, notice: &ArrivalNotice) -> Result<(), DispatchError>;

    /// Get the notifier name (for logging/debugging)
    fn notifier_name(&self) -> &'static str;
}

/// Helper trait for constructing notifiers from configuration
pub trait NotifierFactory: Send + Sync {
    /// Create an ArrivalNotifier instance from configuration
    fn create(
        &self,
        config: &crate::config::NotifierConfig,
    ) -> Result<Box<dyn ArrivalNotifier>, crate::TrackingError>;
}
