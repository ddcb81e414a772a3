//! Log-only arrival notifier

use async_trait::async_trait;
use safehome_core::config::NotifierConfig;
use safehome_core::traits::{ArrivalNotifier, NotifierFactory};
use safehome_core::{ArrivalNotice, ComponentRegistry, DispatchError, TrackingError};
use tracing::info;

/// Records arrivals in the daemon log and nowhere else
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl ArrivalNotifier for LogNotifier {
    async fn dispatch_arrival(&self, notice: &ArrivalNotice) -> Result<(), DispatchError> {
        info!(
            "Arrived home at '{}' ({})",
            notice.label,
            notice.arrived_at.to_rfc3339()
        );
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "log"
    }
}

pub struct LogNotifierFactory;

impl NotifierFactory for LogNotifierFactory {
    fn create(&self, config: &NotifierConfig) -> Result<Box<dyn ArrivalNotifier>, TrackingError> {
        match config {
            NotifierConfig::Log => Ok(Box::new(LogNotifier)),
            _ => Err(TrackingError::config("Invalid config for log notifier")),
        }
    }
}

pub fn register(registry: &ComponentRegistry) {
    registry.register_notifier("log", Box::new(LogNotifierFactory));
}
