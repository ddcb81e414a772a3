//! Minimal embedding example for safehome-core
//!
//! The host application owns the scheduler, the notifier and the manager.
//! A scripted walk leaves home and comes back; the arrival is printed once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use safehome_core::traits::{ArrivalNotifier, LocationScheduler};
use safehome_core::{
    ArrivalNotice, DispatchError, HomeLocation, LocationSample, MemoryStateStore, Result,
    SafeHomeConfig, SamplingCadence, TrackerEvent, TrackingLifecycleManager,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Scheduler for a host that pushes fixes itself
struct EmbeddedScheduler;

#[async_trait]
impl LocationScheduler for EmbeddedScheduler {
    async fn register(&self, cadence: &SamplingCadence) -> Result<()> {
        println!(
            "[Embedded] Send me a fix every {}s or {} m",
            cadence.interval_secs, cadence.distance_meters
        );
        Ok(())
    }

    async fn unregister(&self) -> Result<()> {
        println!("[Embedded] Stop sending fixes");
        Ok(())
    }

    fn scheduler_name(&self) -> &'static str {
        "embedded"
    }
}

/// Notifier that prints arrivals
struct EmbeddedNotifier {
    arrivals: Arc<AtomicUsize>,
}

#[async_trait]
impl ArrivalNotifier for EmbeddedNotifier {
    async fn dispatch_arrival(&self, notice: &ArrivalNotice) -> std::result::Result<(), DispatchError> {
        self.arrivals.fetch_add(1, Ordering::SeqCst);
        println!("[Embedded] {} arrived at {}", notice.label, notice.arrived_at);
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "embedded"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    println!("=== Embedded safehome-core Example ===\n");

    let arrivals = Arc::new(AtomicUsize::new(0));
    let (manager, mut event_rx) = TrackingLifecycleManager::new(
        Box::new(EmbeddedScheduler),
        Box::new(EmbeddedNotifier {
            arrivals: Arc::clone(&arrivals),
        }),
        Box::new(MemoryStateStore::new()),
        SafeHomeConfig::default(),
    )?;

    let home = HomeLocation::new(14.5995, 120.9842, "Home");
    manager.start(home).await?;

    let (sample_tx, sample_rx) = mpsc::unbounded_channel();

    // Walk: 280 m out, then two fixes 33 m from the door
    for latitude in [14.6020, 14.6010, 14.5998, 14.5998] {
        let _ = sample_tx.send(LocationSample::new(latitude, 120.9842, Utc::now()));
    }
    drop(sample_tx);

    // Runs until the walk is over
    manager
        .run_with_shutdown(UnboundedReceiverStream::new(sample_rx), None)
        .await?;

    while let Ok(event) = event_rx.try_recv() {
        if let TrackerEvent::Transitioned {
            from,
            to,
            distance_meters,
        } = event
        {
            println!("[Embedded] {} -> {} at {:.0} m", from, to, distance_meters);
        }
    }

    manager.stop().await?;

    println!(
        "\n=== Done: {} arrival notification(s) ===",
        arrivals.load(Ordering::SeqCst)
    );
    Ok(())
}
