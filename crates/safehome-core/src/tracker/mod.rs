//! Tracking lifecycle manager
//!
//! The TrackingLifecycleManager is responsible for:
//! - Registering with and unregistering from the background scheduler
//! - Loading the home location and snapshot for every sample
//! - Running the presence state machine
//! - Persisting the new snapshot before any side effect
//! - Dispatching the arrival notification with a bounded timeout
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────┐
//! │ LocationScheduler │─── LocationSample ───┐
//! └───────────────────┘                      │
//!                                            ▼
//!                             ┌────────────────────────────┐
//!                             │ TrackingLifecycleManager   │
//!                             └────────────────────────────┘
//!                                            │
//!         ┌──────────────────────────────────┼──────────────────────────┐
//!         │                                  │                          │
//!         ▼                                  ▼                          ▼
//! ┌───────────────┐               ┌───────────────────┐       ┌─────────────────┐
//! │  StateStore   │               │ presence::decide  │       │ ArrivalNotifier │
//! │ (load/persist)│               │ (pure)            │       │ (after persist) │
//! └───────────────┘               └───────────────────┘       └─────────────────┘
//! ```
//!
//! ## Sample Flow
//!
//! 1. Take the lifecycle lock; ignore the sample if tracking is stopped
//! 2. Load home and snapshot from the store (never cached)
//! 3. Decide, persist the new snapshot and the check time
//! 4. Release the lock
//! 5. If the decision asked for it, dispatch the arrival notification
//!
//! Steps 2-3 are the unit of atomicity. A failed write aborts the cycle
//! before any dispatch, and a failed dispatch never touches the snapshot,
//! so a notification is sent at most once per return.

pub mod clock;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc, oneshot};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::config::{SafeHomeConfig, SamplingCadence, ThresholdConfig};
use crate::error::{DispatchError, Result, TrackingError};
use crate::model::{ArrivalNotice, HomeLocation, LocationSample, TrackerSnapshot, TrackerState};
use crate::presence;
use crate::state::TrackerRecords;
use crate::traits::{ArrivalNotifier, LocationScheduler, StateStore};

pub use clock::{Clock, SystemClock};

/// Events emitted by the TrackingLifecycleManager
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    /// Tracking started with a fresh snapshot
    Started { label: String },

    /// Tracking reattached to a persisted snapshot after a restart
    Recovered { state: TrackerState },

    /// Tracking stopped
    Stopped,

    /// Home location replaced, snapshot reset
    HomeUpdated { label: String },

    /// Sample arrived while stopped
    SampleIgnored,

    /// Sample had non-finite coordinates
    SampleDiscarded,

    /// Cycle skipped (e.g. no home configured)
    SampleSkipped { reason: String },

    /// Presence phase changed
    Transitioned {
        from: TrackerState,
        to: TrackerState,
        distance_meters: f64,
    },

    /// Arrival notification delivered
    ArrivalDispatched { label: String },

    /// Returned home within the cooldown; no notification
    ArrivalSuppressed,

    /// Arrival notification failed or timed out
    DispatchFailed { error: DispatchError },

    /// All tracking records deleted
    DataCleared,
}

/// Operational phase of the manager itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Stopped,
    Running,
}

/// Owned handle for the presence tracker
///
/// The host constructs one and keeps it for the life of the process.
/// Whether tracking is running is a property of this instance; there is
/// no global registration.
///
/// ## Lifecycle
///
/// ```text
/// Stopped ──start/recover──► Running ──stop──► Stopped
///                            Running ──on_sample──► Running
/// ```
///
/// ## Threading
///
/// All methods take `&self`; share the manager behind an `Arc`. One async
/// mutex guards both the phase and the load-decide-persist sequence, so
/// concurrent `on_sample` calls are serialized and `stop` waits for an
/// in-flight persistence step but not for a notification in transit.
pub struct TrackingLifecycleManager {
    /// Background sample scheduler
    scheduler: Box<dyn LocationScheduler>,

    /// Arrival notification dispatcher
    notifier: Box<dyn ArrivalNotifier>,

    /// Persistence port
    state_store: Box<dyn StateStore>,

    /// Presence decision thresholds
    thresholds: ThresholdConfig,

    /// Cadence passed to the scheduler on registration
    cadence: SamplingCadence,

    /// Upper bound for one dispatch
    dispatch_timeout: Duration,

    /// Source of decision timestamps
    clock: Arc<dyn Clock>,

    /// Lifecycle phase; holding it serializes every read-modify-write
    phase: Mutex<Phase>,

    /// Event sender for external monitoring
    event_tx: mpsc::Sender<TrackerEvent>,
}

impl TrackingLifecycleManager {
    /// Create a new manager in the stopped phase
    ///
    /// # Returns
    ///
    /// A tuple of (manager, event_receiver) where event_receiver yields tracker events
    pub fn new(
        scheduler: Box<dyn LocationScheduler>,
        notifier: Box<dyn ArrivalNotifier>,
        state_store: Box<dyn StateStore>,
        config: SafeHomeConfig,
    ) -> Result<(Self, mpsc::Receiver<TrackerEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.tracker.event_channel_capacity);

        let manager = Self {
            scheduler,
            notifier,
            state_store,
            thresholds: config.thresholds,
            cadence: config.cadence,
            dispatch_timeout: config.tracker.dispatch_timeout(),
            clock: Arc::new(SystemClock),
            phase: Mutex::new(Phase::Stopped),
            event_tx: tx,
        };

        Ok((manager, rx))
    }

    /// Replace the wall clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start tracking around `home`
    ///
    /// Persists the home, writes a fresh HOME snapshot and registers with
    /// the scheduler. Calling it while running unregisters first, so the
    /// scheduler never holds two registrations.
    pub async fn start(&self, home: HomeLocation) -> Result<()> {
        home.validate()?;

        let mut phase = self.phase.lock().await;
        if *phase == Phase::Running {
            info!("Tracking already running, re-registering with {}", self.scheduler.scheduler_name());
            self.scheduler.unregister().await?;
            *phase = Phase::Stopped;
        }

        let records = self.records();
        records.save_home(&home).await?;
        records.save_snapshot(&TrackerSnapshot::initial()).await?;

        self.scheduler.register(&self.cadence).await?;
        *phase = Phase::Running;

        info!(
            "Tracking started for '{}' (exit {} m, entry {} m, every {}s or {} m)",
            home.label,
            self.thresholds.exit_threshold_meters,
            self.thresholds.entry_threshold_meters,
            self.cadence.interval_secs,
            self.cadence.distance_meters
        );
        self.emit_event(TrackerEvent::Started { label: home.label });
        Ok(())
    }

    /// Reattach to persisted tracking after a process restart
    ///
    /// Registers with the scheduler without touching the snapshot, so an
    /// AWAY phase and its counters carry over.
    ///
    /// # Returns
    ///
    /// - `Ok(true)`: Tracking is running (recovered, or already was)
    /// - `Ok(false)`: Nothing to recover (no snapshot, or DISABLED)
    /// - `Err(TrackingError::NoHomeConfigured)`: Live snapshot without a home
    pub async fn recover(&self) -> Result<bool> {
        let mut phase = self.phase.lock().await;
        if *phase == Phase::Running {
            return Ok(true);
        }

        let records = self.records();
        let snapshot = match records.load_snapshot().await? {
            Some(snapshot) if snapshot.state != TrackerState::Disabled => snapshot,
            _ => {
                debug!("No active tracking to recover");
                return Ok(false);
            }
        };

        if records.load_home().await?.is_none() {
            warn!("Persisted snapshot is {} but no home is configured", snapshot.state);
            return Err(TrackingError::NoHomeConfigured);
        }

        self.scheduler.register(&self.cadence).await?;
        *phase = Phase::Running;

        info!(
            "Tracking recovered in state {} ({} close readings)",
            snapshot.state, snapshot.consecutive_close_readings
        );
        self.emit_event(TrackerEvent::Recovered {
            state: snapshot.state,
        });
        Ok(true)
    }

    /// Stop tracking
    ///
    /// Writes a DISABLED snapshot that keeps the counters and last
    /// notification time, then unregisters. Waits for an in-flight sample's
    /// persistence step, not for its notification.
    pub async fn stop(&self) -> Result<()> {
        let mut phase = self.phase.lock().await;

        let records = self.records();
        if let Some(current) = records.load_snapshot().await?
            && current.state != TrackerState::Disabled
        {
            let disabled = TrackerSnapshot {
                state: TrackerState::Disabled,
                ..current
            };
            records.save_snapshot(&disabled).await?;
        }

        if *phase == Phase::Stopped {
            debug!("Stop requested while already stopped");
            return Ok(());
        }

        self.scheduler.unregister().await?;
        *phase = Phase::Stopped;

        info!("Tracking stopped");
        self.emit_event(TrackerEvent::Stopped);
        Ok(())
    }

    /// Process one location sample
    ///
    /// Malformed samples, a missing home and calls while stopped are not
    /// errors. Only persistence (or decoding) failures are returned; the
    /// tracker stays registered and the next sample retries from the last
    /// durable state. Dispatch failures are logged and swallowed.
    pub async fn on_sample(&self, sample: LocationSample) -> Result<()> {
        let arrival = {
            let phase = self.phase.lock().await;
            if *phase == Phase::Stopped {
                warn!("Location sample received while tracking is stopped, ignoring");
                self.emit_event(TrackerEvent::SampleIgnored);
                return Ok(());
            }

            match self.evaluate(&sample).await {
                Ok(arrival) => arrival,
                Err(e) if e.is_skipped_cycle() => {
                    debug!("Skipping sample: {}", e);
                    self.emit_event(TrackerEvent::SampleSkipped {
                        reason: e.to_string(),
                    });
                    return Ok(());
                }
                Err(e) => return Err(e),
            }
        };

        if let Some(notice) = arrival {
            self.dispatch(notice).await;
        }
        Ok(())
    }

    /// Replace the home location
    ///
    /// Accumulated AWAY evidence is meaningless for a new home, so a
    /// running tracker goes back to HOME with zeroed counters. A stopped
    /// tracker stays DISABLED. The last notification time is kept so the
    /// cooldown still applies.
    pub async fn update_home_location(&self, home: HomeLocation) -> Result<()> {
        home.validate()?;

        let phase = self.phase.lock().await;
        let records = self.records();
        let current = records.load_snapshot().await?;

        records.save_home(&home).await?;

        let next = match (*phase, current) {
            (Phase::Running, current) => Some(TrackerSnapshot {
                last_notification_at: current.and_then(|s| s.last_notification_at),
                ..TrackerSnapshot::initial()
            }),
            (Phase::Stopped, Some(current)) if current.state == TrackerState::Disabled => {
                Some(current.entering(TrackerState::Disabled))
            }
            (Phase::Stopped, Some(current)) => Some(current.entering(TrackerState::Home)),
            // Never started: the snapshot is created by `start`
            (Phase::Stopped, None) => None,
        };
        if let Some(next) = next {
            records.save_snapshot(&next).await?;
        }

        info!("Home location updated to '{}'", home.label);
        self.emit_event(TrackerEvent::HomeUpdated { label: home.label });
        Ok(())
    }

    /// Whether samples are currently being tracked
    ///
    /// True iff the manager holds a scheduler registration and the
    /// persisted snapshot is not DISABLED. A store read failure reads as
    /// inactive.
    pub async fn is_active(&self) -> bool {
        let phase = self.phase.lock().await;
        if *phase != Phase::Running {
            return false;
        }

        match self.records().load_snapshot().await {
            Ok(Some(snapshot)) => snapshot.state != TrackerState::Disabled,
            Ok(None) => false,
            Err(e) => {
                warn!("Could not read tracker snapshot: {}", e);
                false
            }
        }
    }

    /// Stop tracking and delete every tracking record
    pub async fn clear_tracking_data(&self) -> Result<()> {
        let mut phase = self.phase.lock().await;
        if *phase == Phase::Running {
            self.scheduler.unregister().await?;
            *phase = Phase::Stopped;
            self.emit_event(TrackerEvent::Stopped);
        }

        self.records().clear().await?;

        info!("Tracking data cleared");
        self.emit_event(TrackerEvent::DataCleared);
        Ok(())
    }

    /// Currently persisted home location
    pub async fn home_location(&self) -> Result<Option<HomeLocation>> {
        self.records().load_home().await
    }

    /// Currently persisted snapshot
    pub async fn snapshot(&self) -> Result<Option<TrackerSnapshot>> {
        self.records().load_snapshot().await
    }

    /// When a sample last ran to completion
    pub async fn last_check_at(&self) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        self.records().load_last_check().await
    }

    /// Feed a sample stream into the tracker until Ctrl-C or the stream ends
    ///
    /// Per-sample errors are logged and never end the loop.
    pub async fn run<S>(&self, samples: S) -> Result<()>
    where
        S: Stream<Item = LocationSample> + Send,
    {
        self.run_internal(samples, None).await
    }

    /// Like [`run`](Self::run), but stops on a oneshot signal instead of Ctrl-C
    pub async fn run_with_shutdown<S>(
        &self,
        samples: S,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()>
    where
        S: Stream<Item = LocationSample> + Send,
    {
        self.run_internal(samples, shutdown_rx).await
    }

    async fn run_internal<S>(
        &self,
        samples: S,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()>
    where
        S: Stream<Item = LocationSample> + Send,
    {
        tokio::pin!(samples);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        error!("Failed to listen for Ctrl-C: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                next = samples.next() => match next {
                    Some(sample) => {
                        if let Err(e) = self.on_sample(sample).await {
                            error!("Failed to process location sample: {}", e);
                        }
                    }
                    None => {
                        info!("Sample stream ended");
                        break;
                    }
                },

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.state_store.flush().await?;
        info!("State flushed, sample loop stopped");
        Ok(())
    }

    /// Load, decide and persist for one sample
    ///
    /// Must be called with the phase lock held. Returns the notice to
    /// dispatch, if any.
    async fn evaluate(&self, sample: &LocationSample) -> Result<Option<ArrivalNotice>> {
        let records = self.records();

        let home = records
            .load_home()
            .await?
            .ok_or(TrackingError::NoHomeConfigured)?;

        if !sample.is_finite() {
            warn!(
                "Discarding sample with non-finite coordinates ({}, {})",
                sample.latitude, sample.longitude
            );
            self.emit_event(TrackerEvent::SampleDiscarded);
            return Ok(None);
        }

        let snapshot = match records.load_snapshot().await? {
            Some(snapshot) => snapshot,
            None => {
                warn!("No snapshot persisted while running, assuming HOME");
                TrackerSnapshot::initial()
            }
        };

        let now = self.clock.now();
        let decision = presence::decide(&snapshot, &home, sample, now, &self.thresholds);

        debug!(
            "Sample at ({:.6}, {:.6}) is {:?} m from home, {} -> {} ({} close readings)",
            sample.latitude,
            sample.longitude,
            decision.distance_meters.map(|m| m.round()),
            snapshot.state,
            decision.snapshot.state,
            decision.snapshot.consecutive_close_readings
        );

        records.save_snapshot(&decision.snapshot).await?;
        if let Err(e) = records.save_last_check(now).await {
            warn!("Failed to record last check time: {}", e);
        }

        if decision.snapshot.state != snapshot.state {
            info!("Presence changed: {} -> {}", snapshot.state, decision.snapshot.state);
            self.emit_event(TrackerEvent::Transitioned {
                from: snapshot.state,
                to: decision.snapshot.state,
                distance_meters: decision.distance_meters.unwrap_or_default(),
            });
        }

        if decision.dispatches_arrival() {
            return Ok(Some(ArrivalNotice {
                label: home.label,
                arrived_at: now,
            }));
        }

        if snapshot.state == TrackerState::Away && decision.snapshot.state == TrackerState::Home {
            info!("Arrived home within notification cooldown, not notifying");
            self.emit_event(TrackerEvent::ArrivalSuppressed);
        }
        Ok(None)
    }

    /// Deliver the arrival notice, bounded by the dispatch timeout
    ///
    /// Runs after the snapshot is durable and outside the phase lock.
    async fn dispatch(&self, notice: ArrivalNotice) {
        let result = match tokio::time::timeout(
            self.dispatch_timeout,
            self.notifier.dispatch_arrival(&notice),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DispatchError::Timeout(self.dispatch_timeout)),
        };

        match result {
            Ok(()) => {
                info!(
                    "Arrival at '{}' dispatched via {}",
                    notice.label,
                    self.notifier.notifier_name()
                );
                self.emit_event(TrackerEvent::ArrivalDispatched {
                    label: notice.label,
                });
            }
            Err(e) => {
                warn!(
                    "Arrival notification via {} failed, not retrying this cycle: {}",
                    self.notifier.notifier_name(),
                    e
                );
                self.emit_event(TrackerEvent::DispatchFailed { error: e });
            }
        }
    }

    fn records(&self) -> TrackerRecords<'_> {
        TrackerRecords::new(self.state_store.as_ref())
    }

    /// Emit a tracker event
    fn emit_event(&self, event: TrackerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
            }
            // Nobody is listening
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}
