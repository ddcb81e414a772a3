//! Test doubles and common utilities for tracker contract tests
//!
//! Every double shares its counters through `Arc`, so a test can box one
//! copy into the manager and keep another for assertions.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use safehome_core::config::{SafeHomeConfig, SamplingCadence};
use safehome_core::error::{DispatchError, TrackingError};
use safehome_core::state::{MemoryStateStore, TrackerRecords};
use safehome_core::traits::{ArrivalNotifier, LocationScheduler, StateStore};
use safehome_core::{
    ArrivalNotice, Clock, HomeLocation, LocationSample, TrackerEvent, TrackerSnapshot,
    TrackingLifecycleManager,
};
use serde_json::Value;
use tokio::sync::mpsc;

pub const HOME_LAT: f64 = 14.5995;
pub const HOME_LON: f64 = 120.9842;

/// Meters per degree of latitude on the 6371 km sphere
const METERS_PER_DEGREE: f64 = 111_194.93;

/// 2025-01-09T12:00:00Z
pub fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(1_736_424_000_000).unwrap()
}

pub fn home() -> HomeLocation {
    HomeLocation::new(HOME_LAT, HOME_LON, "Home")
}

/// A sample due north of home at roughly `meters`
pub fn north_of_home(meters: f64) -> LocationSample {
    LocationSample::new(HOME_LAT + meters / METERS_PER_DEGREE, HOME_LON, t0())
}

pub fn sample_at(latitude: f64, longitude: f64) -> LocationSample {
    LocationSample::new(latitude, longitude, t0())
}

/// Default configuration with a short dispatch timeout
pub fn test_config() -> SafeHomeConfig {
    let mut config = SafeHomeConfig::default();
    config.tracker.dispatch_timeout_ms = 200;
    config
}

/// Drain every event currently buffered
pub fn drain_events(rx: &mut mpsc::Receiver<TrackerEvent>) -> Vec<TrackerEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Scheduler that records registrations
#[derive(Clone, Default)]
pub struct RecordingScheduler {
    register_calls: Arc<AtomicUsize>,
    unregister_calls: Arc<AtomicUsize>,
    registered: Arc<AtomicBool>,
    overlapping_registrations: Arc<AtomicUsize>,
    cadences: Arc<Mutex<Vec<SamplingCadence>>>,
    fail_register: Arc<AtomicBool>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_calls(&self) -> usize {
        self.register_calls.load(Ordering::SeqCst)
    }

    pub fn unregister_calls(&self) -> usize {
        self.unregister_calls.load(Ordering::SeqCst)
    }

    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::SeqCst)
    }

    /// Registrations made while one was already held
    pub fn overlapping_registrations(&self) -> usize {
        self.overlapping_registrations.load(Ordering::SeqCst)
    }

    pub fn cadences(&self) -> Vec<SamplingCadence> {
        self.cadences.lock().unwrap().clone()
    }

    pub fn fail_next_registers(&self, fail: bool) {
        self.fail_register.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocationScheduler for RecordingScheduler {
    async fn register(&self, cadence: &SamplingCadence) -> Result<(), TrackingError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_register.load(Ordering::SeqCst) {
            return Err(TrackingError::scheduler("registration refused"));
        }
        if self.registered.swap(true, Ordering::SeqCst) {
            self.overlapping_registrations.fetch_add(1, Ordering::SeqCst);
        }
        self.cadences.lock().unwrap().push(cadence.clone());
        Ok(())
    }

    async fn unregister(&self) -> Result<(), TrackingError> {
        self.unregister_calls.fetch_add(1, Ordering::SeqCst);
        self.registered.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn scheduler_name(&self) -> &'static str {
        "recording"
    }
}

/// How a [`MockNotifier`] answers
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NotifierMode {
    Succeed,
    Reject,
    Hang,
    Delay(Duration),
}

/// Notifier that records every dispatched notice
#[derive(Clone)]
pub struct MockNotifier {
    mode: Arc<Mutex<NotifierMode>>,
    dispatch_calls: Arc<AtomicUsize>,
    notices: Arc<Mutex<Vec<ArrivalNotice>>>,
}

impl MockNotifier {
    pub fn new(mode: NotifierMode) -> Self {
        Self {
            mode: Arc::new(Mutex::new(mode)),
            dispatch_calls: Arc::new(AtomicUsize::new(0)),
            notices: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn succeeding() -> Self {
        Self::new(NotifierMode::Succeed)
    }

    pub fn set_mode(&self, mode: NotifierMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Number of dispatch attempts, successful or not
    pub fn dispatch_calls(&self) -> usize {
        self.dispatch_calls.load(Ordering::SeqCst)
    }

    pub fn notices(&self) -> Vec<ArrivalNotice> {
        self.notices.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArrivalNotifier for MockNotifier {
    async fn dispatch_arrival(&self, notice: &ArrivalNotice) -> Result<(), DispatchError> {
        self.dispatch_calls.fetch_add(1, Ordering::SeqCst);
        self.notices.lock().unwrap().push(notice.clone());

        let mode = *self.mode.lock().unwrap();
        match mode {
            NotifierMode::Succeed => Ok(()),
            NotifierMode::Reject => Err(DispatchError::rejected("HTTP 503")),
            NotifierMode::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
            NotifierMode::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }

    fn notifier_name(&self) -> &'static str {
        "mock"
    }
}

/// Memory store whose writes can be made to fail
#[derive(Clone, Default)]
pub struct FlakyStateStore {
    inner: MemoryStateStore,
    fail_writes: Arc<AtomicBool>,
    write_calls: Arc<AtomicUsize>,
    flush_calls: Arc<AtomicUsize>,
}

impl FlakyStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub fn flush_calls(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Option<TrackerSnapshot> {
        TrackerRecords::new(&self.inner).load_snapshot().await.unwrap()
    }

    pub async fn last_check(&self) -> Option<DateTime<Utc>> {
        TrackerRecords::new(&self.inner).load_last_check().await.unwrap()
    }

    pub async fn put_snapshot(&self, snapshot: &TrackerSnapshot) {
        TrackerRecords::new(&self.inner).save_snapshot(snapshot).await.unwrap();
    }

    pub async fn put_home(&self, home: &HomeLocation) {
        TrackerRecords::new(&self.inner).save_home(home).await.unwrap();
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.is_empty().await
    }
}

#[async_trait]
impl StateStore for FlakyStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, TrackingError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), TrackingError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TrackingError::persistence("disk full"));
        }
        self.inner.set(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), TrackingError> {
        self.inner.delete(key).await
    }

    async fn keys(&self) -> Result<Vec<String>, TrackingError> {
        self.inner.keys().await
    }

    async fn flush(&self) -> Result<(), TrackingError> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Clock the test moves by hand
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A manager wired to shared test doubles
pub struct Harness {
    pub manager: Arc<TrackingLifecycleManager>,
    pub events: mpsc::Receiver<TrackerEvent>,
    pub scheduler: RecordingScheduler,
    pub notifier: MockNotifier,
    pub store: FlakyStateStore,
    pub clock: ManualClock,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(MockNotifier::succeeding(), FlakyStateStore::new(), test_config())
    }

    pub fn with_notifier(mode: NotifierMode) -> Self {
        Self::with(MockNotifier::new(mode), FlakyStateStore::new(), test_config())
    }

    pub fn with(notifier: MockNotifier, store: FlakyStateStore, config: SafeHomeConfig) -> Self {
        let scheduler = RecordingScheduler::new();
        let clock = ManualClock::new(t0());

        let (manager, events) = TrackingLifecycleManager::new(
            Box::new(scheduler.clone()),
            Box::new(notifier.clone()),
            Box::new(store.clone()),
            config,
        )
        .expect("manager construction succeeds");
        let manager = manager.with_clock(Arc::new(clock.clone()));

        Self {
            manager: Arc::new(manager),
            events,
            scheduler,
            notifier,
            store,
            clock,
        }
    }

    /// Start tracking and discard the startup events
    pub async fn started() -> Self {
        let mut harness = Self::new();
        harness.manager.start(home()).await.unwrap();
        drain_events(&mut harness.events);
        harness
    }

    /// Send one sample and advance the clock by 45 seconds
    pub async fn feed(&self, sample: LocationSample) {
        self.manager.on_sample(sample).await.unwrap();
        self.clock.advance(chrono::Duration::seconds(45));
    }

    /// Leave home and come back with enough close readings to arrive
    pub async fn round_trip(&self) {
        self.feed(north_of_home(500.0)).await;
        self.feed(north_of_home(30.0)).await;
        self.feed(north_of_home(30.0)).await;
    }

    pub fn take_events(&mut self) -> Vec<TrackerEvent> {
        drain_events(&mut self.events)
    }
}
