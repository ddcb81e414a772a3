//! Contract Test: At-Most-Once Arrival Dispatch
//!
//! Verifies the ordering between persistence and notification.
//!
//! Constraints verified:
//! - Nothing is dispatched unless the new snapshot is durable
//! - A failed or timed-out dispatch is not rolled back or retried
//! - Overlapping samples cannot produce a second notification
//! - `stop` does not wait for a notification in transit
//!
//! If this test fails, someone has:
//! - Moved the dispatch before the snapshot write
//! - Added a retry loop around the notifier
//! - Held the lifecycle lock across the network call

mod common;

use std::time::Duration;

use common::*;
use safehome_core::{DispatchError, TrackerEvent, TrackerState, TrackingError};

/// Leave home and record one close reading
async fn one_reading_from_home(h: &Harness) {
    h.feed(north_of_home(500.0)).await;
    h.feed(north_of_home(30.0)).await;
}

#[tokio::test]
async fn persistence_failure_suppresses_dispatch() {
    let h = Harness::started().await;
    one_reading_from_home(&h).await;

    h.store.fail_writes(true);
    let err = h.manager.on_sample(north_of_home(30.0)).await.unwrap_err();

    assert!(matches!(err, TrackingError::Persistence(_)));
    assert_eq!(h.notifier.dispatch_calls(), 0);

    let snapshot = h.store.snapshot().await.unwrap();
    assert_eq!(snapshot.state, TrackerState::Away);
    assert_eq!(snapshot.consecutive_close_readings, 1);
    assert!(h.manager.is_active().await, "tracker stays registered");

    // Next sample retries from the last durable state
    h.store.fail_writes(false);
    h.manager.on_sample(north_of_home(30.0)).await.unwrap();
    assert_eq!(h.store.snapshot().await.unwrap().state, TrackerState::Home);
    assert_eq!(h.notifier.dispatch_calls(), 1);
}

#[tokio::test]
async fn rejected_dispatch_is_not_rolled_back() {
    let mut h = Harness::with_notifier(NotifierMode::Reject);
    h.manager.start(home()).await.unwrap();

    h.round_trip().await;

    let snapshot = h.store.snapshot().await.unwrap();
    assert_eq!(snapshot.state, TrackerState::Home);
    assert!(snapshot.last_notification_at.is_some(), "cooldown consumed");
    assert!(h.take_events().contains(&TrackerEvent::DispatchFailed {
        error: DispatchError::Rejected("HTTP 503".to_string())
    }));

    // No retry inside the cooldown, even once the endpoint recovers
    h.notifier.set_mode(NotifierMode::Succeed);
    h.round_trip().await;
    assert_eq!(h.notifier.dispatch_calls(), 1);
}

#[tokio::test]
async fn hanging_dispatch_times_out() {
    let mut h = Harness::with_notifier(NotifierMode::Hang);
    h.manager.start(home()).await.unwrap();
    one_reading_from_home(&h).await;
    h.take_events();

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        h.manager.on_sample(north_of_home(30.0)),
    )
    .await;

    assert!(result.is_ok(), "on_sample must return after the dispatch timeout");
    assert!(result.unwrap().is_ok(), "a timed-out dispatch is not an error");

    assert_eq!(h.store.snapshot().await.unwrap().state, TrackerState::Home);
    assert!(h.take_events().contains(&TrackerEvent::DispatchFailed {
        error: DispatchError::Timeout(Duration::from_millis(200))
    }));
}

#[tokio::test]
async fn overlapping_samples_dispatch_once() {
    let h = Harness::started().await;
    one_reading_from_home(&h).await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = h.manager.clone();
        handles.push(tokio::spawn(async move {
            manager.on_sample(north_of_home(30.0)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(h.notifier.dispatch_calls(), 1);
    assert_eq!(h.store.snapshot().await.unwrap().state, TrackerState::Home);
}

#[tokio::test]
async fn redelivered_samples_after_restart_do_not_notify_again() {
    let before = Harness::started().await;
    before.round_trip().await;
    assert_eq!(before.notifier.dispatch_calls(), 1);

    let after = Harness::with(MockNotifier::succeeding(), before.store.clone(), test_config());
    assert!(after.manager.recover().await.unwrap());

    // The scheduler replays the arrival samples
    after.feed(north_of_home(30.0)).await;
    after.feed(north_of_home(30.0)).await;

    assert_eq!(after.notifier.dispatch_calls(), 0);
}

#[tokio::test]
async fn stop_is_not_blocked_by_dispatch_in_transit() {
    let mut config = test_config();
    config.tracker.dispatch_timeout_ms = 10_000;
    let h = Harness::with(MockNotifier::new(NotifierMode::Hang), FlakyStateStore::new(), config);
    h.manager.start(home()).await.unwrap();
    one_reading_from_home(&h).await;

    let manager = h.manager.clone();
    let in_flight = tokio::spawn(async move { manager.on_sample(north_of_home(30.0)).await });

    // Wait until the notifier has the call
    let waited = tokio::time::timeout(Duration::from_secs(5), async {
        while h.notifier.dispatch_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(waited.is_ok(), "dispatch should start");

    let stopped = tokio::time::timeout(Duration::from_secs(1), h.manager.stop()).await;
    assert!(stopped.is_ok(), "stop must not wait for the notifier");
    stopped.unwrap().unwrap();

    let snapshot = h.store.snapshot().await.unwrap();
    assert_eq!(snapshot.state, TrackerState::Disabled);
    assert!(snapshot.last_notification_at.is_some());

    in_flight.abort();
}
