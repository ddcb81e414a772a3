//! Contract Test: Shutdown Determinism
//!
//! Verifies that the sample loop terminates and flushes state.
//!
//! Constraints verified:
//! - The loop exits on the shutdown signal even when no samples arrive
//! - The loop exits when the sample stream ends
//! - State is flushed before exit
//! - A failing sample never ends the loop
//!
//! If this test fails, someone has added:
//! - Detached background tasks
//! - Tasks that ignore cancellation
//! - An early return on per-sample errors

mod common;

use std::time::Duration;

use common::*;
use safehome_core::{LocationSample, TrackerState};

#[tokio::test]
async fn shutdown_signal_terminates_idle_loop() {
    let h = Harness::started().await;
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let manager = h.manager.clone();
    let handle = tokio::spawn(async move {
        manager
            .run_with_shutdown(tokio_stream::pending::<LocationSample>(), Some(shutdown_rx))
            .await
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(shutdown_tx.send(()).is_ok(), "shutdown signal send succeeds");

    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "Loop should terminate within 5 seconds");
    assert!(result.unwrap().unwrap().is_ok());

    assert_eq!(h.store.flush_calls(), 1, "state flushed exactly once on exit");
}

#[tokio::test]
async fn stream_end_terminates_loop() {
    let h = Harness::started().await;
    let samples = tokio_stream::iter(vec![
        north_of_home(500.0),
        north_of_home(30.0),
        north_of_home(30.0),
    ]);

    let result = tokio::time::timeout(
        Duration::from_secs(5),
        h.manager.run_with_shutdown(samples, None),
    )
    .await;

    assert!(result.is_ok(), "Loop should end with its stream");
    assert!(result.unwrap().is_ok());

    assert_eq!(h.store.snapshot().await.unwrap().state, TrackerState::Home);
    assert_eq!(h.notifier.dispatch_calls(), 1);
    assert_eq!(h.store.flush_calls(), 1);
}

#[tokio::test]
async fn failing_samples_do_not_end_loop() {
    let h = Harness::started().await;
    h.store.fail_writes(true);

    let samples = tokio_stream::iter(vec![north_of_home(500.0), north_of_home(600.0)]);
    let result = h.manager.run_with_shutdown(samples, None).await;

    assert!(result.is_ok());
    // Home and snapshot from start, then one failed write per sample
    assert_eq!(h.store.write_calls(), 4);
    assert_eq!(h.store.flush_calls(), 1);
}

#[tokio::test]
async fn samples_after_stop_are_ignored_by_loop() {
    let h = Harness::started().await;
    h.manager.stop().await.unwrap();

    let result = h
        .manager
        .run_with_shutdown(tokio_stream::iter(vec![north_of_home(500.0)]), None)
        .await;

    assert!(result.is_ok());
    assert_eq!(h.store.snapshot().await.unwrap().state, TrackerState::Disabled);
}
