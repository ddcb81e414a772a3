// # safehome-core
//
// Core library for the geofence "safe home" presence tracker.
//
// ## Architecture Overview
//
// Given a stream of location samples, the tracker decides whether the user
// has left a configured home location and, on a confirmed return, emits
// one "arrived home" notification:
// - **geo**: Great-circle (haversine) distance
// - **presence**: Pure HOME/AWAY/DISABLED state machine with hysteresis,
//   debounce and a notification cooldown
// - **StateStore**: Trait for durable key/value persistence
// - **LocationScheduler**: Trait for the OS facility that delivers samples
// - **ArrivalNotifier**: Trait for delivering the arrival event
// - **TrackingLifecycleManager**: Start/stop/sample orchestration
// - **ComponentRegistry**: Plugin-based registry for notifiers and stores
//
// ## Design Principles
//
// 1. **Pure Core**: Presence decisions take `now` and touch no I/O
// 2. **Persist Before Effect**: The snapshot is durable before any dispatch
// 3. **At-Most-Once Delivery**: A failed dispatch is never retried
// 4. **Stateless Invocations**: Every sample reloads state from the store
// 5. **Library-First**: The daemon is a thin shell over this crate

pub mod config;
pub mod error;
pub mod geo;
pub mod model;
pub mod presence;
pub mod registry;
pub mod state;
pub mod tracker;
pub mod traits;

// Re-export core types for convenience
pub use config::{
    NotifierConfig, SafeHomeConfig, SamplingCadence, StateStoreConfig, ThresholdConfig,
    TrackerSettings,
};
pub use error::{DispatchError, Result, TrackingError};
pub use geo::{GeoPoint, Kilometers};
pub use model::{ArrivalNotice, HomeLocation, LocationSample, TrackerSnapshot, TrackerState};
pub use presence::{Decision, SideEffect, decide};
pub use registry::ComponentRegistry;
pub use state::{FileStateStore, MemoryStateStore};
pub use tracker::{Clock, SystemClock, TrackerEvent, TrackingLifecycleManager};
pub use traits::{ArrivalNotifier, LocationScheduler, StateStore};
