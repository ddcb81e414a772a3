// # State Store Implementations
//
// This module provides implementations of the StateStore trait for
// different persistence strategies, and the typed record layer the
// tracker uses on top of them.

pub mod file;
pub mod memory;
pub mod records;

pub use file::{FileStateStore, FileStateStoreFactory};
pub use memory::{MemoryStateStore, MemoryStateStoreFactory};
pub use records::{HOME_LOCATION_KEY, LAST_CHECK_AT_KEY, TRACKER_SNAPSHOT_KEY, TrackerRecords};
