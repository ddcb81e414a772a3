//! Core traits for the presence tracker
//!
//! This module defines the interfaces to the tracker's external collaborators.
//!
//! - [`StateStore`]: Persistence port for the tracker's records
//! - [`ArrivalNotifier`]: Delivers the "arrived home" event
//! - [`LocationScheduler`]: Background facility delivering location samples

pub mod notifier;
pub mod scheduler;
pub mod state_store;

pub use notifier::{ArrivalNotifier, NotifierFactory};
pub use scheduler::LocationScheduler;
pub use state_store::{StateStore, StateStoreFactory};
