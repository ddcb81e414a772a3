//! Error types for the presence tracker
//!
//! This module defines all error types used throughout the crate.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for tracker operations
pub type Result<T> = std::result::Result<T, TrackingError>;

/// Core error type for the tracker
#[derive(Error, Debug)]
pub enum TrackingError {
    /// An operation needed a home location but none is stored
    ///
    /// Non-fatal: the current cycle is skipped.
    #[error("No home location configured")]
    NoHomeConfigured,

    /// Reading or writing the state store failed
    ///
    /// The invocation aborts; the next sample retries from the last
    /// durable state.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Registering with or unregistering from the scheduler failed
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl TrackingError {
    /// Create a persistence error
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a scheduler error
    pub fn scheduler(msg: impl Into<String>) -> Self {
        Self::Scheduler(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Whether the error only skips a cycle and needs no reporting upstream
    pub fn is_skipped_cycle(&self) -> bool {
        matches!(self, Self::NoHomeConfigured)
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for TrackingError {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Failure to deliver an arrival notification
///
/// Dispatch failures are logged and never retried within the same cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The dispatcher did not answer within the configured bound
    #[error("Dispatch timed out after {0:?}")]
    Timeout(Duration),

    /// The dispatcher answered but refused or failed the delivery
    #[error("Dispatch rejected: {0}")]
    Rejected(String),
}

impl DispatchError {
    /// Create a rejection error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}
