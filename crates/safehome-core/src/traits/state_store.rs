// # State Store Trait
//
// Defines the persistence port the tracker reads and writes through.
//
// ## Purpose
//
// The tracker's durable memory is three independent records:
// - `home_location`: the configured home region
// - `tracker_snapshot`: phase, counters and last notification time
// - `last_check_at`: diagnostic timestamp of the last completed sample
//
// The store only sees opaque JSON values under string keys. The typed
// schema lives in `crate::state::records`.
//
// ## Implementations
//
// - In-memory: `MemoryStateStore`
// - File-based: `FileStateStore` (JSON document, atomic writes)
// - Future: platform key-value stores, SQLite, etc.
//
// ## Usage
//
// ```rust,ignore
// use safehome_core::StateStore;
//
// #[tokio::main]
// async fn main() -> anyhow::Result<()> {
//     let store = /* StateStore implementation */;
//
//     store.set("last_check_at", &serde_json::json!(1736424000000i64)).await?;
//     let value = store.get("last_check_at").await?;
//
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde_json::Value;

/// Trait for state store implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Trust Level: Trusted (Core Component)
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O for persistent storage (files, databases, etc.)
/// - ✅ Implement locking/concurrency control for thread safety
///
/// ## Forbidden Capabilities
/// - ❌ Interpret record contents (owned by `TrackingLifecycleManager`)
/// - ❌ Decide presence transitions (owned by the presence state machine)
/// - ❌ Spawn background tasks without clear lifecycle
///
/// A successful `set` must be durable before it returns: the manager
/// dispatches notifications only after the snapshot write succeeds.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a record
    ///
    /// # Returns
    ///
    /// - `Ok(Some(Value))`: The stored value
    /// - `Ok(None)`: No record under this key
    /// - `Err(TrackingError)`: Storage error
    async fn get(&self, key: &str) -> Result<Option<Value>, crate::TrackingError>;

    /// Create or replace a record
    async fn set(&self, key: &str, value: &Value) -> Result<(), crate::TrackingError>;

    /// Delete a record (succeeds if it did not exist)
    async fn delete(&self, key: &str) -> Result<(), crate::TrackingError>;

    /// List all keys in the store
    async fn keys(&self) -> Result<Vec<String>, crate::TrackingError>;

    /// Persist any pending changes
    ///
    /// Some implementations may buffer writes. This ensures
    /// all changes are flushed to persistent storage.
    async fn flush(&self) -> Result<(), crate::TrackingError>;
}

/// Helper trait for constructing state stores from configuration
#[async_trait]
pub trait StateStoreFactory: Send + Sync {
    /// Create a StateStore instance from its serialized configuration
    async fn create(&self, config: &Value) -> Result<Box<dyn StateStore>, crate::TrackingError>;
}
