// # Memory State Store
//
// In-memory implementation of StateStore.
//
// ## Purpose
//
// Provides a simple, fast state store that doesn't persist across restarts.
// Useful for testing and for hosts that keep their own durable copy.
//
// ## Crash Behavior
//
// - All records are lost on restart/crash
// - After a restart the tracker has no home and no snapshot; `recover()`
//   finds nothing and the host must call `start` again

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::TrackingError;
use crate::traits::state_store::{StateStore, StateStoreFactory};

/// In-memory state store implementation
///
/// Cloning yields another handle onto the same records, which is how tests
/// inspect what the tracker persisted.
///
/// # Example
///
/// ```rust,no_run
/// use safehome_core::state::MemoryStateStore;
/// use safehome_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryStateStore::new();
///
///     store.set("last_check_at", &serde_json::json!(1736424000000i64)).await?;
///     assert!(store.get("last_check_at").await?.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStateStore {
    /// Create a new empty memory state store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of records in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Clear all records from the store
    pub async fn clear(&self) {
        self.inner.write().await.clear();
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, TrackingError> {
        Ok(self.inner.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), TrackingError> {
        self.inner
            .write()
            .await
            .insert(key.to_string(), value.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TrackingError> {
        self.inner.write().await.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, TrackingError> {
        Ok(self.inner.read().await.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), TrackingError> {
        // Nothing buffered
        Ok(())
    }
}

/// Factory registered as `"memory"`
pub struct MemoryStateStoreFactory;

#[async_trait]
impl StateStoreFactory for MemoryStateStoreFactory {
    async fn create(&self, _config: &Value) -> Result<Box<dyn StateStore>, TrackingError> {
        Ok(Box::new(MemoryStateStore::new()))
    }
}
