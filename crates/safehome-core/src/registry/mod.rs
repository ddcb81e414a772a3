//! Plugin-based component registry
//!
//! Notifiers and state stores are registered by name at startup and
//! instantiated from configuration, so the daemon never hardcodes which
//! implementations exist.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use safehome_core::registry::ComponentRegistry;
//! use safehome_core::config::NotifierConfig;
//!
//! let registry = ComponentRegistry::new();
//! registry.register_builtin_state_stores();
//! safehome_notify_webhook::register(&registry);
//!
//! let config = NotifierConfig::Webhook { url: "https://...".into(), api_token: None };
//! let notifier = registry.create_notifier(&config)?;
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::{NotifierConfig, StateStoreConfig};
use crate::error::{Result, TrackingError};
use crate::state::{FileStateStoreFactory, MemoryStateStoreFactory};
use crate::traits::{ArrivalNotifier, NotifierFactory, StateStore, StateStoreFactory};

/// Registry of notifier and state store factories
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent reads, exclusive writes.
/// A poisoned lock is recovered, since the maps are only ever inserted into.
#[derive(Default)]
pub struct ComponentRegistry {
    /// Registered arrival notifier factories
    notifiers: RwLock<HashMap<String, Arc<dyn NotifierFactory>>>,

    /// Registered state store factories
    state_stores: RwLock<HashMap<String, Arc<dyn StateStoreFactory>>>,
}

impl ComponentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a notifier factory under `name` (e.g. "webhook", "log")
    pub fn register_notifier(&self, name: impl Into<String>, factory: Box<dyn NotifierFactory>) {
        let mut notifiers = self.notifiers.write().unwrap_or_else(PoisonError::into_inner);
        notifiers.insert(name.into(), Arc::from(factory));
    }

    /// Register a state store factory under `name` (e.g. "file", "memory")
    pub fn register_state_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn StateStoreFactory>,
    ) {
        let mut stores = self.state_stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), Arc::from(factory));
    }

    /// Register the stores shipped with this crate as "file" and "memory"
    pub fn register_builtin_state_stores(&self) {
        self.register_state_store("file", Box::new(FileStateStoreFactory));
        self.register_state_store("memory", Box::new(MemoryStateStoreFactory));
    }

    /// Create a notifier from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn ArrivalNotifier>)`: Created notifier
    /// - `Err(TrackingError::Config)`: Type not registered, or the factory rejected the config
    pub fn create_notifier(&self, config: &NotifierConfig) -> Result<Box<dyn ArrivalNotifier>> {
        let notifier_type = config.type_name();
        let factory = self
            .notifiers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(notifier_type)
            .cloned()
            .ok_or_else(|| {
                TrackingError::config(format!("Unknown notifier type: {}", notifier_type))
            })?;

        factory.create(config)
    }

    /// Create a state store from configuration
    ///
    /// Built-in factories receive the serialized config; custom factories
    /// receive their own `config` payload.
    pub async fn create_state_store(&self, config: &StateStoreConfig) -> Result<Box<dyn StateStore>> {
        let store_type = config.type_name();

        // Clone the factory out so the lock is not held across the await
        let factory = self
            .state_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(store_type)
            .cloned()
            .ok_or_else(|| {
                TrackingError::config(format!("Unknown state store type: {}", store_type))
            })?;

        let config_json = match config {
            StateStoreConfig::Custom { config, .. } => config.clone(),
            _ => serde_json::to_value(config)?,
        };

        factory.create(&config_json).await
    }

    /// List all registered notifier types
    pub fn list_notifiers(&self) -> Vec<String> {
        let notifiers = self.notifiers.read().unwrap_or_else(PoisonError::into_inner);
        notifiers.keys().cloned().collect()
    }

    /// List all registered state store types
    pub fn list_state_stores(&self) -> Vec<String> {
        let stores = self.state_stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a notifier type is registered
    pub fn has_notifier(&self, name: &str) -> bool {
        let notifiers = self.notifiers.read().unwrap_or_else(PoisonError::into_inner);
        notifiers.contains_key(name)
    }

    /// Check if a state store type is registered
    pub fn has_state_store(&self, name: &str) -> bool {
        let stores = self.state_stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::model::ArrivalNotice;
    use async_trait::async_trait;
    use serde_json::json;

    struct SilentNotifier;

    #[async_trait]
    impl ArrivalNotifier for SilentNotifier {
        async fn dispatch_arrival(&self, _notice: &ArrivalNotice) -> std::result::Result<(), DispatchError> {
            Ok(())
        }

        fn notifier_name(&self) -> &'static str {
            "silent"
        }
    }

    struct SilentFactory;

    impl NotifierFactory for SilentFactory {
        fn create(&self, _config: &NotifierConfig) -> Result<Box<dyn ArrivalNotifier>> {
            Ok(Box::new(SilentNotifier))
        }
    }

    #[test]
    fn test_registry_registration() {
        let registry = ComponentRegistry::new();

        assert!(!registry.has_notifier("log"));

        registry.register_notifier("log", Box::new(SilentFactory));

        assert!(registry.has_notifier("log"));
        assert!(registry.list_notifiers().contains(&"log".to_string()));
        let notifier = registry.create_notifier(&NotifierConfig::Log).unwrap();
        assert_eq!(notifier.notifier_name(), "silent");
    }

    #[test]
    fn test_unknown_notifier_is_config_error() {
        let registry = ComponentRegistry::new();
        let err = registry.create_notifier(&NotifierConfig::Log).err().unwrap();
        assert!(matches!(err, TrackingError::Config(_)));
    }

    #[tokio::test]
    async fn test_builtin_state_stores() {
        let registry = ComponentRegistry::new();
        registry.register_builtin_state_stores();

        let mut stores = registry.list_state_stores();
        stores.sort();
        assert_eq!(stores, vec!["file".to_string(), "memory".to_string()]);

        let store = registry.create_state_store(&StateStoreConfig::Memory).await.unwrap();
        store.set("k", &json!(1)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(1)));
    }

    #[tokio::test]
    async fn test_file_store_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let registry = ComponentRegistry::new();
        registry.register_builtin_state_stores();

        let config = StateStoreConfig::File {
            path: path.to_string_lossy().into_owned(),
        };
        let store = registry.create_state_store(&config).await.unwrap();
        store.set("k", &json!("v")).await.unwrap();
        assert!(path.exists());
    }
}
