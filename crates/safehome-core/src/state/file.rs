// # File State Store
//
// File-based implementation of StateStore with crash recovery.
//
// ## Purpose
//
// Keeps the tracker's records across process restarts, so an AWAY phase
// and its close-reading counter survive the host being killed between
// two samples.
//
// ## Crash Recovery
//
// - Atomic writes: Uses write-then-rename for atomicity
// - Corruption detection: Validates JSON on load
// - Automatic backup: Keeps .backup of last known good state
// - Recovery: Falls back to backup if corruption detected
//
// ## File Format
//
// ```json
// {
//   "version": "1.0",
//   "records": {
//     "home_location": { "latitude": 14.5995, "longitude": 120.9842, "label": "Home" },
//     "tracker_snapshot": { "state": "AWAY", "lastNotificationAt": null, "consecutiveCloseReadings": 1 },
//     "last_check_at": 1736424000000
//   }
// }
// ```

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use crate::TrackingError;
use crate::traits::state_store::{StateStore, StateStoreFactory};

/// State file format version
/// Used for future migration if format changes
const STATE_FILE_VERSION: &str = "1.0";

/// File-based state store with crash recovery
///
/// Every mutation rewrites the whole document before returning, so a
/// successful `set` is durable.
///
/// # Example
///
/// ```rust,no_run
/// use safehome_core::state::FileStateStore;
/// use safehome_core::traits::StateStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileStateStore::new("/var/lib/safehome/state.json").await?;
///
///     store.set("last_check_at", &serde_json::json!(1736424000000i64)).await?;
///
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct FileStateStore {
    path: PathBuf,
    state: RwLock<FileState>,
}

/// Internal state for file-based store
#[derive(Debug)]
struct FileState {
    records: HashMap<String, Value>,
    dirty: bool,
}

/// Serializable state file format
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFileFormat {
    version: String,
    records: HashMap<String, Value>,
}

/// Why a state file could not be loaded
enum LoadError {
    /// Readable but not a valid state document
    Corrupt(String),
    /// Could not be read at all
    Unreadable(TrackingError),
}

impl FileStateStore {
    /// Create or load a file state store
    ///
    /// This will:
    /// 1. Try to load existing state file
    /// 2. If corruption detected, try to load from backup
    /// 3. If both fail, start with empty state
    /// 4. Create parent directories if needed
    pub async fn new<P: AsRef<Path>>(path: P) -> Result<Self, TrackingError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).await.map_err(|e| {
                TrackingError::config(format!(
                    "Failed to create state directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let records = Self::load_state_with_recovery(&path).await?;

        Ok(Self {
            path,
            state: RwLock::new(FileState {
                records,
                dirty: false,
            }),
        })
    }

    /// Path of the main state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load state from file with automatic recovery
    ///
    /// Recovery strategy:
    /// 1. Try to load main state file
    /// 2. If it is corrupted, try loading backup
    /// 3. If backup also fails, start with empty state
    async fn load_state_with_recovery(
        path: &Path,
    ) -> Result<HashMap<String, Value>, TrackingError> {
        let reason = match Self::load_state(path).await {
            Ok(records) => {
                tracing::debug!("Loaded state from file: {} records", records.len());
                return Ok(records);
            }
            Err(LoadError::Unreadable(e)) => return Err(e),
            Err(LoadError::Corrupt(reason)) => reason,
        };

        tracing::warn!(
            "State file appears corrupted: {}. Attempting recovery from backup.",
            reason
        );

        let backup_path = Self::backup_path(path);
        if !backup_path.exists() {
            tracing::warn!("No backup file found. Starting with empty state.");
            return Ok(HashMap::new());
        }

        match Self::load_state(&backup_path).await {
            Ok(records) => {
                tracing::info!("Recovered state from backup: {} records", records.len());
                if let Err(e) = Self::restore_from_backup(path, &backup_path).await {
                    tracing::error!("Failed to restore state file from backup: {}", e);
                }
                Ok(records)
            }
            Err(LoadError::Corrupt(backup_reason)) => {
                tracing::error!(
                    "Backup also corrupted: {}. Starting with empty state.",
                    backup_reason
                );
                Ok(HashMap::new())
            }
            Err(LoadError::Unreadable(e)) => {
                tracing::error!("Backup unreadable: {}. Starting with empty state.", e);
                Ok(HashMap::new())
            }
        }
    }

    /// Load state from file
    async fn load_state(path: &Path) -> Result<HashMap<String, Value>, LoadError> {
        if !path.exists() {
            tracing::debug!("State file does not exist: {}", path.display());
            return Ok(HashMap::new());
        }

        let content = fs::read_to_string(path).await.map_err(|e| {
            LoadError::Unreadable(TrackingError::persistence(format!(
                "Failed to read state file {}: {}",
                path.display(),
                e
            )))
        })?;

        let state_file: StateFileFormat = serde_json::from_str(&content)
            .map_err(|e| LoadError::Corrupt(format!("{}: {}", path.display(), e)))?;

        if state_file.version != STATE_FILE_VERSION {
            tracing::warn!(
                "State file version mismatch: expected {}, got {}. \
                Attempting to load anyway.",
                STATE_FILE_VERSION,
                state_file.version
            );
        }

        Ok(state_file.records)
    }

    /// Write the given records to disk atomically
    ///
    /// Called with the write guard held so concurrent writers cannot
    /// interleave on the temp file.
    async fn write_state(&self, state: &mut FileState) -> Result<(), TrackingError> {
        let state_file = StateFileFormat {
            version: STATE_FILE_VERSION.to_string(),
            records: state.records.clone(),
        };

        let json = serde_json::to_string_pretty(&state_file).map_err(|e| {
            TrackingError::persistence(format!("Failed to serialize state: {}", e))
        })?;

        let temp_path = self.temp_path();
        {
            let mut file = fs::File::create(&temp_path).await.map_err(|e| {
                TrackingError::persistence(format!(
                    "Failed to create temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.write_all(json.as_bytes()).await.map_err(|e| {
                TrackingError::persistence(format!(
                    "Failed to write to temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;

            file.sync_all().await.map_err(|e| {
                TrackingError::persistence(format!(
                    "Failed to sync temp file {}: {}",
                    temp_path.display(),
                    e
                ))
            })?;
        }

        if self.path.exists() {
            let backup_path = Self::backup_path(&self.path);
            if let Err(e) = fs::copy(&self.path, &backup_path).await {
                tracing::warn!("Failed to create backup: {}", e);
            }
        }

        fs::rename(&temp_path, &self.path).await.map_err(|e| {
            TrackingError::persistence(format!(
                "Failed to rename {} to {}: {}",
                temp_path.display(),
                self.path.display(),
                e
            ))
        })?;

        state.dirty = false;
        tracing::trace!("State written to file: {}", self.path.display());
        Ok(())
    }

    /// Restore state file from backup
    async fn restore_from_backup(path: &Path, backup_path: &Path) -> Result<(), TrackingError> {
        fs::copy(backup_path, path).await.map_err(|e| {
            TrackingError::persistence(format!(
                "Failed to restore from backup {} to {}: {}",
                backup_path.display(),
                path.display(),
                e
            ))
        })?;

        tracing::info!("Restored state file from backup");
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut temp = self.path.clone();
        temp.set_extension("tmp");
        temp
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut backup = path.to_path_buf();
        backup.set_extension("backup");
        backup
    }

    /// Apply a mutation and write it through
    ///
    /// On a failed write the in-memory copy is rolled back so readers
    /// never observe a value that is not on disk.
    async fn mutate<F>(&self, apply: F) -> Result<(), TrackingError>
    where
        F: FnOnce(&mut HashMap<String, Value>) + Send,
    {
        let mut guard = self.state.write().await;
        let previous = guard.records.clone();
        apply(&mut guard.records);
        guard.dirty = true;

        if let Err(e) = self.write_state(&mut guard).await {
            guard.records = previous;
            guard.dirty = false;
            return Err(e);
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, TrackingError> {
        Ok(self.state.read().await.records.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &Value) -> Result<(), TrackingError> {
        let key = key.to_string();
        let value = value.clone();
        self.mutate(move |records| {
            records.insert(key, value);
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<(), TrackingError> {
        self.mutate(|records| {
            records.remove(key);
        })
        .await
    }

    async fn keys(&self) -> Result<Vec<String>, TrackingError> {
        Ok(self.state.read().await.records.keys().cloned().collect())
    }

    async fn flush(&self) -> Result<(), TrackingError> {
        let mut guard = self.state.write().await;
        if guard.dirty {
            self.write_state(&mut guard).await
        } else {
            Ok(())
        }
    }
}

/// Factory registered as `"file"`
///
/// Expects the serialized `StateStoreConfig::File` (`{"type": "file", "path": ...}`).
pub struct FileStateStoreFactory;

#[async_trait]
impl StateStoreFactory for FileStateStoreFactory {
    async fn create(&self, config: &Value) -> Result<Box<dyn StateStore>, TrackingError> {
        let path = config
            .get("path")
            .and_then(Value::as_str)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| TrackingError::config("File state store requires a non-empty path"))?;

        Ok(Box::new(FileStateStore::new(path).await?))
    }
}
