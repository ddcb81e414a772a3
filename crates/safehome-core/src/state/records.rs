//! Typed access to the tracker's three records
//!
//! The [`StateStore`] port deals in raw JSON values; this wrapper owns the
//! key names and the schema of each record. A value that is present but
//! does not decode is a persistence failure, not an absent record.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, TrackingError};
use crate::model::{HomeLocation, TrackerSnapshot};
use crate::traits::StateStore;

/// Key of the configured home location
pub const HOME_LOCATION_KEY: &str = "home_location";

/// Key of the state machine snapshot
pub const TRACKER_SNAPSHOT_KEY: &str = "tracker_snapshot";

/// Key of the diagnostic last-completed-sample timestamp (epoch ms)
pub const LAST_CHECK_AT_KEY: &str = "last_check_at";

/// Typed view over a state store
#[derive(Clone, Copy)]
pub struct TrackerRecords<'a> {
    store: &'a dyn StateStore,
}

impl<'a> TrackerRecords<'a> {
    pub fn new(store: &'a dyn StateStore) -> Self {
        Self { store }
    }

    pub async fn load_home(&self) -> Result<Option<HomeLocation>> {
        self.load(HOME_LOCATION_KEY).await
    }

    pub async fn save_home(&self, home: &HomeLocation) -> Result<()> {
        self.save(HOME_LOCATION_KEY, home).await
    }

    pub async fn load_snapshot(&self) -> Result<Option<TrackerSnapshot>> {
        self.load(TRACKER_SNAPSHOT_KEY).await
    }

    pub async fn save_snapshot(&self, snapshot: &TrackerSnapshot) -> Result<()> {
        self.save(TRACKER_SNAPSHOT_KEY, snapshot).await
    }

    pub async fn load_last_check(&self) -> Result<Option<DateTime<Utc>>> {
        let millis: Option<i64> = self.load(LAST_CHECK_AT_KEY).await?;
        Ok(millis.and_then(DateTime::from_timestamp_millis))
    }

    pub async fn save_last_check(&self, at: DateTime<Utc>) -> Result<()> {
        self.save(LAST_CHECK_AT_KEY, &at.timestamp_millis()).await
    }

    /// Delete all three records
    pub async fn clear(&self) -> Result<()> {
        for key in [TRACKER_SNAPSHOT_KEY, HOME_LOCATION_KEY, LAST_CHECK_AT_KEY] {
            self.store.delete(key).await?;
        }
        Ok(())
    }

    async fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.get(key).await? {
            None => Ok(None),
            Some(value) => serde_json::from_value(value).map(Some).map_err(|e| {
                TrackingError::persistence(format!("Record {} is malformed: {}", key, e))
            }),
        }
    }

    async fn save<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.store.set(key, &value).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TrackerState;
    use crate::state::MemoryStateStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_snapshot_round_trip_through_store() {
        let store = MemoryStateStore::new();
        let records = TrackerRecords::new(&store);

        assert_eq!(records.load_snapshot().await.unwrap(), None);

        let snapshot = TrackerSnapshot {
            state: TrackerState::Away,
            last_notification_at: DateTime::from_timestamp_millis(1_736_424_000_000),
            consecutive_close_readings: 1,
        };
        records.save_snapshot(&snapshot).await.unwrap();
        assert_eq!(records.load_snapshot().await.unwrap(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_malformed_record_is_persistence_failure() {
        let store = MemoryStateStore::new();
        store
            .set(TRACKER_SNAPSHOT_KEY, &json!({"state": "SOMEWHERE"}))
            .await
            .unwrap();

        let err = TrackerRecords::new(&store).load_snapshot().await.unwrap_err();
        assert!(matches!(err, TrackingError::Persistence(_)));
    }

    #[tokio::test]
    async fn test_last_check_stored_as_millis() {
        let store = MemoryStateStore::new();
        let records = TrackerRecords::new(&store);
        let at = DateTime::from_timestamp_millis(1_736_424_000_123).unwrap();

        records.save_last_check(at).await.unwrap();
        assert_eq!(
            store.get(LAST_CHECK_AT_KEY).await.unwrap(),
            Some(json!(1_736_424_000_123i64))
        );
        assert_eq!(records.load_last_check().await.unwrap(), Some(at));
    }

    #[tokio::test]
    async fn test_clear_removes_everything() {
        let store = MemoryStateStore::new();
        let records = TrackerRecords::new(&store);
        records
            .save_home(&HomeLocation::new(14.5995, 120.9842, "Home"))
            .await
            .unwrap();
        records.save_snapshot(&TrackerSnapshot::initial()).await.unwrap();
        records.save_last_check(Utc::now()).await.unwrap();

        records.clear().await.unwrap();
        assert!(store.is_empty().await);
    }
}
