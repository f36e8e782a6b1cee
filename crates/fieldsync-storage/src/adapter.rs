// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`RecordStore`] trait.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use fieldsync_config::model::StorageConfig;
use fieldsync_core::types::{
    DataQueueItem, DataQueueItemPatch, Delivery, DeliveryOutcome, DeliveryPatch, Event,
    MediaAsset, MediaPatch, NewDataQueueItem, NewEvent, NewMediaAsset,
};
use fieldsync_core::{AdapterType, FieldSyncError, HealthStatus, PluginAdapter, RecordStore};

use crate::database::{map_tr_err, Database};
use crate::queries;

/// SQLite-backed record store.
///
/// The database is opened lazily by [`initialize`](SqliteRecordStore::initialize);
/// every trait method fails with a storage error until then.
pub struct SqliteRecordStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteRecordStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// An already-initialized store over an in-memory database.
    pub async fn open_in_memory() -> Result<Self, FieldSyncError> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            config: StorageConfig {
                database_path: ":memory:".into(),
                wal_mode: false,
            },
            db: OnceCell::new_with(Some(db)),
        })
    }

    /// Open the configured database file and apply migrations.
    pub async fn initialize(&self) -> Result<(), FieldSyncError> {
        let path = self.config.database_path.clone();
        let db = Database::open_with(&path, self.config.wal_mode).await?;
        self.db
            .set(db)
            .map_err(|_| FieldSyncError::storage("record store already initialized"))?;
        info!(path = %path, "record store initialized");
        Ok(())
    }

    fn db(&self) -> Result<&Database, FieldSyncError> {
        self.db
            .get()
            .ok_or_else(|| FieldSyncError::storage("record store not initialized"))
    }
}

#[async_trait]
impl PluginAdapter for SqliteRecordStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RecordStore
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldSyncError> {
        let Some(db) = self.db.get() else {
            return Ok(HealthStatus::Unhealthy("not initialized".into()));
        };
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch("SELECT 1;") })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FieldSyncError> {
        if let Some(db) = self.db.get()
            && self.config.wal_mode
        {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    // --- Deliveries ---

    async fn insert_delivery(&self, delivery: &Delivery) -> Result<(), FieldSyncError> {
        queries::deliveries::insert_delivery(self.db()?, delivery).await
    }

    async fn get_delivery(&self, id: &str) -> Result<Option<Delivery>, FieldSyncError> {
        queries::deliveries::get_delivery(self.db()?, id).await
    }

    async fn list_deliveries(&self) -> Result<Vec<Delivery>, FieldSyncError> {
        queries::deliveries::list_deliveries(self.db()?).await
    }

    async fn update_delivery(
        &self,
        id: &str,
        patch: &DeliveryPatch,
    ) -> Result<(), FieldSyncError> {
        queries::deliveries::update_delivery(self.db()?, id, patch).await
    }

    // --- Events ---

    async fn append_event(&self, event: &NewEvent) -> Result<Event, FieldSyncError> {
        queries::events::append_event(self.db()?, event).await
    }

    async fn list_events(&self, delivery_id: &str) -> Result<Vec<Event>, FieldSyncError> {
        queries::events::list_events(self.db()?, delivery_id).await
    }

    // --- Media ---

    async fn insert_media(&self, media: &NewMediaAsset) -> Result<MediaAsset, FieldSyncError> {
        queries::media::insert_media(self.db()?, media).await
    }

    async fn list_pending_media(&self) -> Result<Vec<MediaAsset>, FieldSyncError> {
        queries::media::list_pending_media(self.db()?).await
    }

    async fn update_media(&self, id: &str, patch: &MediaPatch) -> Result<(), FieldSyncError> {
        queries::media::update_media(self.db()?, id, patch).await
    }

    async fn requeue_media(&self, id: &str) -> Result<(), FieldSyncError> {
        queries::media::requeue_media(self.db()?, id).await
    }

    // --- Data queue ---

    async fn list_data_queue_items(&self) -> Result<Vec<DataQueueItem>, FieldSyncError> {
        queries::data_queue::list_items(self.db()?).await
    }

    async fn insert_data_queue_item(
        &self,
        item: &NewDataQueueItem,
    ) -> Result<DataQueueItem, FieldSyncError> {
        queries::data_queue::insert_item(self.db()?, item).await
    }

    async fn update_data_queue_item(
        &self,
        id: i64,
        patch: &DataQueueItemPatch,
    ) -> Result<(), FieldSyncError> {
        queries::data_queue::update_item(self.db()?, id, patch).await
    }

    async fn remove_data_queue_item(&self, id: i64) -> Result<(), FieldSyncError> {
        queries::data_queue::remove_item(self.db()?, id).await
    }

    async fn requeue_data_queue_item(&self, id: i64) -> Result<(), FieldSyncError> {
        queries::data_queue::requeue_item(self.db()?, id).await
    }

    // --- Composite ---

    async fn record_outcome(
        &self,
        outcome: &DeliveryOutcome,
    ) -> Result<DataQueueItem, FieldSyncError> {
        queries::outcomes::record_outcome(self.db()?, outcome).await
    }

    // --- Sync lease ---

    async fn acquire_sync_lease(
        &self,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, FieldSyncError> {
        queries::lease::acquire(self.db()?, owner, ttl).await
    }

    async fn release_sync_lease(&self, owner: &str) -> Result<(), FieldSyncError> {
        queries::lease::release(self.db()?, owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uninitialized_store_reports_unhealthy() {
        let store = SqliteRecordStore::new(StorageConfig::default());
        assert!(matches!(
            store.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
        assert!(store.list_deliveries().await.is_err());
    }

    #[tokio::test]
    async fn initialize_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteRecordStore::new(StorageConfig {
            database_path: dir.path().join("f.db").to_string_lossy().into_owned(),
            wal_mode: true,
        });
        store.initialize().await.unwrap();
        assert_eq!(store.health_check().await.unwrap(), HealthStatus::Healthy);
        assert!(store.initialize().await.is_err());
        store.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn adapter_identity() {
        let store = SqliteRecordStore::open_in_memory().await.unwrap();
        assert_eq!(store.name(), "sqlite");
        assert_eq!(store.adapter_type(), AdapterType::RecordStore);
    }
}
