// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`RecordStore`].
//!
//! Enforces the same invariants as the SQLite store (one open queue item per
//! delivery, atomic outcomes, `NotFound` on unknown ids) so engine tests do not
//! depend on a database file.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use fieldsync_core::types::{
    now_millis, now_timestamp, AdapterType, DataQueueItem, DataQueueItemPatch, Delivery, DeliveryOutcome,
    DeliveryPatch, DeliverySyncStatus, Event, HealthStatus, MediaAsset, MediaPatch,
    MediaSyncStatus, NewDataQueueItem, NewEvent, NewMediaAsset, QueueItemStatus,
};
use fieldsync_core::{FieldSyncError, PluginAdapter, RecordStore};

#[derive(Default)]
struct State {
    deliveries: Vec<Delivery>,
    events: Vec<Event>,
    media: Vec<MediaAsset>,
    data_queue: BTreeMap<i64, DataQueueItem>,
    next_item_id: i64,
    /// Sync lease holder and expiry in epoch millis.
    lease: Option<(String, i64)>,
}

impl State {
    fn delivery_mut(&mut self, id: &str) -> Result<&mut Delivery, FieldSyncError> {
        self.deliveries
            .iter_mut()
            .find(|d| d.id == id)
            .ok_or_else(|| not_found("delivery", id))
    }

    fn has_delivery(&self, id: &str) -> bool {
        self.deliveries.iter().any(|d| d.id == id)
    }

    fn new_event(&mut self, event: &NewEvent) -> Event {
        let stored = Event {
            id: uuid::Uuid::new_v4().to_string(),
            delivery_id: event.delivery_id.clone(),
            event_type: event.event_type,
            location: event.location,
            reason: event.reason.clone(),
            notes: event.notes.clone(),
            created_at: now_timestamp(),
        };
        self.events.push(stored.clone());
        stored
    }

    fn new_media(&mut self, media: &NewMediaAsset) -> MediaAsset {
        let stored = MediaAsset {
            id: uuid::Uuid::new_v4().to_string(),
            delivery_id: media.delivery_id.clone(),
            media_type: media.media_type,
            local_path: media.local_path.clone(),
            sync_status: MediaSyncStatus::Pending,
            retry_count: 0,
            created_at: now_timestamp(),
        };
        self.media.push(stored.clone());
        stored
    }

    fn check_can_enqueue(&self, delivery_id: &str) -> Result<(), FieldSyncError> {
        if !self.has_delivery(delivery_id) {
            return Err(not_found("delivery", delivery_id));
        }
        if let Some(existing) = self
            .data_queue
            .values()
            .find(|item| item.delivery_id == delivery_id)
        {
            return Err(FieldSyncError::InvariantViolation(format!(
                "delivery {delivery_id} already has open queue item {}",
                existing.id
            )));
        }
        Ok(())
    }

    fn new_item(&mut self, item: &NewDataQueueItem) -> DataQueueItem {
        self.next_item_id += 1;
        let now = now_timestamp();
        let stored = DataQueueItem {
            id: self.next_item_id,
            item_type: item.item_type,
            delivery_id: item.delivery_id.clone(),
            payload: item.payload.clone(),
            status: QueueItemStatus::Pending,
            retry_count: 0,
            created_at: now.clone(),
            updated_at: now,
        };
        self.data_queue.insert(stored.id, stored.clone());
        stored
    }
}

fn not_found(entity: &'static str, id: impl ToString) -> FieldSyncError {
    FieldSyncError::NotFound {
        entity,
        id: id.to_string(),
    }
}

/// Record store backed by in-process collections.
#[derive(Default)]
pub struct MemoryRecordStore {
    state: Mutex<State>,
    fail_reads: AtomicBool,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the queue listing operations fail with a storage error, to
    /// simulate an unexpected error inside a pass.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), FieldSyncError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(FieldSyncError::storage("injected read failure"));
        }
        Ok(())
    }

    /// Every media asset, including completed ones.
    pub async fn all_media(&self) -> Vec<MediaAsset> {
        self.state.lock().await.media.clone()
    }
}

#[async_trait]
impl PluginAdapter for MemoryRecordStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::RecordStore
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldSyncError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FieldSyncError> {
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert_delivery(&self, delivery: &Delivery) -> Result<(), FieldSyncError> {
        let mut state = self.state.lock().await;
        if state.has_delivery(&delivery.id) {
            return Err(FieldSyncError::InvariantViolation(format!(
                "delivery {} already exists",
                delivery.id
            )));
        }
        state.deliveries.push(delivery.clone());
        Ok(())
    }

    async fn get_delivery(&self, id: &str) -> Result<Option<Delivery>, FieldSyncError> {
        let state = self.state.lock().await;
        Ok(state.deliveries.iter().find(|d| d.id == id).cloned())
    }

    async fn list_deliveries(&self) -> Result<Vec<Delivery>, FieldSyncError> {
        let state = self.state.lock().await;
        Ok(state.deliveries.iter().rev().cloned().collect())
    }

    async fn update_delivery(
        &self,
        id: &str,
        patch: &DeliveryPatch,
    ) -> Result<(), FieldSyncError> {
        let mut state = self.state.lock().await;
        let delivery = state.delivery_mut(id)?;
        if let Some(status) = patch.status {
            delivery.status = status;
        }
        if let Some(sync_status) = patch.sync_status {
            delivery.sync_status = sync_status;
        }
        delivery.updated_at = now_timestamp();
        Ok(())
    }

    async fn append_event(&self, event: &NewEvent) -> Result<Event, FieldSyncError> {
        let mut state = self.state.lock().await;
        if !state.has_delivery(&event.delivery_id) {
            return Err(not_found("delivery", &event.delivery_id));
        }
        Ok(state.new_event(event))
    }

    async fn list_events(&self, delivery_id: &str) -> Result<Vec<Event>, FieldSyncError> {
        let state = self.state.lock().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.delivery_id == delivery_id)
            .cloned()
            .collect())
    }

    async fn insert_media(&self, media: &NewMediaAsset) -> Result<MediaAsset, FieldSyncError> {
        let mut state = self.state.lock().await;
        if !state.has_delivery(&media.delivery_id) {
            return Err(not_found("delivery", &media.delivery_id));
        }
        Ok(state.new_media(media))
    }

    async fn list_pending_media(&self) -> Result<Vec<MediaAsset>, FieldSyncError> {
        self.check_reads()?;
        let state = self.state.lock().await;
        Ok(state
            .media
            .iter()
            .filter(|m| m.sync_status != MediaSyncStatus::Completed)
            .cloned()
            .collect())
    }

    async fn update_media(&self, id: &str, patch: &MediaPatch) -> Result<(), FieldSyncError> {
        let mut state = self.state.lock().await;
        let asset = state
            .media
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or_else(|| not_found("media", id))?;
        if let Some(status) = patch.sync_status {
            asset.sync_status = status;
        }
        if let Some(retry_count) = patch.retry_count {
            asset.retry_count = retry_count;
        }
        Ok(())
    }

    async fn requeue_media(&self, id: &str) -> Result<(), FieldSyncError> {
        self.update_media(
            id,
            &MediaPatch {
                sync_status: Some(MediaSyncStatus::Pending),
                retry_count: Some(0),
            },
        )
        .await
    }

    async fn list_data_queue_items(&self) -> Result<Vec<DataQueueItem>, FieldSyncError> {
        self.check_reads()?;
        let state = self.state.lock().await;
        Ok(state.data_queue.values().cloned().collect())
    }

    async fn insert_data_queue_item(
        &self,
        item: &NewDataQueueItem,
    ) -> Result<DataQueueItem, FieldSyncError> {
        let mut state = self.state.lock().await;
        state.check_can_enqueue(&item.delivery_id)?;
        Ok(state.new_item(item))
    }

    async fn update_data_queue_item(
        &self,
        id: i64,
        patch: &DataQueueItemPatch,
    ) -> Result<(), FieldSyncError> {
        let mut state = self.state.lock().await;
        let item = state
            .data_queue
            .get_mut(&id)
            .ok_or_else(|| not_found("data queue item", id))?;
        if let Some(status) = patch.status {
            item.status = status;
        }
        if let Some(retry_count) = patch.retry_count {
            item.retry_count = retry_count;
        }
        item.updated_at = now_timestamp();
        Ok(())
    }

    async fn remove_data_queue_item(&self, id: i64) -> Result<(), FieldSyncError> {
        let mut state = self.state.lock().await;
        state
            .data_queue
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("data queue item", id))
    }

    async fn requeue_data_queue_item(&self, id: i64) -> Result<(), FieldSyncError> {
        self.update_data_queue_item(
            id,
            &DataQueueItemPatch {
                status: Some(QueueItemStatus::Pending),
                retry_count: Some(0),
            },
        )
        .await
    }

    async fn record_outcome(
        &self,
        outcome: &DeliveryOutcome,
    ) -> Result<DataQueueItem, FieldSyncError> {
        outcome
            .validate()
            .map_err(FieldSyncError::InvariantViolation)?;

        // All checks happen before the first write, under one lock.
        let mut state = self.state.lock().await;
        let status = state.delivery_mut(&outcome.delivery_id)?.status;
        if status.is_terminal() {
            return Err(FieldSyncError::InvariantViolation(format!(
                "delivery {} is already {status}",
                outcome.delivery_id
            )));
        }
        state.check_can_enqueue(&outcome.delivery_id)?;

        let event = state.new_event(&NewEvent {
            delivery_id: outcome.delivery_id.clone(),
            event_type: outcome.event_type(),
            location: outcome.location,
            reason: outcome.reason.clone(),
            notes: outcome.notes.clone(),
        });
        for (media_type, local_path) in &outcome.media {
            state.new_media(&NewMediaAsset {
                delivery_id: outcome.delivery_id.clone(),
                media_type: *media_type,
                local_path: local_path.clone(),
            });
        }
        let item = state.new_item(&NewDataQueueItem {
            item_type: outcome.queue_item_type(),
            delivery_id: outcome.delivery_id.clone(),
            payload: outcome.payload(&event),
        });

        let delivery = state.delivery_mut(&outcome.delivery_id)?;
        delivery.status = outcome.delivery_status();
        delivery.sync_status = DeliverySyncStatus::PendingSyncConfirmation;
        delivery.updated_at = now_timestamp();
        Ok(item)
    }

    async fn acquire_sync_lease(
        &self,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, FieldSyncError> {
        let mut state = self.state.lock().await;
        let now = now_millis();
        if let Some((holder, expires_at)) = &state.lease
            && holder != owner
            && *expires_at > now
        {
            return Ok(false);
        }
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        state.lease = Some((owner.to_string(), now.saturating_add(ttl_ms)));
        Ok(true)
    }

    async fn release_sync_lease(&self, owner: &str) -> Result<(), FieldSyncError> {
        let mut state = self.state.lock().await;
        if state.lease.as_ref().is_some_and(|(holder, _)| holder == owner) {
            state.lease = None;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::types::{MediaType, OutcomeKind, QueueItemType};

    async fn store_with(ids: &[&str]) -> MemoryRecordStore {
        let store = MemoryRecordStore::new();
        for id in ids {
            store
                .insert_delivery(&Delivery::new(*id, "R", "A"))
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn enforces_one_open_item_per_delivery() {
        let store = store_with(&["del_1"]).await;
        let item = NewDataQueueItem {
            item_type: QueueItemType::DeliveryFailure,
            delivery_id: "del_1".into(),
            payload: serde_json::json!({}),
        };
        store.insert_data_queue_item(&item).await.unwrap();
        assert!(matches!(
            store.insert_data_queue_item(&item).await.unwrap_err(),
            FieldSyncError::InvariantViolation(_)
        ));
    }

    #[tokio::test]
    async fn rejected_outcome_writes_nothing() {
        let store = store_with(&["del_1"]).await;
        let outcome = DeliveryOutcome {
            delivery_id: "del_1".into(),
            kind: OutcomeKind::Completed,
            location: None,
            reason: None,
            notes: None,
            media: vec![(MediaType::Signature, "/tmp/s.png".into())],
        };
        store.record_outcome(&outcome).await.unwrap();
        assert!(store.record_outcome(&outcome).await.is_err());
        assert_eq!(store.all_media().await.len(), 1);
        assert_eq!(store.list_events("del_1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sync_lease_excludes_other_owners() {
        let store = MemoryRecordStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.acquire_sync_lease("a", ttl).await.unwrap());
        assert!(!store.acquire_sync_lease("b", ttl).await.unwrap());
        store.release_sync_lease("a").await.unwrap();
        assert!(store.acquire_sync_lease("b", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn injected_read_failure() {
        let store = store_with(&[]).await;
        store.set_fail_reads(true);
        assert!(store.list_data_queue_items().await.is_err());
        store.set_fail_reads(false);
        assert!(store.list_data_queue_items().await.unwrap().is_empty());
    }
}
