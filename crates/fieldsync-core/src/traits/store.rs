// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Record store trait: durable keyed storage for deliveries, events, media
//! assets, and data queue items.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FieldSyncError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{
    DataQueueItem, DataQueueItemPatch, Delivery, DeliveryOutcome, DeliveryPatch, Event,
    MediaAsset, MediaPatch, NewDataQueueItem, NewEvent, NewMediaAsset,
};

/// CRUD over the four entity kinds the sync engine touches.
///
/// The store holds no retry or sync policy. Two invariants are enforced here
/// because they must hold against concurrent writers:
///
/// - a delivery has at most one data queue item at a time, and
/// - a delivery reaches a terminal status only together with the queue item
///   that represents it ([`record_outcome`](RecordStore::record_outcome)).
///
/// Listing operations return items in insertion order unless noted.
#[async_trait]
pub trait RecordStore: PluginAdapter {
    // --- Deliveries ---

    async fn insert_delivery(&self, delivery: &Delivery) -> Result<(), FieldSyncError>;

    async fn get_delivery(&self, id: &str) -> Result<Option<Delivery>, FieldSyncError>;

    /// All deliveries, most recently created first.
    async fn list_deliveries(&self) -> Result<Vec<Delivery>, FieldSyncError>;

    /// Applies `patch` and bumps `updated_at`. Fails with `NotFound` for an unknown id.
    async fn update_delivery(&self, id: &str, patch: &DeliveryPatch)
    -> Result<(), FieldSyncError>;

    // --- Events ---

    async fn append_event(&self, event: &NewEvent) -> Result<Event, FieldSyncError>;

    async fn list_events(&self, delivery_id: &str) -> Result<Vec<Event>, FieldSyncError>;

    // --- Media ---

    async fn insert_media(&self, media: &NewMediaAsset) -> Result<MediaAsset, FieldSyncError>;

    /// Every media asset whose status is not `COMPLETED`.
    async fn list_pending_media(&self) -> Result<Vec<MediaAsset>, FieldSyncError>;

    async fn update_media(&self, id: &str, patch: &MediaPatch) -> Result<(), FieldSyncError>;

    /// Operator action: makes a terminally failed asset eligible again.
    async fn requeue_media(&self, id: &str) -> Result<(), FieldSyncError>;

    // --- Data queue ---

    async fn list_data_queue_items(&self) -> Result<Vec<DataQueueItem>, FieldSyncError>;

    /// Fails with `InvariantViolation` if the delivery already has a queue item.
    async fn insert_data_queue_item(
        &self,
        item: &NewDataQueueItem,
    ) -> Result<DataQueueItem, FieldSyncError>;

    async fn update_data_queue_item(
        &self,
        id: i64,
        patch: &DataQueueItemPatch,
    ) -> Result<(), FieldSyncError>;

    async fn remove_data_queue_item(&self, id: i64) -> Result<(), FieldSyncError>;

    /// Operator action: resets retry accounting on a stuck item.
    async fn requeue_data_queue_item(&self, id: i64) -> Result<(), FieldSyncError>;

    // --- Composite ---

    /// Atomically appends the terminal event, registers captured media,
    /// enqueues the outcome transaction, and moves the delivery to its
    /// terminal status with `PENDING_SYNC_CONFIRMATION`.
    async fn record_outcome(
        &self,
        outcome: &DeliveryOutcome,
    ) -> Result<DataQueueItem, FieldSyncError>;

    // --- Sync lease ---

    /// Take or renew the store-wide sync lease for `owner`, valid for `ttl`.
    ///
    /// Returns `false` while a different owner holds an unexpired lease. Every
    /// process syncing against the same store shares this lease, so at most
    /// one pass runs per store.
    async fn acquire_sync_lease(&self, owner: &str, ttl: Duration)
    -> Result<bool, FieldSyncError>;

    /// Drop the lease if `owner` still holds it.
    async fn release_sync_lease(&self, owner: &str) -> Result<(), FieldSyncError>;
}
