// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Eligibility and status-transition rules shared by the queue processors and
//! the operator queue view.
//!
//! The two queues deliberately use different retry boundaries: a data item is
//! attempted while `retry_count < max_retry`, a media asset while
//! `retry_count <= max_retry`.

use fieldsync_core::types::{
    DataQueueItem, MediaAsset, MediaSyncStatus, QueueItemStatus,
};
use fieldsync_core::{FieldSyncError, RecordStore};
use serde::Serialize;

/// Whether a data queue item is attempted on the next pass.
pub fn data_item_eligible(item: &DataQueueItem, max_retry: u32) -> bool {
    item.status == QueueItemStatus::Pending && item.retry_count < max_retry
}

/// Whether a media asset is attempted on the next pass.
pub fn media_eligible(asset: &MediaAsset, max_retry: u32) -> bool {
    matches!(
        asset.sync_status,
        MediaSyncStatus::Pending | MediaSyncStatus::Retrying
    ) && asset.retry_count <= max_retry
}

/// Retry count stamped on an asset whose file is gone, so it is never retried.
pub fn missing_file_retry_count(max_retry: u32) -> u32 {
    max_retry.saturating_add(1)
}

/// Status after a transient upload failure brought the count to `retry_count`.
pub fn media_status_after_transient(retry_count: u32, max_retry: u32) -> MediaSyncStatus {
    if retry_count <= max_retry {
        MediaSyncStatus::Retrying
    } else {
        MediaSyncStatus::Failed
    }
}

/// A data item that will not be attempted again without operator action.
pub fn data_item_stuck(item: &DataQueueItem, max_retry: u32) -> bool {
    !data_item_eligible(item, max_retry)
}

/// A media asset that will not be attempted again without operator action.
pub fn media_stuck(asset: &MediaAsset, max_retry: u32) -> bool {
    asset.sync_status != MediaSyncStatus::Completed && !media_eligible(asset, max_retry)
}

/// Counts of unconfirmed work per queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Backlog {
    pub data_pending: usize,
    pub data_stuck: usize,
    pub media_pending: usize,
    pub media_stuck: usize,
}

impl Backlog {
    pub fn from_queues(items: &[DataQueueItem], media: &[MediaAsset], max_retry: u32) -> Self {
        let data_stuck = items.iter().filter(|i| data_item_stuck(i, max_retry)).count();
        let media_stuck = media.iter().filter(|m| media_stuck(m, max_retry)).count();
        let media_open = media
            .iter()
            .filter(|m| m.sync_status != MediaSyncStatus::Completed)
            .count();
        Self {
            data_pending: items.len() - data_stuck,
            data_stuck,
            media_pending: media_open - media_stuck,
            media_stuck,
        }
    }

    /// Read both queues from the store.
    pub async fn read(store: &dyn RecordStore, max_retry: u32) -> Result<Self, FieldSyncError> {
        let items = store.list_data_queue_items().await?;
        let media = store.list_pending_media().await?;
        Ok(Self::from_queues(&items, &media, max_retry))
    }

    pub fn is_empty(&self) -> bool {
        self.data_pending + self.data_stuck + self.media_pending + self.media_stuck == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::types::{now_timestamp, MediaType, QueueItemType};
    use proptest::prelude::*;

    fn item(status: QueueItemStatus, retry_count: u32) -> DataQueueItem {
        DataQueueItem {
            id: 1,
            item_type: QueueItemType::DeliveryCompletion,
            delivery_id: "del_1".into(),
            payload: serde_json::Value::Null,
            status,
            retry_count,
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        }
    }

    fn asset(sync_status: MediaSyncStatus, retry_count: u32) -> MediaAsset {
        MediaAsset {
            id: "med_1".into(),
            delivery_id: "del_1".into(),
            media_type: MediaType::Photo,
            local_path: "/tmp/p.jpg".into(),
            sync_status,
            retry_count,
            created_at: now_timestamp(),
        }
    }

    #[test]
    fn boundaries_differ_between_queues() {
        assert!(data_item_eligible(&item(QueueItemStatus::Pending, 2), 3));
        assert!(!data_item_eligible(&item(QueueItemStatus::Pending, 3), 3));
        assert!(media_eligible(&asset(MediaSyncStatus::Retrying, 3), 3));
        assert!(!media_eligible(&asset(MediaSyncStatus::Retrying, 4), 3));
    }

    #[test]
    fn terminal_statuses_are_never_eligible() {
        assert!(!data_item_eligible(&item(QueueItemStatus::FailedTerminal, 0), 3));
        assert!(!media_eligible(&asset(MediaSyncStatus::Failed, 0), 3));
        assert!(!media_eligible(&asset(MediaSyncStatus::Completed, 0), 3));
    }

    #[test]
    fn backlog_splits_pending_from_stuck() {
        let items = vec![
            item(QueueItemStatus::Pending, 0),
            item(QueueItemStatus::Pending, 3),
            item(QueueItemStatus::FailedTerminal, 1),
        ];
        let media = vec![
            asset(MediaSyncStatus::Pending, 0),
            asset(MediaSyncStatus::Retrying, 2),
            asset(MediaSyncStatus::Failed, 4),
        ];
        let backlog = Backlog::from_queues(&items, &media, 3);
        assert_eq!(
            backlog,
            Backlog {
                data_pending: 1,
                data_stuck: 2,
                media_pending: 2,
                media_stuck: 1,
            }
        );
        assert!(!backlog.is_empty());
        assert!(Backlog::from_queues(&[], &[], 3).is_empty());
    }

    proptest! {
        #[test]
        fn missing_file_sentinel_is_never_eligible(max_retry in 1u32..1000) {
            let a = asset(MediaSyncStatus::Pending, missing_file_retry_count(max_retry));
            prop_assert!(!media_eligible(&a, max_retry));
        }

        #[test]
        fn transient_status_agrees_with_eligibility(retry in 0u32..50, max_retry in 1u32..20) {
            let status = media_status_after_transient(retry, max_retry);
            let a = asset(status, retry);
            prop_assert_eq!(media_eligible(&a, max_retry), status == MediaSyncStatus::Retrying);
        }

        #[test]
        fn data_item_is_eligible_or_stuck(retry in 0u32..50, max_retry in 1u32..20, terminal: bool) {
            let status = if terminal { QueueItemStatus::FailedTerminal } else { QueueItemStatus::Pending };
            let i = item(status, retry);
            prop_assert_ne!(data_item_eligible(&i, max_retry), data_item_stuck(&i, max_retry));
        }
    }
}
