// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fieldsync queue` command implementation.
//!
//! Lists unconfirmed data queue items and media assets, and requeues items
//! that exhausted their retry allowance or were rejected by the remote.

use clap::{Subcommand, ValueEnum};
use fieldsync_config::FieldSyncConfig;
use fieldsync_core::types::{DataQueueItem, MediaAsset};
use fieldsync_core::{FieldSyncError, PluginAdapter, RecordStore};
use fieldsync_sync::status::{data_item_stuck, media_stuck};
use serde::Serialize;

use crate::Output;

#[derive(Subcommand, Debug)]
pub enum QueueAction {
    /// Reset a stuck item so the next pass sends it again.
    Retry {
        /// Which queue the item lives in.
        kind: QueueKind,
        /// Data queue item id or media asset id.
        id: String,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueKind {
    Data,
    Media,
}

/// One row of the `queue` listing.
#[derive(Debug, Serialize)]
pub struct QueueRow {
    pub queue: &'static str,
    pub id: String,
    pub delivery_id: String,
    pub kind: String,
    pub status: String,
    pub retry_count: u32,
    pub stuck: bool,
    pub created_at: String,
}

impl QueueRow {
    fn from_item(item: &DataQueueItem, max_retry: u32) -> Self {
        Self {
            queue: "data",
            id: item.id.to_string(),
            delivery_id: item.delivery_id.clone(),
            kind: item.item_type.to_string(),
            status: item.status.to_string(),
            retry_count: item.retry_count,
            stuck: data_item_stuck(item, max_retry),
            created_at: item.created_at.clone(),
        }
    }

    fn from_media(asset: &MediaAsset, max_retry: u32) -> Self {
        Self {
            queue: "media",
            id: asset.id.clone(),
            delivery_id: asset.delivery_id.clone(),
            kind: asset.media_type.to_string(),
            status: asset.sync_status.to_string(),
            retry_count: asset.retry_count,
            stuck: media_stuck(asset, max_retry),
            created_at: asset.created_at.clone(),
        }
    }
}

/// Run the `fieldsync queue` command.
pub async fn run_queue(
    config: &FieldSyncConfig,
    action: Option<QueueAction>,
    output: Output,
) -> Result<(), FieldSyncError> {
    let store = crate::open_store(config).await?;
    let result = match action {
        None => list(&store, config.sync.max_retry, output).await,
        Some(QueueAction::Retry { kind, id }) => retry(&store, kind, &id, output).await,
    };
    store.shutdown().await?;
    result
}

async fn list(store: &dyn RecordStore, max_retry: u32, output: Output) -> Result<(), FieldSyncError> {
    let rows = queue_rows(store, max_retry).await?;

    if output.json {
        return output.print_json(&rows);
    }
    if rows.is_empty() {
        println!("queue is empty");
        return Ok(());
    }

    let use_color = output.use_color();
    println!(
        "{:<6} {:<38} {:<16} {:<20} {:<16} {:>5}",
        "QUEUE", "ID", "DELIVERY", "KIND", "STATUS", "TRIES"
    );
    for row in &rows {
        let status = if row.stuck {
            format!("{} (stuck)", row.status)
        } else {
            row.status.clone()
        };
        let status = if use_color && row.stuck {
            use colored::Colorize;
            format!("{:<16}", status).red().to_string()
        } else {
            format!("{status:<16}")
        };
        println!(
            "{:<6} {:<38} {:<16} {:<20} {} {:>5}",
            row.queue, row.id, row.delivery_id, row.kind, status, row.retry_count
        );
    }
    Ok(())
}

/// Data items first, then media, each in stored order.
async fn queue_rows(store: &dyn RecordStore, max_retry: u32) -> Result<Vec<QueueRow>, FieldSyncError> {
    let items = store.list_data_queue_items().await?;
    let media = store.list_pending_media().await?;
    Ok(items
        .iter()
        .map(|i| QueueRow::from_item(i, max_retry))
        .chain(media.iter().map(|m| QueueRow::from_media(m, max_retry)))
        .collect())
}

async fn retry(
    store: &dyn RecordStore,
    kind: QueueKind,
    id: &str,
    output: Output,
) -> Result<(), FieldSyncError> {
    match kind {
        QueueKind::Data => {
            let item_id: i64 = id.parse().map_err(|_| {
                FieldSyncError::Config(format!("data queue item id must be an integer, got '{id}'"))
            })?;
            store.requeue_data_queue_item(item_id).await?;
        }
        QueueKind::Media => store.requeue_media(id).await?,
    }

    if output.json {
        output.print_json(&serde_json::json!({ "requeued": id }))
    } else {
        println!("requeued {id}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::types::{
        Delivery, DeliveryOutcome, MediaPatch, MediaSyncStatus, MediaType, OutcomeKind,
    };
    use fieldsync_storage::SqliteRecordStore;

    async fn store_with_outcome() -> SqliteRecordStore {
        let store = SqliteRecordStore::open_in_memory().await.unwrap();
        store
            .insert_delivery(&Delivery::new("del_1", "Ada", "1 Main St"))
            .await
            .unwrap();
        store
            .record_outcome(&DeliveryOutcome {
                delivery_id: "del_1".into(),
                kind: OutcomeKind::Completed,
                location: None,
                reason: None,
                notes: None,
                media: vec![(MediaType::Signature, "/tmp/sig.png".into())],
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn rows_list_data_before_media() {
        let store = store_with_outcome().await;
        let rows = queue_rows(&store, 5).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].queue, "data");
        assert_eq!(rows[0].kind, "DELIVERY_COMPLETION");
        assert_eq!(rows[1].queue, "media");
        assert_eq!(rows[1].kind, "SIGNATURE");
        assert!(rows.iter().all(|r| !r.stuck));
    }

    #[tokio::test]
    async fn failed_media_is_stuck_until_retried() {
        let store = store_with_outcome().await;
        let media_id = store.list_pending_media().await.unwrap()[0].id.clone();
        store
            .update_media(
                &media_id,
                &MediaPatch {
                    sync_status: Some(MediaSyncStatus::Failed),
                    retry_count: Some(6),
                },
            )
            .await
            .unwrap();

        let rows = queue_rows(&store, 5).await.unwrap();
        assert!(rows[1].stuck);

        let output = Output {
            json: true,
            plain: true,
        };
        retry(&store, QueueKind::Media, &media_id, output).await.unwrap();

        let rows = queue_rows(&store, 5).await.unwrap();
        assert!(!rows[1].stuck);
        assert_eq!(rows[1].retry_count, 0);
    }

    #[tokio::test]
    async fn data_retry_requires_numeric_id() {
        let store = store_with_outcome().await;
        let output = Output {
            json: true,
            plain: true,
        };
        let err = retry(&store, QueueKind::Data, "abc", output).await.unwrap_err();
        assert!(matches!(err, FieldSyncError::Config(_)));
    }
}
