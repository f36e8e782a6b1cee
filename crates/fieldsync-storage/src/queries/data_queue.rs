// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data mutation queue operations.
//!
//! Items are never marked "completed": a confirmed item is deleted. Ascending
//! `id` is insertion order, which is the order the processor drains in.

use fieldsync_core::types::{
    now_timestamp, DataQueueItem, DataQueueItemPatch, NewDataQueueItem, QueueItemStatus,
};
use fieldsync_core::FieldSyncError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, parse_column, Checked, Database};
use crate::queries::deliveries::get_delivery_tx;

const ITEM_COLUMNS: &str =
    "id, item_type, delivery_id, payload, status, retry_count, created_at, updated_at";

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<DataQueueItem> {
    let payload: String = row.get(3)?;
    Ok(DataQueueItem {
        id: row.get(0)?,
        item_type: parse_column(row, 1)?,
        delivery_id: row.get(2)?,
        payload: serde_json::from_str(&payload).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        status: parse_column(row, 4)?,
        retry_count: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Id of the queue item already open for `delivery_id`, if any.
pub(crate) fn open_item_for_delivery(
    conn: &rusqlite::Connection,
    delivery_id: &str,
) -> rusqlite::Result<Option<i64>> {
    conn.query_row(
        "SELECT id FROM data_queue WHERE delivery_id = ?1",
        params![delivery_id],
        |row| row.get(0),
    )
    .optional()
}

/// Insert a queue item inside a transaction, enforcing one open item per delivery.
pub(crate) fn insert_item_tx(
    conn: &rusqlite::Connection,
    item: &NewDataQueueItem,
) -> rusqlite::Result<Checked<DataQueueItem>> {
    if get_delivery_tx(conn, &item.delivery_id)?.is_none() {
        return Ok(Err(FieldSyncError::NotFound {
            entity: "delivery",
            id: item.delivery_id.clone(),
        }));
    }
    if let Some(existing) = open_item_for_delivery(conn, &item.delivery_id)? {
        return Ok(Err(FieldSyncError::InvariantViolation(format!(
            "delivery {} already has open queue item {existing}",
            item.delivery_id
        ))));
    }

    let now = now_timestamp();
    conn.execute(
        "INSERT INTO data_queue
             (item_type, delivery_id, payload, status, retry_count, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)",
        params![
            item.item_type.to_string(),
            item.delivery_id,
            item.payload.to_string(),
            QueueItemStatus::Pending.to_string(),
            now,
        ],
    )?;
    Ok(Ok(DataQueueItem {
        id: conn.last_insert_rowid(),
        item_type: item.item_type,
        delivery_id: item.delivery_id.clone(),
        payload: item.payload.clone(),
        status: QueueItemStatus::Pending,
        retry_count: 0,
        created_at: now.clone(),
        updated_at: now,
    }))
}

/// Every queue item, oldest first.
pub async fn list_items(db: &Database) -> Result<Vec<DataQueueItem>, FieldSyncError> {
    db.connection()
        .call(|conn| -> Result<Vec<DataQueueItem>, rusqlite::Error> {
            let mut stmt =
                conn.prepare(&format!("SELECT {ITEM_COLUMNS} FROM data_queue ORDER BY id ASC"))?;
            let rows = stmt.query_map([], row_to_item)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Enqueue a transaction for a delivery.
pub async fn insert_item(
    db: &Database,
    item: &NewDataQueueItem,
) -> Result<DataQueueItem, FieldSyncError> {
    let item = item.clone();
    db.connection()
        .call(move |conn| -> Result<Checked<DataQueueItem>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let inserted = insert_item_tx(&tx, &item)?;
            if inserted.is_ok() {
                tx.commit()?;
            }
            Ok(inserted)
        })
        .await
        .map_err(map_tr_err)?
}

/// Apply a status/retry patch to a queue item.
pub async fn update_item(
    db: &Database,
    id: i64,
    patch: &DataQueueItemPatch,
) -> Result<(), FieldSyncError> {
    let patch = patch.clone();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE data_queue SET
                     status = COALESCE(?1, status),
                     retry_count = COALESCE(?2, retry_count),
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    patch.status.map(|s| s.to_string()),
                    patch.retry_count,
                    now_timestamp(),
                    id,
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(FieldSyncError::NotFound {
            entity: "data queue item",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Delete a confirmed queue item.
pub async fn remove_item(db: &Database, id: i64) -> Result<(), FieldSyncError> {
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute("DELETE FROM data_queue WHERE id = ?1", params![id])
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(FieldSyncError::NotFound {
            entity: "data queue item",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Reset a stuck item to `PENDING` with no retries spent.
pub async fn requeue_item(db: &Database, id: i64) -> Result<(), FieldSyncError> {
    update_item(
        db,
        id,
        &DataQueueItemPatch {
            status: Some(QueueItemStatus::Pending),
            retry_count: Some(0),
        },
    )
    .await
}
