// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Delivery CRUD operations.

use fieldsync_core::types::{now_timestamp, Delivery, DeliveryPatch};
use fieldsync_core::FieldSyncError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, parse_column, Checked, Database};

const DELIVERY_COLUMNS: &str =
    "id, recipient_name, address, status, sync_status, created_at, updated_at";

pub(crate) fn row_to_delivery(row: &rusqlite::Row<'_>) -> rusqlite::Result<Delivery> {
    Ok(Delivery {
        id: row.get(0)?,
        recipient_name: row.get(1)?,
        address: row.get(2)?,
        status: parse_column(row, 3)?,
        sync_status: parse_column(row, 4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Fetch a delivery inside an open connection or transaction.
pub(crate) fn get_delivery_tx(
    conn: &rusqlite::Connection,
    id: &str,
) -> rusqlite::Result<Option<Delivery>> {
    conn.query_row(
        &format!("SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE id = ?1"),
        params![id],
        row_to_delivery,
    )
    .optional()
}

/// Apply a patch inside an open connection or transaction. Returns rows changed.
pub(crate) fn update_delivery_tx(
    conn: &rusqlite::Connection,
    id: &str,
    patch: &DeliveryPatch,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE deliveries SET
             status = COALESCE(?1, status),
             sync_status = COALESCE(?2, sync_status),
             updated_at = ?3
         WHERE id = ?4",
        params![
            patch.status.map(|s| s.to_string()),
            patch.sync_status.map(|s| s.to_string()),
            now_timestamp(),
            id,
        ],
    )
}

/// Insert a new delivery.
pub async fn insert_delivery(db: &Database, delivery: &Delivery) -> Result<(), FieldSyncError> {
    let delivery = delivery.clone();
    db.connection()
        .call(move |conn| -> Result<Checked<()>, rusqlite::Error> {
            if get_delivery_tx(conn, &delivery.id)?.is_some() {
                return Ok(Err(FieldSyncError::InvariantViolation(format!(
                    "delivery {} already exists",
                    delivery.id
                ))));
            }
            conn.execute(
                "INSERT INTO deliveries
                     (id, recipient_name, address, status, sync_status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    delivery.id,
                    delivery.recipient_name,
                    delivery.address,
                    delivery.status.to_string(),
                    delivery.sync_status.to_string(),
                    delivery.created_at,
                    delivery.updated_at,
                ],
            )?;
            Ok(Ok(()))
        })
        .await
        .map_err(map_tr_err)?
}

/// Get a delivery by id.
pub async fn get_delivery(db: &Database, id: &str) -> Result<Option<Delivery>, FieldSyncError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| -> Result<Option<Delivery>, rusqlite::Error> {
            get_delivery_tx(conn, &id)
        })
        .await
        .map_err(map_tr_err)
}

/// List all deliveries, newest first.
pub async fn list_deliveries(db: &Database) -> Result<Vec<Delivery>, FieldSyncError> {
    db.connection()
        .call(|conn| -> Result<Vec<Delivery>, rusqlite::Error> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {DELIVERY_COLUMNS} FROM deliveries ORDER BY created_at DESC, rowid DESC"
            ))?;
            let rows = stmt.query_map([], row_to_delivery)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Update a delivery's status fields.
pub async fn update_delivery(
    db: &Database,
    id: &str,
    patch: &DeliveryPatch,
) -> Result<(), FieldSyncError> {
    let key = id.to_string();
    let patch = patch.clone();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            update_delivery_tx(conn, &key, &patch)
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(FieldSyncError::NotFound {
            entity: "delivery",
            id: id.to_string(),
        });
    }
    Ok(())
}
