// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media asset operations.

use fieldsync_core::types::{
    now_timestamp, MediaAsset, MediaPatch, MediaSyncStatus, NewMediaAsset,
};
use fieldsync_core::FieldSyncError;
use rusqlite::params;

use crate::database::{map_tr_err, parse_column, Checked, Database};
use crate::queries::deliveries::get_delivery_tx;

fn row_to_media(row: &rusqlite::Row<'_>) -> rusqlite::Result<MediaAsset> {
    Ok(MediaAsset {
        id: row.get(0)?,
        delivery_id: row.get(1)?,
        media_type: parse_column(row, 2)?,
        local_path: row.get(3)?,
        sync_status: parse_column(row, 4)?,
        retry_count: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Insert a media asset inside an open connection or transaction.
pub(crate) fn insert_media_tx(
    conn: &rusqlite::Connection,
    media: &NewMediaAsset,
) -> rusqlite::Result<MediaAsset> {
    let stored = MediaAsset {
        id: uuid::Uuid::new_v4().to_string(),
        delivery_id: media.delivery_id.clone(),
        media_type: media.media_type,
        local_path: media.local_path.clone(),
        sync_status: MediaSyncStatus::Pending,
        retry_count: 0,
        created_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO media
             (id, delivery_id, media_type, local_path, sync_status, retry_count, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            stored.id,
            stored.delivery_id,
            stored.media_type.to_string(),
            stored.local_path,
            stored.sync_status.to_string(),
            stored.retry_count,
            stored.created_at,
        ],
    )?;
    Ok(stored)
}

/// Register a captured media file for upload.
pub async fn insert_media(
    db: &Database,
    media: &NewMediaAsset,
) -> Result<MediaAsset, FieldSyncError> {
    let media = media.clone();
    db.connection()
        .call(move |conn| -> Result<Checked<MediaAsset>, rusqlite::Error> {
            if get_delivery_tx(conn, &media.delivery_id)?.is_none() {
                return Ok(Err(FieldSyncError::NotFound {
                    entity: "delivery",
                    id: media.delivery_id.clone(),
                }));
            }
            Ok(Ok(insert_media_tx(conn, &media)?))
        })
        .await
        .map_err(map_tr_err)?
}

/// All media not yet confirmed by the remote, in capture order.
pub async fn list_pending_media(db: &Database) -> Result<Vec<MediaAsset>, FieldSyncError> {
    db.connection()
        .call(|conn| -> Result<Vec<MediaAsset>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, delivery_id, media_type, local_path, sync_status, retry_count, created_at
                 FROM media WHERE sync_status != ?1 ORDER BY rowid ASC",
            )?;
            let rows = stmt.query_map(
                params![MediaSyncStatus::Completed.to_string()],
                row_to_media,
            )?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}

/// Apply a status/retry patch to a media asset.
pub async fn update_media(
    db: &Database,
    id: &str,
    patch: &MediaPatch,
) -> Result<(), FieldSyncError> {
    let key = id.to_string();
    let patch = patch.clone();
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute(
                "UPDATE media SET
                     sync_status = COALESCE(?1, sync_status),
                     retry_count = COALESCE(?2, retry_count)
                 WHERE id = ?3",
                params![
                    patch.sync_status.map(|s| s.to_string()),
                    patch.retry_count,
                    key,
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if changed == 0 {
        return Err(FieldSyncError::NotFound {
            entity: "media",
            id: id.to_string(),
        });
    }
    Ok(())
}

/// Reset a media asset to `PENDING` with no retries spent.
pub async fn requeue_media(db: &Database, id: &str) -> Result<(), FieldSyncError> {
    update_media(
        db,
        id,
        &MediaPatch {
            sync_status: Some(MediaSyncStatus::Pending),
            retry_count: Some(0),
        },
    )
    .await
}
