// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cross-process sync lease.
//!
//! One row, keyed `id = 1`. The upsert only overwrites a lease that has
//! expired or already belongs to the caller, and SQLite's single writer makes
//! the check-and-take atomic across connections.

use std::time::Duration;

use fieldsync_core::types::now_millis;
use fieldsync_core::FieldSyncError;
use rusqlite::params;

use crate::database::{map_tr_err, Database};

/// Take or renew the lease. Returns whether `owner` now holds it.
pub async fn acquire(db: &Database, owner: &str, ttl: Duration) -> Result<bool, FieldSyncError> {
    let owner = owner.to_string();
    let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    let changed = db
        .connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            let now = now_millis();
            conn.execute(
                "INSERT INTO sync_lease (id, owner, expires_at) VALUES (1, ?1, ?2)
                 ON CONFLICT (id) DO UPDATE SET
                     owner = excluded.owner,
                     expires_at = excluded.expires_at
                 WHERE sync_lease.owner = excluded.owner OR sync_lease.expires_at <= ?3",
                params![owner, now.saturating_add(ttl_ms), now],
            )
        })
        .await
        .map_err(map_tr_err)?;
    Ok(changed == 1)
}

/// Release the lease if `owner` holds it. Releasing a lease held by someone
/// else is a no-op.
pub async fn release(db: &Database, owner: &str) -> Result<(), FieldSyncError> {
    let owner = owner.to_string();
    db.connection()
        .call(move |conn| -> Result<usize, rusqlite::Error> {
            conn.execute("DELETE FROM sync_lease WHERE owner = ?1", params![owner])
        })
        .await
        .map_err(map_tr_err)?;
    Ok(())
}
