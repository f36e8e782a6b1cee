// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only event log operations.

use fieldsync_core::types::{now_timestamp, Event, GeoPoint, NewEvent};
use fieldsync_core::FieldSyncError;
use rusqlite::params;

use crate::database::{map_tr_err, parse_column, Checked, Database};
use crate::queries::deliveries::get_delivery_tx;

fn row_to_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let latitude: Option<f64> = row.get(3)?;
    let longitude: Option<f64> = row.get(4)?;
    Ok(Event {
        id: row.get(0)?,
        delivery_id: row.get(1)?,
        event_type: parse_column(row, 2)?,
        location: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| GeoPoint {
                latitude,
                longitude,
            }),
        reason: row.get(5)?,
        notes: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Insert an event inside an open connection or transaction.
pub(crate) fn insert_event_tx(
    conn: &rusqlite::Connection,
    event: &NewEvent,
) -> rusqlite::Result<Event> {
    let stored = Event {
        id: uuid::Uuid::new_v4().to_string(),
        delivery_id: event.delivery_id.clone(),
        event_type: event.event_type,
        location: event.location,
        reason: event.reason.clone(),
        notes: event.notes.clone(),
        created_at: now_timestamp(),
    };
    conn.execute(
        "INSERT INTO events
             (id, delivery_id, event_type, latitude, longitude, reason, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            stored.id,
            stored.delivery_id,
            stored.event_type.to_string(),
            stored.location.map(|l| l.latitude),
            stored.location.map(|l| l.longitude),
            stored.reason,
            stored.notes,
            stored.created_at,
        ],
    )?;
    Ok(stored)
}

/// Append an event to a delivery's history.
pub async fn append_event(db: &Database, event: &NewEvent) -> Result<Event, FieldSyncError> {
    let event = event.clone();
    db.connection()
        .call(move |conn| -> Result<Checked<Event>, rusqlite::Error> {
            if get_delivery_tx(conn, &event.delivery_id)?.is_none() {
                return Ok(Err(FieldSyncError::NotFound {
                    entity: "delivery",
                    id: event.delivery_id.clone(),
                }));
            }
            Ok(Ok(insert_event_tx(conn, &event)?))
        })
        .await
        .map_err(map_tr_err)?
}

/// Events of one delivery, oldest first.
pub async fn list_events(db: &Database, delivery_id: &str) -> Result<Vec<Event>, FieldSyncError> {
    let delivery_id = delivery_id.to_string();
    db.connection()
        .call(move |conn| -> Result<Vec<Event>, rusqlite::Error> {
            let mut stmt = conn.prepare(
                "SELECT id, delivery_id, event_type, latitude, longitude, reason, notes, created_at
                 FROM events WHERE delivery_id = ?1 ORDER BY rowid ASC",
            )?;
            let rows = stmt.query_map(params![delivery_id], row_to_event)?;
            rows.collect()
        })
        .await
        .map_err(map_tr_err)
}
