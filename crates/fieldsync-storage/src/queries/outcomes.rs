// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Atomic recording of a delivery's terminal outcome.
//!
//! The event, the captured media, the queue item, and the delivery status
//! change commit together or not at all. A delivery is therefore never seen
//! as `COMPLETED`/`FAILED` without the queue item that reports it.

use fieldsync_core::types::{
    DataQueueItem, DeliveryOutcome, DeliveryPatch, DeliverySyncStatus, NewDataQueueItem,
    NewEvent, NewMediaAsset,
};
use fieldsync_core::FieldSyncError;
use tracing::debug;

use crate::database::{map_tr_err, Checked, Database};
use crate::queries::data_queue::insert_item_tx;
use crate::queries::deliveries::{get_delivery_tx, update_delivery_tx};
use crate::queries::events::insert_event_tx;
use crate::queries::media::insert_media_tx;

fn record_outcome_tx(
    tx: &rusqlite::Transaction<'_>,
    outcome: &DeliveryOutcome,
) -> rusqlite::Result<Checked<DataQueueItem>> {
    let Some(delivery) = get_delivery_tx(tx, &outcome.delivery_id)? else {
        return Ok(Err(FieldSyncError::NotFound {
            entity: "delivery",
            id: outcome.delivery_id.clone(),
        }));
    };
    if delivery.status.is_terminal() {
        return Ok(Err(FieldSyncError::InvariantViolation(format!(
            "delivery {} is already {}",
            delivery.id, delivery.status
        ))));
    }

    let event = insert_event_tx(
        tx,
        &NewEvent {
            delivery_id: outcome.delivery_id.clone(),
            event_type: outcome.event_type(),
            location: outcome.location,
            reason: outcome.reason.clone(),
            notes: outcome.notes.clone(),
        },
    )?;

    for (media_type, local_path) in &outcome.media {
        insert_media_tx(
            tx,
            &NewMediaAsset {
                delivery_id: outcome.delivery_id.clone(),
                media_type: *media_type,
                local_path: local_path.clone(),
            },
        )?;
    }

    let item = match insert_item_tx(
        tx,
        &NewDataQueueItem {
            item_type: outcome.queue_item_type(),
            delivery_id: outcome.delivery_id.clone(),
            payload: outcome.payload(&event),
        },
    )? {
        Ok(item) => item,
        Err(e) => return Ok(Err(e)),
    };

    update_delivery_tx(
        tx,
        &outcome.delivery_id,
        &DeliveryPatch {
            status: Some(outcome.delivery_status()),
            sync_status: Some(DeliverySyncStatus::PendingSyncConfirmation),
        },
    )?;

    Ok(Ok(item))
}

/// Record a completion or failure in a single transaction.
pub async fn record_outcome(
    db: &Database,
    outcome: &DeliveryOutcome,
) -> Result<DataQueueItem, FieldSyncError> {
    outcome
        .validate()
        .map_err(FieldSyncError::InvariantViolation)?;

    let outcome = outcome.clone();
    let item = db
        .connection()
        .call(move |conn| -> Result<Checked<DataQueueItem>, rusqlite::Error> {
            let tx = conn.transaction()?;
            let result = record_outcome_tx(&tx, &outcome)?;
            if result.is_ok() {
                tx.commit()?;
            }
            Ok(result)
        })
        .await
        .map_err(map_tr_err)??;

    debug!(
        delivery_id = %item.delivery_id,
        item_id = item.id,
        item_type = %item.item_type,
        "outcome recorded"
    );
    Ok(item)
}
