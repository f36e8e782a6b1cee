// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fieldsync deliveries` command implementation.
//!
//! Records field progress into the local store. Terminal outcomes go through
//! [`RecordStore::record_outcome`] so the event, the captured media, the queue
//! item, and the delivery status land together.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use fieldsync_config::FieldSyncConfig;
use fieldsync_core::types::{
    Delivery, DeliveryOutcome, DeliveryPatch, DeliveryStatus, EventType, GeoPoint, MediaType,
    NewEvent, OutcomeKind,
};
use fieldsync_core::{FieldSyncError, PluginAdapter, RecordStore};

use crate::Output;

#[derive(Subcommand, Debug)]
pub enum DeliveryAction {
    /// Register a new delivery task.
    Add {
        id: String,
        #[arg(long)]
        recipient: String,
        #[arg(long)]
        address: String,
    },
    /// List local deliveries.
    List,
    /// Mark a delivery as in progress.
    Start {
        id: String,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Record a successful delivery with its proof of delivery.
    Complete {
        id: String,
        /// Recipient signature image.
        #[arg(long)]
        signature: PathBuf,
        /// Photo taken at handover. May be repeated.
        #[arg(long)]
        photo: Vec<PathBuf>,
        #[arg(long)]
        notes: Option<String>,
        #[command(flatten)]
        location: LocationArgs,
    },
    /// Record a failed delivery attempt.
    Fail {
        id: String,
        #[arg(long)]
        reason: String,
        #[arg(long)]
        notes: Option<String>,
        /// Photo documenting the attempt. May be repeated.
        #[arg(long)]
        photo: Vec<PathBuf>,
        #[command(flatten)]
        location: LocationArgs,
    },
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct LocationArgs {
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    lon: Option<f64>,
}

impl LocationArgs {
    fn point(self) -> Option<GeoPoint> {
        Some(GeoPoint {
            latitude: self.lat?,
            longitude: self.lon?,
        })
    }
}

/// Run the `fieldsync deliveries` command.
pub async fn run_deliveries(
    config: &FieldSyncConfig,
    action: DeliveryAction,
    output: Output,
) -> Result<(), FieldSyncError> {
    let store = crate::open_store(config).await?;
    let result = apply(&store, action, output).await;
    store.shutdown().await?;
    result
}

async fn apply(
    store: &dyn RecordStore,
    action: DeliveryAction,
    output: Output,
) -> Result<(), FieldSyncError> {
    match action {
        DeliveryAction::Add {
            id,
            recipient,
            address,
        } => {
            let delivery = Delivery::new(id, recipient, address);
            store.insert_delivery(&delivery).await?;
            report(output, &delivery, "added")
        }
        DeliveryAction::List => {
            let deliveries = store.list_deliveries().await?;
            if output.json {
                return output.print_json(&deliveries);
            }
            for d in &deliveries {
                println!(
                    "{:<16} {:<12} {:<26} {} ({})",
                    d.id, d.status, d.sync_status, d.recipient_name, d.address
                );
            }
            Ok(())
        }
        DeliveryAction::Start { id, location } => {
            start(store, &id, location.point()).await?;
            let delivery = load(store, &id).await?;
            report(output, &delivery, "started")
        }
        DeliveryAction::Complete {
            id,
            signature,
            photo,
            notes,
            location,
        } => {
            let mut media = vec![(MediaType::Signature, media_path(&signature)?)];
            for p in &photo {
                media.push((MediaType::Photo, media_path(p)?));
            }
            let outcome = DeliveryOutcome {
                delivery_id: id.clone(),
                kind: OutcomeKind::Completed,
                location: location.point(),
                reason: None,
                notes,
                media,
            };
            store.record_outcome(&outcome).await?;
            let delivery = load(store, &id).await?;
            report(output, &delivery, "completed")
        }
        DeliveryAction::Fail {
            id,
            reason,
            notes,
            photo,
            location,
        } => {
            let media = photo
                .iter()
                .map(|p| Ok((MediaType::Photo, media_path(p)?)))
                .collect::<Result<Vec<_>, FieldSyncError>>()?;
            let outcome = DeliveryOutcome {
                delivery_id: id.clone(),
                kind: OutcomeKind::Failed,
                location: location.point(),
                reason: Some(reason),
                notes,
                media,
            };
            store.record_outcome(&outcome).await?;
            let delivery = load(store, &id).await?;
            report(output, &delivery, "failed")
        }
    }
}

/// Append a `STARTED` event and move the delivery to `IN_PROGRESS`.
async fn start(
    store: &dyn RecordStore,
    id: &str,
    location: Option<GeoPoint>,
) -> Result<(), FieldSyncError> {
    let delivery = load(store, id).await?;
    if delivery.status.is_terminal() {
        return Err(FieldSyncError::InvariantViolation(format!(
            "delivery {id} is already {}",
            delivery.status
        )));
    }
    store
        .append_event(&NewEvent {
            delivery_id: id.to_string(),
            event_type: EventType::Started,
            location,
            reason: None,
            notes: None,
        })
        .await?;
    store
        .update_delivery(
            id,
            &DeliveryPatch {
                status: Some(DeliveryStatus::InProgress),
                sync_status: None,
            },
        )
        .await
}

async fn load(store: &dyn RecordStore, id: &str) -> Result<Delivery, FieldSyncError> {
    store
        .get_delivery(id)
        .await?
        .ok_or_else(|| FieldSyncError::NotFound {
            entity: "delivery",
            id: id.to_string(),
        })
}

/// Media paths are stored absolute so the daemon can read them regardless of
/// its working directory.
fn media_path(path: &Path) -> Result<String, FieldSyncError> {
    let absolute = std::path::absolute(path).map_err(|e| {
        FieldSyncError::Config(format!("invalid media path {}: {e}", path.display()))
    })?;
    Ok(absolute.to_string_lossy().into_owned())
}

fn report(output: Output, delivery: &Delivery, verb: &str) -> Result<(), FieldSyncError> {
    if output.json {
        return output.print_json(delivery);
    }
    if output.use_color() {
        use colored::Colorize;
        println!("{} delivery {} {verb}", "✓".green(), delivery.id.bold());
    } else {
        println!("delivery {} {verb}", delivery.id);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldsync_core::types::{DeliverySyncStatus, QueueItemType};
    use fieldsync_storage::SqliteRecordStore;

    const QUIET: Output = Output {
        json: true,
        plain: true,
    };

    async fn store_with(id: &str) -> SqliteRecordStore {
        let store = SqliteRecordStore::open_in_memory().await.unwrap();
        apply(
            &store,
            DeliveryAction::Add {
                id: id.to_string(),
                recipient: "Ada".into(),
                address: "1 Main St".into(),
            },
            QUIET,
        )
        .await
        .unwrap();
        store
    }

    #[tokio::test]
    async fn start_records_event_and_status() {
        let store = store_with("del_1").await;
        apply(
            &store,
            DeliveryAction::Start {
                id: "del_1".into(),
                location: LocationArgs {
                    lat: Some(52.5),
                    lon: Some(-1.25),
                },
            },
            QUIET,
        )
        .await
        .unwrap();

        let delivery = load(&store, "del_1").await.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::InProgress);
        let events = store.list_events("del_1").await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event_type, EventType::Started);
        assert_eq!(events[0].location.map(|l| l.longitude), Some(-1.25));
    }

    #[tokio::test]
    async fn complete_enqueues_outcome_and_media() {
        let store = store_with("del_1").await;
        apply(
            &store,
            DeliveryAction::Complete {
                id: "del_1".into(),
                signature: PathBuf::from("sig.png"),
                photo: vec![PathBuf::from("/tmp/a.jpg")],
                notes: Some("left with neighbour".into()),
                location: LocationArgs::default(),
            },
            QUIET,
        )
        .await
        .unwrap();

        let delivery = load(&store, "del_1").await.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Completed);
        assert_eq!(
            delivery.sync_status,
            DeliverySyncStatus::PendingSyncConfirmation
        );

        let items = store.list_data_queue_items().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_type, QueueItemType::DeliveryCompletion);

        let media = store.list_pending_media().await.unwrap();
        assert_eq!(media.len(), 2);
        assert!(media.iter().all(|m| Path::new(&m.local_path).is_absolute()));
    }

    #[tokio::test]
    async fn start_after_completion_is_rejected() {
        let store = store_with("del_1").await;
        apply(
            &store,
            DeliveryAction::Fail {
                id: "del_1".into(),
                reason: "nobody home".into(),
                notes: None,
                photo: Vec::new(),
                location: LocationArgs::default(),
            },
            QUIET,
        )
        .await
        .unwrap();

        let err = start(&store, "del_1", None).await.unwrap_err();
        assert!(matches!(err, FieldSyncError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn unknown_delivery_is_not_found() {
        let store = SqliteRecordStore::open_in_memory().await.unwrap();
        let err = start(&store, "nope", None).await.unwrap_err();
        assert!(matches!(err, FieldSyncError::NotFound { .. }));
    }
}
