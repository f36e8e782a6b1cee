// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data mutation queue processor.
//!
//! Sends every eligible queue item once per pass, in insertion order, and
//! applies the outcome to the store:
//!
//! | send result            | store effect                                         |
//! |------------------------|------------------------------------------------------|
//! | success                | delivery -> `COMPLETED_SYNC`, item removed           |
//! | transient / timeout    | `retry_count + 1`, stays `PENDING`                   |
//! | rejected (4xx)         | `retry_count + 1`, `FAILED_TERMINAL`                 |
//! | unauthorized (401)     | nothing charged, rest of the queue left for later    |
//!
//! A failure on one item never stops the others.

use std::sync::Arc;
use std::time::Duration;

use fieldsync_core::types::{
    DataQueueItem, DataQueueItemPatch, DeliveryPatch, DeliverySyncStatus, MutationRequest,
    QueueItemStatus,
};
use fieldsync_core::{FieldSyncError, RecordStore, RemoteError, RemoteTransport};
use serde::Serialize;
use tracing::{debug, warn};

use crate::metrics::{record_item, QUEUE_DATA};
use crate::status::data_item_eligible;

/// Per-pass counters for the data queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DataQueueReport {
    /// Items a send was started for.
    pub attempted: usize,
    /// Confirmed and removed.
    pub succeeded: usize,
    /// Transient failures, still eligible or newly at the retry threshold.
    pub failed: usize,
    /// Rejected by the remote and marked `FAILED_TERMINAL`.
    pub terminal: usize,
    /// Present but not eligible this pass.
    pub skipped: usize,
    /// The remote refused the credentials; processing stopped early.
    pub auth_rejected: bool,
}

pub struct DataQueueProcessor {
    store: Arc<dyn RecordStore>,
    transport: Arc<dyn RemoteTransport>,
    max_retry: u32,
    send_timeout: Duration,
}

impl DataQueueProcessor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        transport: Arc<dyn RemoteTransport>,
        max_retry: u32,
        send_timeout: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            max_retry,
            send_timeout,
        }
    }

    /// Run one pass over the queue.
    ///
    /// Only a failure to read the queue is returned as an error; per-item
    /// failures are absorbed into the report.
    pub async fn process(&self) -> Result<DataQueueReport, FieldSyncError> {
        let mut items = self.store.list_data_queue_items().await?;
        items.sort_by_key(|item| item.id);

        let mut report = DataQueueReport::default();
        let mut remaining = items.into_iter();

        for item in remaining.by_ref() {
            if !data_item_eligible(&item, self.max_retry) {
                report.skipped += 1;
                continue;
            }

            report.attempted += 1;
            match self.send(&item).await {
                Ok(()) => match self.confirm(&item).await {
                    Ok(()) => {
                        report.succeeded += 1;
                        record_item(QUEUE_DATA, "success");
                    }
                    Err(e) => {
                        // Sent but not recorded: the item stays and is resent later.
                        warn!(item_id = item.id, error = %e, "failed to record confirmed item");
                        report.failed += 1;
                    }
                },
                Err(RemoteError::Unauthorized) => {
                    warn!(item_id = item.id, "remote rejected credentials, stopping data queue");
                    record_item(QUEUE_DATA, "unauthorized");
                    report.auth_rejected = true;
                    break;
                }
                Err(e) => {
                    let terminal = !e.is_retryable();
                    warn!(
                        item_id = item.id,
                        delivery_id = %item.delivery_id,
                        retry_count = item.retry_count + 1,
                        terminal,
                        error = %e,
                        "mutation send failed"
                    );
                    self.charge(&item, terminal).await;
                    if terminal {
                        report.terminal += 1;
                        record_item(QUEUE_DATA, "rejected");
                    } else {
                        report.failed += 1;
                        record_item(QUEUE_DATA, "retry");
                    }
                }
            }
        }

        report.skipped += remaining.count();
        debug!(?report, "data queue processed");
        Ok(report)
    }

    async fn send(&self, item: &DataQueueItem) -> Result<(), RemoteError> {
        let request = MutationRequest::from(item);
        match tokio::time::timeout(self.send_timeout, self.transport.send_mutation(&request)).await
        {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Timeout(self.send_timeout)),
        }
    }

    /// Settle the delivery, then retire the item.
    ///
    /// The delivery is updated first: if removal then fails, the item is sent
    /// again on a later pass, which the remote must tolerate anyway.
    async fn confirm(&self, item: &DataQueueItem) -> Result<(), FieldSyncError> {
        if item.item_type.settles_delivery() {
            let patch = DeliveryPatch {
                status: None,
                sync_status: Some(DeliverySyncStatus::CompletedSync),
            };
            match self.store.update_delivery(&item.delivery_id, &patch).await {
                Ok(()) => {}
                Err(FieldSyncError::NotFound { .. }) => {
                    warn!(
                        item_id = item.id,
                        delivery_id = %item.delivery_id,
                        "confirmed item references unknown delivery"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        self.store.remove_data_queue_item(item.id).await?;
        debug!(item_id = item.id, delivery_id = %item.delivery_id, "item confirmed");
        Ok(())
    }

    async fn charge(&self, item: &DataQueueItem, terminal: bool) {
        let patch = DataQueueItemPatch {
            status: terminal.then_some(QueueItemStatus::FailedTerminal),
            retry_count: Some(item.retry_count + 1),
        };
        if let Err(e) = self.store.update_data_queue_item(item.id, &patch).await {
            warn!(item_id = item.id, error = %e, "failed to record send failure");
        }
    }
}
