// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media upload queue processor.
//!
//! Independent of the data queue: its own retry accounting, an inclusive retry
//! boundary, and a local preflight. An asset whose file no longer exists is
//! failed permanently in the same pass, without touching the network.

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use fieldsync_core::types::{MediaAsset, MediaPatch, MediaSyncStatus, MediaUpload};
use fieldsync_core::{FieldSyncError, RecordStore, RemoteError, RemoteTransport};
use serde::Serialize;
use tracing::{debug, warn};

use crate::metrics::{record_item, QUEUE_MEDIA};
use crate::status::{media_eligible, media_status_after_transient, missing_file_retry_count};

/// Per-pass counters for the media queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MediaReport {
    pub attempted: usize,
    pub succeeded: usize,
    /// Transient failures left in `RETRYING`.
    pub failed: usize,
    /// Moved to `FAILED` by rejection or by exhausting retries.
    pub terminal: usize,
    /// Failed in preflight because the local file is gone.
    pub missing: usize,
    pub skipped: usize,
    pub auth_rejected: bool,
}

enum Attempt {
    Uploaded,
    Missing,
    Failed(RemoteError),
}

pub struct MediaProcessor {
    store: Arc<dyn RecordStore>,
    transport: Arc<dyn RemoteTransport>,
    max_retry: u32,
    upload_timeout: Duration,
}

impl MediaProcessor {
    pub fn new(
        store: Arc<dyn RecordStore>,
        transport: Arc<dyn RemoteTransport>,
        max_retry: u32,
        upload_timeout: Duration,
    ) -> Self {
        Self {
            store,
            transport,
            max_retry,
            upload_timeout,
        }
    }

    pub async fn process(&self) -> Result<MediaReport, FieldSyncError> {
        let assets = self.store.list_pending_media().await?;
        let mut report = MediaReport::default();
        let mut remaining = assets.into_iter();

        for asset in remaining.by_ref() {
            if !media_eligible(&asset, self.max_retry) {
                report.skipped += 1;
                continue;
            }

            report.attempted += 1;
            let patch = match self.attempt(&asset).await {
                Attempt::Uploaded => {
                    report.succeeded += 1;
                    record_item(QUEUE_MEDIA, "success");
                    debug!(media_id = %asset.id, "media uploaded");
                    MediaPatch {
                        sync_status: Some(MediaSyncStatus::Completed),
                        retry_count: Some(0),
                    }
                }
                Attempt::Missing => {
                    report.missing += 1;
                    record_item(QUEUE_MEDIA, "missing");
                    warn!(
                        media_id = %asset.id,
                        path = %asset.local_path,
                        "media file missing, marking failed"
                    );
                    MediaPatch {
                        sync_status: Some(MediaSyncStatus::Failed),
                        retry_count: Some(missing_file_retry_count(self.max_retry)),
                    }
                }
                Attempt::Failed(RemoteError::Unauthorized) => {
                    warn!(media_id = %asset.id, "remote rejected credentials, stopping media queue");
                    record_item(QUEUE_MEDIA, "unauthorized");
                    report.auth_rejected = true;
                    break;
                }
                Attempt::Failed(e) => {
                    let retry_count = asset.retry_count + 1;
                    let status = if e.is_retryable() {
                        media_status_after_transient(retry_count, self.max_retry)
                    } else {
                        MediaSyncStatus::Failed
                    };
                    if status == MediaSyncStatus::Failed {
                        report.terminal += 1;
                        record_item(QUEUE_MEDIA, "rejected");
                    } else {
                        report.failed += 1;
                        record_item(QUEUE_MEDIA, "retry");
                    }
                    warn!(
                        media_id = %asset.id,
                        delivery_id = %asset.delivery_id,
                        retry_count,
                        status = %status,
                        error = %e,
                        "media upload failed"
                    );
                    MediaPatch {
                        sync_status: Some(status),
                        retry_count: Some(retry_count),
                    }
                }
            };

            if let Err(e) = self.store.update_media(&asset.id, &patch).await {
                warn!(media_id = %asset.id, error = %e, "failed to record upload result");
            }
        }

        report.skipped += remaining.count();
        debug!(?report, "media queue processed");
        Ok(report)
    }

    async fn attempt(&self, asset: &MediaAsset) -> Attempt {
        let bytes = match tokio::fs::read(&asset.local_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Attempt::Missing,
            Err(e) => {
                return Attempt::Failed(RemoteError::Network(format!(
                    "failed to read {}: {e}",
                    asset.local_path
                )));
            }
        };

        let upload = MediaUpload {
            media_id: asset.id.clone(),
            delivery_id: asset.delivery_id.clone(),
            media_type: asset.media_type,
            file_name: file_name(asset),
            mime_type: asset.media_type.mime_type(),
            bytes,
        };

        match tokio::time::timeout(self.upload_timeout, self.transport.upload_media(&upload)).await
        {
            Ok(Ok(())) => Attempt::Uploaded,
            Ok(Err(e)) => Attempt::Failed(e),
            Err(_) => Attempt::Failed(RemoteError::Timeout(self.upload_timeout)),
        }
    }
}

fn file_name(asset: &MediaAsset) -> String {
    Path::new(&asset.local_path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| asset.id.clone())
}
