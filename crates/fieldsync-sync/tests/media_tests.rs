// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Media upload queue behavior.

use fieldsync_core::types::{MediaAsset, MediaSyncStatus, MediaType, NewMediaAsset};
use fieldsync_core::RemoteError;
use fieldsync_sync::{PassOutcome, PassReport};
use fieldsync_test_utils::TestHarness;
use tracing_test::traced_test;

async fn pass(h: &TestHarness) -> PassReport {
    match h.orchestrator.sync_now().await {
        PassOutcome::Completed(report) => report,
        other => panic!("expected a completed pass, got {other:?}"),
    }
}

async fn add_media(h: &TestHarness, media_type: MediaType, local_path: String) -> MediaAsset {
    h.store
        .insert_media(&NewMediaAsset {
            delivery_id: "del_1".into(),
            media_type,
            local_path,
        })
        .await
        .unwrap()
}

async fn stored(h: &TestHarness, id: &str) -> MediaAsset {
    h.memory
        .all_media()
        .await
        .into_iter()
        .find(|m| m.id == id)
        .unwrap()
}

#[tokio::test]
#[traced_test]
async fn missing_file_fails_permanently_without_upload() {
    let h = TestHarness::new().await.unwrap();
    h.add_delivery("del_1").await.unwrap();
    let asset = add_media(&h, MediaType::Signature, "/missing.png".into()).await;

    let report = pass(&h).await;

    assert_eq!(report.media.missing, 1);
    let after = stored(&h, &asset.id).await;
    assert_eq!(after.sync_status, MediaSyncStatus::Failed);
    assert!(after.retry_count > h.settings.max_retry);
    assert!(h.transport.uploads().await.is_empty());
    assert!(logs_contain("media file missing"));

    let report = pass(&h).await;
    assert_eq!(report.media.attempted, 0);
    assert_eq!(report.media.skipped, 1);
}

#[tokio::test]
async fn upload_carries_bytes_name_and_mime_type() {
    let h = TestHarness::new().await.unwrap();
    h.add_delivery("del_1").await.unwrap();
    let photo_path = h.media_file("front-door.jpg", b"JPEGBYTES").await.unwrap();
    let photo = add_media(&h, MediaType::Photo, photo_path).await;

    let report = pass(&h).await;

    assert_eq!(report.media.succeeded, 1);
    let after = stored(&h, &photo.id).await;
    assert_eq!(after.sync_status, MediaSyncStatus::Completed);
    assert_eq!(after.retry_count, 0);

    let uploads = h.transport.uploads().await;
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].media_id, photo.id);
    assert_eq!(uploads[0].delivery_id, "del_1");
    assert_eq!(uploads[0].file_name, "front-door.jpg");
    assert_eq!(uploads[0].mime_type, "image/jpeg");
    assert_eq!(uploads[0].bytes, b"JPEGBYTES");
    assert!(h.store.list_pending_media().await.unwrap().is_empty());
}

#[tokio::test]
async fn transient_failures_retry_through_inclusive_threshold() {
    let h = TestHarness::new().await.unwrap();
    let max = h.settings.max_retry;
    h.add_delivery("del_1").await.unwrap();
    let path = h.media_file("sig.png", b"PNG").await.unwrap();
    let asset = add_media(&h, MediaType::Signature, path).await;
    h.transport
        .script_media((0..10).map(|_| Err(RemoteError::Timeout(std::time::Duration::from_secs(60)))))
        .await;

    for expected in 1..=max {
        pass(&h).await;
        let after = stored(&h, &asset.id).await;
        assert_eq!(after.retry_count, expected);
        assert_eq!(after.sync_status, MediaSyncStatus::Retrying);
    }

    // At retry_count == max the asset still gets one more attempt.
    let report = pass(&h).await;
    assert_eq!(report.media.terminal, 1);
    let after = stored(&h, &asset.id).await;
    assert_eq!(after.retry_count, max + 1);
    assert_eq!(after.sync_status, MediaSyncStatus::Failed);

    pass(&h).await;
    assert_eq!(h.transport.uploads().await.len() as u32, max + 1);
}

#[tokio::test]
async fn rejection_fails_immediately_and_requeue_revives() {
    let h = TestHarness::new().await.unwrap();
    h.add_delivery("del_1").await.unwrap();
    let path = h.media_file("doc.bin", b"BIN").await.unwrap();
    let asset = add_media(&h, MediaType::Attachment, path).await;
    h.transport
        .script_media([Err(RemoteError::Rejected {
            status: 413,
            body: "too large".into(),
        })])
        .await;

    pass(&h).await;
    let after = stored(&h, &asset.id).await;
    assert_eq!(after.sync_status, MediaSyncStatus::Failed);
    assert_eq!(after.retry_count, 1);

    pass(&h).await;
    assert_eq!(h.transport.uploads().await.len(), 1);

    h.store.requeue_media(&asset.id).await.unwrap();
    pass(&h).await;
    let after = stored(&h, &asset.id).await;
    assert_eq!(after.sync_status, MediaSyncStatus::Completed);
    assert_eq!(
        h.transport.uploads().await[1].mime_type,
        "application/octet-stream"
    );
}

#[tokio::test]
async fn stalled_data_queue_does_not_block_media() {
    let h = TestHarness::new().await.unwrap();
    h.add_delivery("del_1").await.unwrap();
    h.complete_delivery("del_1").await.unwrap();
    h.transport
        .script_mutations([Err(RemoteError::Network("down".into()))])
        .await;

    let report = pass(&h).await;

    assert_eq!(report.data.failed, 1);
    assert_eq!(report.media.succeeded, 1);
    assert!(h.store.list_pending_media().await.unwrap().is_empty());
}

async fn upload_order_after_one_pass(h: &TestHarness) -> (Vec<String>, Vec<String>) {
    h.add_delivery("del_1").await.unwrap();
    let mut inserted = Vec::new();
    for (name, media_type) in [
        ("zz-signature.png", MediaType::Signature),
        ("aa-front.jpg", MediaType::Photo),
        ("mm-parcel.jpg", MediaType::Photo),
    ] {
        let path = h.media_file(name, name.as_bytes()).await.unwrap();
        inserted.push(add_media(h, media_type, path).await.id);
    }

    let report = pass(h).await;
    assert_eq!(report.media.succeeded, 3);

    let uploaded = h
        .transport
        .uploads()
        .await
        .into_iter()
        .map(|u| u.media_id)
        .collect();
    (inserted, uploaded)
}

#[tokio::test]
async fn uploads_follow_insertion_order() {
    let h = TestHarness::new().await.unwrap();
    let (inserted, uploaded) = upload_order_after_one_pass(&h).await;
    assert_eq!(uploaded, inserted);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn uploads_follow_insertion_order_on_sqlite() {
    let h = TestHarness::builder().sqlite().build().await.unwrap();
    let (inserted, uploaded) = upload_order_after_one_pass(&h).await;
    assert_eq!(uploaded, inserted);
}
