// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the record store, the remote transport, and the
//! sync engine.
//!
//! Status enums serialize as `SCREAMING_SNAKE_CASE` both through serde and
//! through strum's `Display`/`FromStr`, which is also the form persisted in
//! SQLite.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    RecordStore,
    Transport,
}

/// Returns the current UTC time in the millisecond RFC 3339 form used for
/// every persisted timestamp.
pub fn now_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Milliseconds since the Unix epoch, for expiry comparisons.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// --- Delivery ---

/// Local progress of a delivery task.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl DeliveryStatus {
    /// Completed and failed deliveries accept no further outcome.
    pub fn is_terminal(self) -> bool {
        matches!(self, DeliveryStatus::Completed | DeliveryStatus::Failed)
    }
}

/// How far the delivery's terminal outcome has travelled toward the remote.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliverySyncStatus {
    Pending,
    PendingSyncConfirmation,
    CompletedSync,
}

/// A logistics task assigned to the field agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: String,
    pub recipient_name: String,
    pub address: String,
    pub status: DeliveryStatus,
    pub sync_status: DeliverySyncStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl Delivery {
    /// A fresh, untouched delivery.
    pub fn new(
        id: impl Into<String>,
        recipient_name: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        let now = now_timestamp();
        Self {
            id: id.into(),
            recipient_name: recipient_name.into(),
            address: address.into(),
            status: DeliveryStatus::Pending,
            sync_status: DeliverySyncStatus::Pending,
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Partial update of a delivery. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryPatch {
    pub status: Option<DeliveryStatus>,
    pub sync_status: Option<DeliverySyncStatus>,
}

// --- Event ---

/// What happened to a delivery.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Started,
    Completed,
    NotDelivered,
}

/// A WGS84 coordinate captured with an event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// An immutable fact about a delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub delivery_id: String,
    pub event_type: EventType,
    pub location: Option<GeoPoint>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
}

/// Input for appending an event.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub delivery_id: String,
    pub event_type: EventType,
    pub location: Option<GeoPoint>,
    pub reason: Option<String>,
    pub notes: Option<String>,
}

// --- Media ---

/// Kind of captured binary.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    Photo,
    Signature,
    Attachment,
}

impl MediaType {
    /// Declared content type for the multipart upload.
    pub fn mime_type(self) -> &'static str {
        match self {
            MediaType::Photo => "image/jpeg",
            MediaType::Signature => "image/png",
            MediaType::Attachment => "application/octet-stream",
        }
    }
}

/// Upload state of a media asset.
///
/// `Retrying` marks an asset whose last upload failed transiently and which is
/// still within its retry allowance. `Failed` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaSyncStatus {
    Pending,
    Retrying,
    Completed,
    Failed,
}

/// A locally stored photo or signature awaiting upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: String,
    pub delivery_id: String,
    pub media_type: MediaType,
    pub local_path: String,
    pub sync_status: MediaSyncStatus,
    pub retry_count: u32,
    pub created_at: String,
}

/// Input for registering a captured media file.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMediaAsset {
    pub delivery_id: String,
    pub media_type: MediaType,
    pub local_path: String,
}

/// Partial update of a media asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaPatch {
    pub sync_status: Option<MediaSyncStatus>,
    pub retry_count: Option<u32>,
}

// --- Data queue ---

/// The structured business transaction a queue item carries.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueItemType {
    DeliveryCompletion,
    DeliveryFailure,
}

impl QueueItemType {
    /// Whether confirming this transaction settles the delivery's sync status.
    pub fn settles_delivery(self) -> bool {
        matches!(
            self,
            QueueItemType::DeliveryCompletion | QueueItemType::DeliveryFailure
        )
    }
}

/// Queue item state. Confirmed items are deleted rather than marked.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueueItemStatus {
    Pending,
    FailedTerminal,
}

/// A pending structured transaction awaiting remote confirmation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQueueItem {
    /// Monotonic id; ascending id is insertion order.
    pub id: i64,
    pub item_type: QueueItemType,
    pub delivery_id: String,
    pub payload: serde_json::Value,
    pub status: QueueItemStatus,
    pub retry_count: u32,
    pub created_at: String,
    pub updated_at: String,
}

/// Input for enqueueing a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDataQueueItem {
    pub item_type: QueueItemType,
    pub delivery_id: String,
    pub payload: serde_json::Value,
}

/// Partial update of a queue item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataQueueItemPatch {
    pub status: Option<QueueItemStatus>,
    pub retry_count: Option<u32>,
}

// --- Outcomes ---

/// Which terminal outcome the agent recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    Completed,
    Failed,
}

/// Everything the field agent captured when closing a delivery.
///
/// Applied by [`RecordStore::record_outcome`](crate::RecordStore::record_outcome)
/// as a single atomic write.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryOutcome {
    pub delivery_id: String,
    pub kind: OutcomeKind,
    pub location: Option<GeoPoint>,
    pub reason: Option<String>,
    pub notes: Option<String>,
    /// Captured files as `(type, local path)`.
    pub media: Vec<(MediaType, String)>,
}

impl DeliveryOutcome {
    pub fn event_type(&self) -> EventType {
        match self.kind {
            OutcomeKind::Completed => EventType::Completed,
            OutcomeKind::Failed => EventType::NotDelivered,
        }
    }

    pub fn delivery_status(&self) -> DeliveryStatus {
        match self.kind {
            OutcomeKind::Completed => DeliveryStatus::Completed,
            OutcomeKind::Failed => DeliveryStatus::Failed,
        }
    }

    pub fn queue_item_type(&self) -> QueueItemType {
        match self.kind {
            OutcomeKind::Completed => QueueItemType::DeliveryCompletion,
            OutcomeKind::Failed => QueueItemType::DeliveryFailure,
        }
    }

    /// Checks the capture rules that do not depend on stored state.
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            OutcomeKind::Completed => {
                if !self.media.iter().any(|(t, _)| *t == MediaType::Signature) {
                    return Err(format!(
                        "completion of delivery {} requires a signature",
                        self.delivery_id
                    ));
                }
            }
            OutcomeKind::Failed => {
                if self.reason.as_deref().is_none_or(|r| r.trim().is_empty()) {
                    return Err(format!(
                        "failure of delivery {} requires a reason",
                        self.delivery_id
                    ));
                }
            }
        }
        Ok(())
    }

    /// The queue payload sent to the remote for this outcome.
    pub fn payload(&self, event: &Event) -> serde_json::Value {
        match self.kind {
            OutcomeKind::Completed => serde_json::json!({
                "event": event,
                "media_count": self.media.len(),
            }),
            OutcomeKind::Failed => serde_json::json!({
                "reason": self.reason,
                "notes": self.notes,
                "event": event,
            }),
        }
    }
}

// --- Wire ---

/// Body of `POST /mutations`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutationRequest {
    /// Queue item id; stable across retries so the remote can deduplicate.
    pub id: i64,
    #[serde(rename = "type")]
    pub item_type: QueueItemType,
    pub delivery_id: String,
    pub payload: serde_json::Value,
    /// 1-based attempt number.
    pub attempt: u32,
}

impl From<&DataQueueItem> for MutationRequest {
    fn from(item: &DataQueueItem) -> Self {
        Self {
            id: item.id,
            item_type: item.item_type,
            delivery_id: item.delivery_id.clone(),
            payload: item.payload.clone(),
            attempt: item.retry_count + 1,
        }
    }
}

/// A media file ready for `POST /media`.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaUpload {
    pub media_id: String,
    pub delivery_id: String,
    pub media_type: MediaType,
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_strings_match_persisted_form() {
        assert_eq!(
            DeliverySyncStatus::PendingSyncConfirmation.to_string(),
            "PENDING_SYNC_CONFIRMATION"
        );
        assert_eq!(QueueItemStatus::FailedTerminal.to_string(), "FAILED_TERMINAL");
        assert_eq!(
            QueueItemType::from_str("DELIVERY_FAILURE").unwrap(),
            QueueItemType::DeliveryFailure
        );
        assert_eq!(MediaSyncStatus::from_str("RETRYING").unwrap(), MediaSyncStatus::Retrying);
        assert_eq!(EventType::NotDelivered.to_string(), "NOT_DELIVERED");
    }

    #[test]
    fn serde_uses_same_names_as_display() {
        let json = serde_json::to_string(&DeliveryStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
    }

    #[test]
    fn mime_types_by_media_type() {
        assert_eq!(MediaType::Photo.mime_type(), "image/jpeg");
        assert_eq!(MediaType::Signature.mime_type(), "image/png");
        assert_eq!(MediaType::Attachment.mime_type(), "application/octet-stream");
    }

    #[test]
    fn mutation_request_attempt_is_one_based() {
        let item = DataQueueItem {
            id: 7,
            item_type: QueueItemType::DeliveryCompletion,
            delivery_id: "del_1".into(),
            payload: serde_json::json!({}),
            status: QueueItemStatus::Pending,
            retry_count: 2,
            created_at: now_timestamp(),
            updated_at: now_timestamp(),
        };
        let req = MutationRequest::from(&item);
        assert_eq!(req.attempt, 3);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "DELIVERY_COMPLETION");
    }

    #[test]
    fn completion_requires_signature() {
        let mut outcome = DeliveryOutcome {
            delivery_id: "del_1".into(),
            kind: OutcomeKind::Completed,
            location: None,
            reason: None,
            notes: None,
            media: vec![(MediaType::Photo, "/tmp/a.jpg".into())],
        };
        assert!(outcome.validate().is_err());
        outcome.media.push((MediaType::Signature, "/tmp/s.png".into()));
        assert!(outcome.validate().is_ok());
    }

    #[test]
    fn failure_requires_reason() {
        let mut outcome = DeliveryOutcome {
            delivery_id: "del_1".into(),
            kind: OutcomeKind::Failed,
            location: None,
            reason: Some("  ".into()),
            notes: None,
            media: Vec::new(),
        };
        assert!(outcome.validate().is_err());
        outcome.reason = Some("recipient absent".into());
        assert!(outcome.validate().is_ok());
        assert_eq!(outcome.queue_item_type(), QueueItemType::DeliveryFailure);
        assert_eq!(outcome.event_type(), EventType::NotDelivered);
    }

    #[test]
    fn timestamps_are_utc_millis() {
        let ts = now_timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }
}
