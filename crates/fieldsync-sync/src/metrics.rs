// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Engine metrics, recorded through the `metrics` facade.
//!
//! Nothing is exported unless the host installs a recorder.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Queue label values.
pub const QUEUE_DATA: &str = "data";
pub const QUEUE_MEDIA: &str = "media";

/// Register metric descriptions. Call once after installing a recorder.
pub fn register_metrics() {
    describe_counter!(
        "fieldsync_sync_passes_total",
        "Synchronization passes by outcome"
    );
    describe_counter!(
        "fieldsync_items_sent_total",
        "Send attempts by queue and result"
    );
    describe_gauge!(
        "fieldsync_backlog",
        "Items not yet confirmed by the remote, by queue"
    );
    describe_histogram!(
        "fieldsync_pass_duration_seconds",
        "Wall time of a synchronization pass"
    );
}

pub fn record_pass(outcome: &'static str, seconds: f64) {
    metrics::counter!("fieldsync_sync_passes_total", "outcome" => outcome).increment(1);
    metrics::histogram!("fieldsync_pass_duration_seconds").record(seconds);
}

pub fn record_item(queue: &'static str, result: &'static str) {
    metrics::counter!("fieldsync_items_sent_total", "queue" => queue, "result" => result)
        .increment(1);
}

pub fn set_backlog(queue: &'static str, count: usize) {
    metrics::gauge!("fieldsync_backlog", "queue" => queue).set(count as f64);
}
