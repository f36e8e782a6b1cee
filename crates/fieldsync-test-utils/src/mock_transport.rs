// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock remote authority for deterministic engine tests.
//!
//! Outcomes are scripted per endpoint and consumed in call order; once a
//! script runs out every call succeeds. Every call is logged, and the number
//! of calls in flight at once is tracked so tests can assert exclusivity.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use fieldsync_core::types::{AdapterType, HealthStatus, MediaUpload, MutationRequest};
use fieldsync_core::{FieldSyncError, PluginAdapter, RemoteError, RemoteTransport};

/// One call as the remote saw it.
#[derive(Debug, Clone, PartialEq)]
pub enum SentCall {
    Mutation(MutationRequest),
    Media(MediaUpload),
}

#[derive(Default)]
pub struct MockTransport {
    mutation_script: Mutex<VecDeque<Result<(), RemoteError>>>,
    media_script: Mutex<VecDeque<Result<(), RemoteError>>>,
    calls: Mutex<Vec<SentCall>>,
    latency: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes for the next `send_mutation` calls.
    pub async fn script_mutations(&self, outcomes: impl IntoIterator<Item = Result<(), RemoteError>>) {
        self.mutation_script.lock().await.extend(outcomes);
    }

    /// Queue outcomes for the next `upload_media` calls.
    pub async fn script_media(&self, outcomes: impl IntoIterator<Item = Result<(), RemoteError>>) {
        self.media_script.lock().await.extend(outcomes);
    }

    /// Delay every call by `latency` before answering.
    pub async fn set_latency(&self, latency: Duration) {
        *self.latency.lock().await = Some(latency);
    }

    pub async fn calls(&self) -> Vec<SentCall> {
        self.calls.lock().await.clone()
    }

    pub async fn mutations(&self) -> Vec<MutationRequest> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                SentCall::Mutation(m) => Some(m.clone()),
                SentCall::Media(_) => None,
            })
            .collect()
    }

    pub async fn uploads(&self) -> Vec<MediaUpload> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|c| match c {
                SentCall::Media(m) => Some(m.clone()),
                SentCall::Mutation(_) => None,
            })
            .collect()
    }

    /// Highest number of calls ever in flight at the same time.
    pub fn peak_concurrency(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn answer(
        &self,
        call: SentCall,
        script: &Mutex<VecDeque<Result<(), RemoteError>>>,
    ) -> Result<(), RemoteError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        self.calls.lock().await.push(call);
        let latency = *self.latency.lock().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        let outcome = script.lock().await.pop_front().unwrap_or(Ok(()));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[async_trait]
impl PluginAdapter for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, FieldSyncError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), FieldSyncError> {
        Ok(())
    }
}

#[async_trait]
impl RemoteTransport for MockTransport {
    async fn send_mutation(&self, request: &MutationRequest) -> Result<(), RemoteError> {
        self.answer(SentCall::Mutation(request.clone()), &self.mutation_script)
            .await
    }

    async fn upload_media(&self, upload: &MediaUpload) -> Result<(), RemoteError> {
        self.answer(SentCall::Media(upload.clone()), &self.media_script)
            .await
    }
}
