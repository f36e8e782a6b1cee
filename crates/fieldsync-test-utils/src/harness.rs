// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness wiring a record store, a [`MockTransport`], a gate, and a
//! [`SyncOrchestrator`] together, with helpers that record deliveries the
//! way the field app does.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fieldsync_config::model::StorageConfig;
use fieldsync_core::types::{
    DataQueueItem, Delivery, DeliveryOutcome, MediaType, OutcomeKind,
};
use fieldsync_core::{FieldSyncError, RecordStore};
use fieldsync_storage::SqliteRecordStore;
use fieldsync_sync::{GateState, SessionGate, SyncOrchestrator, SyncSettings};
use tempfile::TempDir;

use crate::memory_store::MemoryRecordStore;
use crate::mock_transport::MockTransport;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    settings: SyncSettings,
    gate: GateState,
    sqlite: bool,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            settings: SyncSettings::default(),
            gate: GateState::default(),
            sqlite: false,
        }
    }

    pub fn max_retry(mut self, max_retry: u32) -> Self {
        self.settings.max_retry = max_retry;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.settings.interval = interval;
        self
    }

    pub fn send_timeout(mut self, timeout: Duration) -> Self {
        self.settings.mutation_timeout = timeout;
        self.settings.media_timeout = timeout;
        self
    }

    /// Initial gate state. Defaults to offline and unauthenticated.
    pub fn gate(mut self, state: GateState) -> Self {
        self.gate = state;
        self
    }

    /// Use a temporary SQLite database instead of the in-memory store.
    pub fn sqlite(mut self) -> Self {
        self.sqlite = true;
        self
    }

    pub async fn build(self) -> Result<TestHarness, FieldSyncError> {
        let temp_dir = TempDir::new().map_err(FieldSyncError::storage)?;

        let memory = Arc::new(MemoryRecordStore::new());
        let database_path = self
            .sqlite
            .then(|| temp_dir.path().join("test.db").to_string_lossy().into_owned());
        let store: Arc<dyn RecordStore> = match &database_path {
            Some(path) => Arc::new(open_sqlite(path).await?) as Arc<dyn RecordStore>,
            None => memory.clone() as Arc<dyn RecordStore>,
        };

        let transport = Arc::new(MockTransport::new());
        let gate = SessionGate::new(self.gate);
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&store),
            transport.clone(),
            gate.clone(),
            self.settings.clone(),
        );

        Ok(TestHarness {
            store,
            memory,
            transport,
            gate,
            orchestrator,
            settings: self.settings,
            database_path,
            temp_dir,
        })
    }
}

async fn open_sqlite(path: &str) -> Result<SqliteRecordStore, FieldSyncError> {
    let store = SqliteRecordStore::new(StorageConfig {
        database_path: path.to_string(),
        wal_mode: true,
    });
    store.initialize().await?;
    Ok(store)
}

/// A complete engine over test doubles.
pub struct TestHarness {
    pub store: Arc<dyn RecordStore>,
    /// The in-memory store; the same object as `store` unless built with `sqlite()`.
    pub memory: Arc<MemoryRecordStore>,
    pub transport: Arc<MockTransport>,
    pub gate: SessionGate,
    pub orchestrator: SyncOrchestrator,
    pub settings: SyncSettings,
    database_path: Option<String>,
    temp_dir: TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Harness with default settings and an in-memory store.
    pub async fn new() -> Result<Self, FieldSyncError> {
        Self::builder().build().await
    }

    /// A second, independent engine over the same database file and transport,
    /// as a separate process would open it. Requires a harness built with
    /// `sqlite()`.
    pub async fn second_engine(&self) -> Result<SyncOrchestrator, FieldSyncError> {
        let path = self.database_path.as_deref().ok_or_else(|| {
            FieldSyncError::Config("second_engine requires a sqlite harness".into())
        })?;
        let store = Arc::new(open_sqlite(path).await?);
        Ok(SyncOrchestrator::new(
            store,
            self.transport.clone(),
            SessionGate::new(self.gate.current()),
            self.settings.clone(),
        ))
    }

    /// Write a file into the harness's temp directory and return its path.
    pub async fn media_file(&self, name: &str, bytes: &[u8]) -> Result<String, FieldSyncError> {
        let path: PathBuf = self.temp_dir.path().join(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(FieldSyncError::storage)?;
        Ok(path.to_string_lossy().into_owned())
    }

    pub async fn add_delivery(&self, id: &str) -> Result<Delivery, FieldSyncError> {
        let delivery = Delivery::new(id, format!("Recipient {id}"), format!("Street {id}"));
        self.store.insert_delivery(&delivery).await?;
        Ok(delivery)
    }

    /// Record a completion with a real signature file on disk.
    pub async fn complete_delivery(&self, id: &str) -> Result<DataQueueItem, FieldSyncError> {
        let signature = self
            .media_file(&format!("{id}-signature.png"), b"\x89PNG signature")
            .await?;
        self.store
            .record_outcome(&DeliveryOutcome {
                delivery_id: id.to_string(),
                kind: OutcomeKind::Completed,
                location: None,
                reason: None,
                notes: None,
                media: vec![(MediaType::Signature, signature)],
            })
            .await
    }

    /// Record a failure with no media.
    pub async fn fail_delivery(&self, id: &str, reason: &str) -> Result<DataQueueItem, FieldSyncError> {
        self.store
            .record_outcome(&DeliveryOutcome {
                delivery_id: id.to_string(),
                kind: OutcomeKind::Failed,
                location: None,
                reason: Some(reason.to_string()),
                notes: None,
                media: Vec::new(),
            })
            .await
    }
}
