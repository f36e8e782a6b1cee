// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sync orchestrator: decides when a pass runs and keeps passes exclusive.
//!
//! A pass runs the data queue to completion, then the media queue. Passes are
//! triggered by:
//!
//! - the gate becoming eligible (online while authenticated, or authenticated
//!   while online),
//! - a periodic timer that exists only while the gate is eligible,
//! - [`SyncOrchestrator::trigger_sync_now`] / [`SyncOrchestrator::sync_now`].
//!
//! A trigger that arrives while a pass is running is dropped. Losing the gate
//! cancels the timer but never the pass in flight.
//!
//! Exclusivity holds across processes too: a pass runs only while its
//! orchestrator holds the record store's sync lease, so `fieldsync sync` and a
//! running daemon never drain the same database at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fieldsync_config::model::FieldSyncConfig;
use fieldsync_core::types::now_timestamp;
use fieldsync_core::{FieldSyncError, RecordStore, RemoteError, RemoteTransport};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::data_queue::{DataQueueProcessor, DataQueueReport};
use crate::gate::{GateState, SessionGate};
use crate::media::{MediaProcessor, MediaReport};
use crate::metrics::{record_pass, set_backlog, QUEUE_DATA, QUEUE_MEDIA};
use crate::status::Backlog;

/// Engine tuning, usually derived from [`FieldSyncConfig`].
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub max_retry: u32,
    /// Period of the timer that runs while connected and authenticated.
    pub interval: Duration,
    pub mutation_timeout: Duration,
    pub media_timeout: Duration,
    /// Lifetime of the store-wide sync lease; renewed while a pass runs.
    pub lease_ttl: Duration,
}

impl SyncSettings {
    pub fn from_config(config: &FieldSyncConfig) -> Self {
        Self {
            max_retry: config.sync.max_retry,
            interval: config.sync.interval(),
            mutation_timeout: config.remote.mutation_timeout(),
            media_timeout: config.remote.media_timeout(),
            lease_ttl: config.sync.lease_ttl(),
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self::from_config(&FieldSyncConfig::default())
    }
}

/// Result of one pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub data: DataQueueReport,
    pub media: MediaReport,
    /// Queue sizes after the pass.
    pub backlog: Backlog,
    pub started_at: String,
    pub finished_at: String,
}

impl PassReport {
    pub fn auth_rejected(&self) -> bool {
        self.data.auth_rejected || self.media.auth_rejected
    }
}

/// What a request for a pass turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass was already running, here or in another process sharing
    /// the store.
    Skipped,
    Completed(PassReport),
    /// The pass aborted on an unexpected error; queue state is untouched
    /// beyond the items already processed.
    Failed(String),
}

/// Read model for status displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStatus {
    pub is_syncing: bool,
    /// Finish time of the last pass that completed without errors.
    pub last_sync_at: Option<String>,
    /// Error of the last pass, cleared by the next clean pass.
    pub last_sync_error: Option<String>,
    pub last_report: Option<PassReport>,
}

struct Inner {
    store: Arc<dyn RecordStore>,
    data: DataQueueProcessor,
    media: MediaProcessor,
    gate: SessionGate,
    settings: SyncSettings,
    /// Identity under which this orchestrator takes the sync lease.
    lease_owner: String,
    running: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

/// Clears the running flag on every exit path, including panics.
struct RunningGuard {
    inner: Arc<Inner>,
}

impl RunningGuard {
    fn acquire(inner: &Arc<Inner>) -> Option<Self> {
        inner
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        inner.status.send_modify(|s| s.is_syncing = true);
        Some(Self {
            inner: Arc::clone(inner),
        })
    }
}

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.inner.running.store(false, Ordering::Release);
        self.inner.status.send_modify(|s| s.is_syncing = false);
    }
}

/// Cheaply cloneable handle to the engine.
#[derive(Clone)]
pub struct SyncOrchestrator {
    inner: Arc<Inner>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        transport: Arc<dyn RemoteTransport>,
        gate: SessionGate,
        settings: SyncSettings,
    ) -> Self {
        let data = DataQueueProcessor::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            settings.max_retry,
            settings.mutation_timeout,
        );
        let media = MediaProcessor::new(
            Arc::clone(&store),
            transport,
            settings.max_retry,
            settings.media_timeout,
        );
        let (status, _rx) = watch::channel(SyncStatus::default());
        Self {
            inner: Arc::new(Inner {
                store,
                data,
                media,
                gate,
                settings,
                lease_owner: format!("{}-{}", std::process::id(), uuid::Uuid::new_v4()),
                running: AtomicBool::new(false),
                status,
            }),
        }
    }

    pub fn gate(&self) -> &SessionGate {
        &self.inner.gate
    }

    pub fn is_syncing(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }

    /// Snapshot of the read model.
    pub fn status(&self) -> SyncStatus {
        self.inner.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status.subscribe()
    }

    /// Start a pass in the background unless one is running.
    ///
    /// Returns whether a pass was started. Must be called within a tokio runtime.
    pub fn trigger_sync_now(&self) -> bool {
        let Some(guard) = RunningGuard::acquire(&self.inner) else {
            debug!("sync already running, trigger ignored");
            return false;
        };
        tokio::spawn(Arc::clone(&self.inner).supervise(guard));
        true
    }

    /// Run a pass and wait for it.
    ///
    /// The pass lives on its own task: dropping this future does not cancel it.
    pub async fn sync_now(&self) -> PassOutcome {
        let Some(guard) = RunningGuard::acquire(&self.inner) else {
            debug!("sync already running, request ignored");
            return PassOutcome::Skipped;
        };
        match tokio::spawn(Arc::clone(&self.inner).supervise(guard)).await {
            Ok(outcome) => outcome,
            Err(e) => PassOutcome::Failed(format!("sync supervisor failed: {e}")),
        }
    }

    /// React to gate emissions until `cancel` fires.
    ///
    /// If the gate is already eligible when this starts, a pass runs at once.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut rx = self.inner.gate.subscribe();
        let mut timer: Option<CancellationToken> = None;
        let mut previous = GateState::default();

        loop {
            let current = *rx.borrow_and_update();
            self.apply_transition(previous, current, &mut timer, &cancel);
            previous = current;

            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        if let Some(timer) = timer.take() {
            timer.cancel();
        }
        info!("sync orchestrator stopped");
    }

    fn apply_transition(
        &self,
        previous: GateState,
        current: GateState,
        timer: &mut Option<CancellationToken>,
        cancel: &CancellationToken,
    ) {
        match (previous.is_eligible(), current.is_eligible()) {
            (false, true) => {
                info!("connected and authenticated, starting sync");
                self.trigger_sync_now();
                let token = cancel.child_token();
                self.spawn_timer(token.clone());
                *timer = Some(token);
            }
            (true, false) => {
                if let Some(timer) = timer.take() {
                    timer.cancel();
                }
                info!(
                    is_connected = current.is_connected,
                    is_authenticated = current.is_authenticated,
                    "sync paused"
                );
            }
            _ => {}
        }
    }

    fn spawn_timer(&self, token: CancellationToken) {
        let this = self.clone();
        let period = self.inner.settings.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        this.trigger_sync_now();
                    }
                    _ = token.cancelled() => break,
                }
            }
            debug!("periodic sync timer stopped");
        });
    }
}

impl Inner {
    /// Run the pass on its own task and record the outcome.
    async fn supervise(self: Arc<Self>, guard: RunningGuard) -> PassOutcome {
        let started = Instant::now();
        let started_at = now_timestamp();

        match self
            .store
            .acquire_sync_lease(&self.lease_owner, self.settings.lease_ttl)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                info!("another process is syncing this store, pass skipped");
                record_pass("skipped", started.elapsed().as_secs_f64());
                drop(guard);
                return PassOutcome::Skipped;
            }
            Err(e) => {
                warn!(error = %e, "could not take the sync lease");
                let message = e.to_string();
                self.status
                    .send_modify(|s| s.last_sync_error = Some(message.clone()));
                record_pass("error", started.elapsed().as_secs_f64());
                drop(guard);
                return PassOutcome::Failed(message);
            }
        }

        let result = match self.run_pass_holding_lease().await {
            Ok(result) => result,
            Err(e) => Err(FieldSyncError::Internal(format!("sync pass aborted: {e}"))),
        };

        let backlog = match Backlog::read(self.store.as_ref(), self.settings.max_retry).await {
            Ok(backlog) => {
                set_backlog(QUEUE_DATA, backlog.data_pending + backlog.data_stuck);
                set_backlog(QUEUE_MEDIA, backlog.media_pending + backlog.media_stuck);
                backlog
            }
            Err(e) => {
                debug!(error = %e, "backlog unavailable after pass");
                Backlog::default()
            }
        };

        if let Err(e) = self.store.release_sync_lease(&self.lease_owner).await {
            warn!(error = %e, "could not release the sync lease, it will expire");
        }

        let finished_at = now_timestamp();
        let elapsed = started.elapsed().as_secs_f64();

        let outcome = match result {
            Ok((data, media)) => {
                let report = PassReport {
                    data,
                    media,
                    backlog,
                    started_at,
                    finished_at: finished_at.clone(),
                };
                let auth_rejected = report.auth_rejected();
                info!(
                    data_sent = report.data.succeeded,
                    data_failed = report.data.failed + report.data.terminal,
                    media_sent = report.media.succeeded,
                    media_failed = report.media.failed + report.media.terminal + report.media.missing,
                    elapsed_secs = elapsed,
                    "sync pass finished"
                );
                self.status.send_modify(|s| {
                    if auth_rejected {
                        s.last_sync_error = Some(RemoteError::Unauthorized.to_string());
                    } else {
                        s.last_sync_at = Some(finished_at);
                        s.last_sync_error = None;
                    }
                    s.last_report = Some(report.clone());
                });
                if auth_rejected {
                    record_pass("unauthorized", elapsed);
                    self.gate.revoke_session();
                } else {
                    record_pass("success", elapsed);
                }
                PassOutcome::Completed(report)
            }
            Err(e) => {
                warn!(error = %e, elapsed_secs = elapsed, "sync pass failed");
                let message = e.to_string();
                self.status
                    .send_modify(|s| s.last_sync_error = Some(message.clone()));
                record_pass("error", elapsed);
                PassOutcome::Failed(message)
            }
        };

        drop(guard);
        outcome
    }

    /// Run the pass on its own task, renewing the lease until it finishes.
    async fn run_pass_holding_lease(
        self: &Arc<Self>,
    ) -> Result<Result<(DataQueueReport, MediaReport), FieldSyncError>, tokio::task::JoinError>
    {
        let worker = Arc::clone(self);
        let mut pass = tokio::spawn(async move { worker.run_pass().await });

        let period = (self.settings.lease_ttl / 3).max(Duration::from_millis(100));
        let mut renew = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        renew.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                joined = &mut pass => return joined,
                _ = renew.tick() => {
                    match self
                        .store
                        .acquire_sync_lease(&self.lease_owner, self.settings.lease_ttl)
                        .await
                    {
                        Ok(true) => debug!("sync lease renewed"),
                        Ok(false) => warn!("sync lease lost to another process mid-pass"),
                        Err(e) => warn!(error = %e, "sync lease renewal failed"),
                    }
                }
            }
        }
    }

    async fn run_pass(&self) -> Result<(DataQueueReport, MediaReport), FieldSyncError> {
        let data = self.data.process().await?;
        if data.auth_rejected {
            return Ok((data, MediaReport::default()));
        }
        let media = self.media.process().await?;
        Ok((data, media))
    }
}
