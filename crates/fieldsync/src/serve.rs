// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fieldsync serve`: the long-running sync daemon.
//!
//! Wires the SQLite store, the HTTP transport, the reachability probe, and the
//! orchestrator together, then runs until SIGINT/SIGTERM.
//!
//! A 401 from the remote revokes the session and pauses automatic sync.
//! SIGHUP reloads the configuration and re-arms the session with the
//! configured `remote.auth_token`.

use std::path::PathBuf;
use std::sync::Arc;

use fieldsync_config::model::RemoteConfig;
use fieldsync_config::FieldSyncConfig;
use fieldsync_core::{FieldSyncError, PluginAdapter};
use fieldsync_remote::{HttpTransport, ReachabilityProbe};
use fieldsync_sync::{GateState, SessionGate, SyncOrchestrator, SyncSettings};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub async fn run_serve(
    config: FieldSyncConfig,
    config_path: Option<PathBuf>,
) -> Result<(), FieldSyncError> {
    #[cfg(feature = "prometheus")]
    install_prometheus(&config);

    let store = Arc::new(crate::open_store(&config).await?);
    let transport = Arc::new(HttpTransport::new(&config.remote)?);
    let probe = ReachabilityProbe::new(&config.remote, config.sync.probe_interval())?;

    let authenticated = config.remote.auth_token.is_some();
    if !authenticated {
        warn!("no remote.auth_token configured; automatic sync stays paused");
    }
    let gate = SessionGate::new(GateState::new(false, authenticated));

    let orchestrator = SyncOrchestrator::new(
        store.clone(),
        transport.clone(),
        gate.clone(),
        SyncSettings::from_config(&config),
    );

    let cancel = install_signal_handler();
    let reload_task = tokio::spawn(reload_on_hangup(
        config_path,
        transport.as_ref().clone(),
        gate.clone(),
        cancel.clone(),
    ));

    let probe_gate = gate.clone();
    let probe_task = tokio::spawn(probe.run(
        config.sync.probe_interval(),
        cancel.clone(),
        move |reachable| probe_gate.set_connected(reachable),
    ));

    info!(
        remote = %config.remote.base_url,
        database = %config.storage.database_path,
        interval_secs = config.sync.interval_secs,
        "fieldsync serving"
    );
    orchestrator.run(cancel.clone()).await;

    for (name, task) in [("probe", probe_task), ("reload", reload_task)] {
        if let Err(e) = task.await {
            warn!(task = name, error = %e, "background task ended abnormally");
        }
    }
    if orchestrator.is_syncing() {
        info!("waiting for in-flight pass to finish");
        let mut status = orchestrator.subscribe_status();
        if status.wait_for(|s| !s.is_syncing).await.is_err() {
            debug!("status channel closed during shutdown");
        }
    }

    transport.shutdown().await?;
    store.shutdown().await?;
    info!("fieldsync stopped");
    Ok(())
}

/// Push reloaded credentials into the transport and the gate.
///
/// A present token re-authenticates the session even when it is unchanged:
/// the operator sending SIGHUP is the signal to try it again.
pub(crate) async fn apply_credentials(
    transport: &HttpTransport,
    gate: &SessionGate,
    remote: &RemoteConfig,
) {
    transport.set_auth_token(remote.auth_token.clone()).await;
    let authenticated = remote.auth_token.is_some();
    gate.set_authenticated(authenticated);
    if authenticated {
        info!("session re-authenticated from configuration");
    } else {
        warn!("no remote.auth_token configured; automatic sync stays paused");
    }
}

/// Reload the configuration on every SIGHUP until `cancel` fires.
#[cfg(unix)]
async fn reload_on_hangup(
    config_path: Option<PathBuf>,
    transport: HttpTransport,
    gate: SessionGate,
    cancel: CancellationToken,
) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut hangup = match signal(SignalKind::hangup()) {
        Ok(hangup) => hangup,
        Err(e) => {
            warn!(error = %e, "SIGHUP handler unavailable, credentials cannot be reloaded");
            return;
        }
    };

    loop {
        tokio::select! {
            received = hangup.recv() => {
                if received.is_none() {
                    break;
                }
                info!("received SIGHUP, reloading credentials");
                match crate::load_config(config_path.as_deref()) {
                    Ok(config) => apply_credentials(&transport, &gate, &config.remote).await,
                    Err(errors) => {
                        fieldsync_config::render_errors(&errors);
                        warn!(count = errors.len(), "configuration reload failed, keeping current credentials");
                    }
                }
            }
            _ = cancel.cancelled() => break,
        }
    }
}

#[cfg(not(unix))]
async fn reload_on_hangup(
    _config_path: Option<PathBuf>,
    _transport: HttpTransport,
    _gate: SessionGate,
    cancel: CancellationToken,
) {
    cancel.cancelled().await;
}

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise fieldsync crates log at `log_level`
/// and everything else at `warn`.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("fieldsync={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

/// Cancel the returned token on SIGINT or SIGTERM.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT, shutting down"),
                        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "SIGTERM handler unavailable, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT, shutting down");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, shutting down");
        }

        trigger.cancel();
    });

    token
}

#[cfg(feature = "prometheus")]
fn install_prometheus(config: &FieldSyncConfig) {
    let Some(addr) = config.metrics.listen_addr.as_deref() else {
        debug!("prometheus exporter disabled");
        return;
    };
    let addr: std::net::SocketAddr = match addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            warn!(error = %e, "invalid metrics.listen_addr, continuing without metrics");
            return;
        }
    };
    match metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
    {
        Ok(()) => {
            fieldsync_sync::metrics::register_metrics();
            info!(%addr, "prometheus exporter listening");
        }
        Err(e) => warn!(error = %e, "prometheus initialization failed, continuing without metrics"),
    }
}
