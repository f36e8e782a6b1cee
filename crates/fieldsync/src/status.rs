// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `fieldsync sync` and `fieldsync status` command implementations.
//!
//! `sync` runs a single pass against the configured remote without starting
//! the daemon. `status` reads the local backlog and never touches the network.

use std::sync::Arc;

use fieldsync_config::FieldSyncConfig;
use fieldsync_core::{FieldSyncError, PluginAdapter};
use fieldsync_remote::HttpTransport;
use fieldsync_sync::{
    Backlog, GateState, PassOutcome, PassReport, SessionGate, SyncOrchestrator, SyncSettings,
};
use serde::Serialize;

use crate::Output;

/// Structured `status` output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusView {
    pub database: String,
    pub remote: String,
    pub max_retry: u32,
    pub backlog: Backlog,
}

/// Run the `fieldsync sync` command.
pub async fn run_sync(config: &FieldSyncConfig, output: Output) -> Result<(), FieldSyncError> {
    let store = Arc::new(crate::open_store(config).await?);
    let transport = Arc::new(HttpTransport::new(&config.remote)?);
    // A manual pass is an explicit request: the reachability gate only
    // governs automatic triggering.
    let gate = SessionGate::new(GateState::new(true, config.remote.auth_token.is_some()));
    let orchestrator = SyncOrchestrator::new(
        store.clone(),
        transport,
        gate,
        SyncSettings::from_config(config),
    );

    let outcome = orchestrator.sync_now().await;
    store.shutdown().await?;

    match outcome {
        PassOutcome::Completed(report) => {
            if output.json {
                output.print_json(&report)?;
            } else {
                print_report(&report, output.use_color());
            }
            if report.auth_rejected() {
                return Err(FieldSyncError::Remote(
                    fieldsync_core::RemoteError::Unauthorized,
                ));
            }
            Ok(())
        }
        PassOutcome::Skipped => Err(FieldSyncError::Internal(
            "a sync pass is already running against this database (is `fieldsync serve` syncing?)"
                .to_string(),
        )),
        PassOutcome::Failed(message) => Err(FieldSyncError::Internal(message)),
    }
}

/// Run the `fieldsync status` command.
pub async fn run_status(config: &FieldSyncConfig, output: Output) -> Result<(), FieldSyncError> {
    let store = crate::open_store(config).await?;
    let backlog = Backlog::read(&store, config.sync.max_retry).await?;
    store.shutdown().await?;

    let view = StatusView {
        database: config.storage.database_path.clone(),
        remote: config.remote.base_url.clone(),
        max_retry: config.sync.max_retry,
        backlog,
    };
    if output.json {
        output.print_json(&view)?;
    } else {
        print_status(&view, output.use_color());
    }
    Ok(())
}

fn print_report(report: &PassReport, use_color: bool) {
    println!();
    println!("  fieldsync sync");
    println!("  {}", "-".repeat(35));
    println!(
        "    Data:     {} sent, {} confirmed, {} failed, {} terminal",
        report.data.attempted, report.data.succeeded, report.data.failed, report.data.terminal
    );
    println!(
        "    Media:    {} sent, {} uploaded, {} failed, {} terminal, {} missing",
        report.media.attempted,
        report.media.succeeded,
        report.media.failed,
        report.media.terminal,
        report.media.missing
    );
    println!("    Backlog:  {}", backlog_summary(&report.backlog));

    let state = if report.auth_rejected() {
        Health::Fail("credentials rejected")
    } else if report.data.failed + report.media.failed > 0 {
        Health::Warn("some sends failed, will retry")
    } else {
        Health::Ok("clean")
    };
    print_state(state, use_color);
    println!();
}

fn print_status(view: &StatusView, use_color: bool) {
    println!();
    println!("  fieldsync status");
    println!("  {}", "-".repeat(35));
    println!("    Database: {}", view.database);
    println!("    Remote:   {}", view.remote);
    println!("    Backlog:  {}", backlog_summary(&view.backlog));

    let state = if view.backlog.data_stuck + view.backlog.media_stuck > 0 {
        Health::Warn("stuck items need `fieldsync queue retry`")
    } else if view.backlog.is_empty() {
        Health::Ok("everything synced")
    } else {
        Health::Ok("waiting for next pass")
    };
    print_state(state, use_color);
    println!();
}

fn backlog_summary(backlog: &Backlog) -> String {
    format!(
        "data {} pending / {} stuck, media {} pending / {} stuck",
        backlog.data_pending, backlog.data_stuck, backlog.media_pending, backlog.media_stuck
    )
}

enum Health<'a> {
    Ok(&'a str),
    Warn(&'a str),
    Fail(&'a str),
}

fn print_state(state: Health<'_>, use_color: bool) {
    if use_color {
        use colored::Colorize;
        match state {
            Health::Ok(msg) => println!("    State:    {} {}", "✓".green(), msg.green()),
            Health::Warn(msg) => println!("    State:    {} {}", "!".yellow(), msg.yellow()),
            Health::Fail(msg) => println!("    State:    {} {}", "✗".red(), msg.red()),
        }
    } else {
        match state {
            Health::Ok(msg) => println!("    State:    [OK] {msg}"),
            Health::Warn(msg) => println!("    State:    [WARN] {msg}"),
            Health::Fail(msg) => println!("    State:    [FAIL] {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backlog_summary_lists_all_counts() {
        let backlog = Backlog {
            data_pending: 3,
            data_stuck: 1,
            media_pending: 2,
            media_stuck: 0,
        };
        assert_eq!(
            backlog_summary(&backlog),
            "data 3 pending / 1 stuck, media 2 pending / 0 stuck"
        );
    }

    #[test]
    fn status_view_serializes() {
        let view = StatusView {
            database: "/tmp/fs.db".to_string(),
            remote: "https://api.example.com".to_string(),
            max_retry: 5,
            backlog: Backlog::default(),
        };
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["max_retry"], 5);
        assert_eq!(json["backlog"]["data_pending"], 0);
    }
}
