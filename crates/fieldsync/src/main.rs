// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! fieldsync - offline-first delivery record synchronization.
//!
//! Binary entry point: the sync daemon plus the operator commands that inspect
//! and repair the local queues.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod deliveries;
mod queue;
mod serve;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fieldsync_config::FieldSyncConfig;
use fieldsync_core::FieldSyncError;

/// fieldsync - offline-first delivery record synchronization.
#[derive(Parser, Debug)]
#[command(name = "fieldsync", version, about, long_about = None)]
struct Cli {
    /// Read configuration from this file instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON.
    #[arg(long, global = true)]
    json: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    plain: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the sync engine until interrupted.
    Serve,
    /// Run one synchronization pass now and print its report.
    Sync,
    /// Show sync backlog counts.
    Status,
    /// Show the pending queues, or requeue a stuck item.
    Queue {
        #[command(subcommand)]
        action: Option<queue::QueueAction>,
    },
    /// Record delivery progress locally.
    Deliveries {
        #[command(subcommand)]
        action: deliveries::DeliveryAction,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(errors) => {
            fieldsync_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    serve::init_tracing(&config.log.level);

    let output = Output {
        json: cli.json,
        plain: cli.plain,
    };
    let result = match cli.command {
        Commands::Serve => serve::run_serve(config, cli.config).await,
        Commands::Sync => status::run_sync(&config, output).await,
        Commands::Status => status::run_status(&config, output).await,
        Commands::Queue { action } => queue::run_queue(&config, action, output).await,
        Commands::Deliveries { action } => {
            deliveries::run_deliveries(&config, action, output).await
        }
    };

    if let Err(e) = result {
        eprintln!("fieldsync: {e}");
        std::process::exit(1);
    }
}

pub(crate) fn load_config(
    path: Option<&std::path::Path>,
) -> Result<FieldSyncConfig, Vec<fieldsync_config::ConfigError>> {
    match path {
        Some(path) => fieldsync_config::load_and_validate_path(path),
        None => fieldsync_config::load_and_validate(),
    }
}

/// Output preferences shared by the operator commands.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Output {
    pub json: bool,
    pub plain: bool,
}

impl Output {
    pub fn use_color(&self) -> bool {
        use std::io::IsTerminal;
        !self.plain && std::io::stdout().is_terminal()
    }

    /// Print `value` as pretty JSON.
    pub fn print_json<T: serde::Serialize>(&self, value: &T) -> Result<(), FieldSyncError> {
        let text = serde_json::to_string_pretty(value)
            .map_err(|e| FieldSyncError::Internal(format!("failed to encode output: {e}")))?;
        println!("{text}");
        Ok(())
    }
}

/// Open the configured SQLite store.
pub(crate) async fn open_store(
    config: &FieldSyncConfig,
) -> Result<fieldsync_storage::SqliteRecordStore, FieldSyncError> {
    let store = fieldsync_storage::SqliteRecordStore::new(config.storage.clone());
    store.initialize().await?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    #[cfg(not(target_env = "msvc"))]
    fn jemalloc_is_active() {
        use tikv_jemalloc_ctl::{epoch, stats};
        epoch::advance().unwrap();
        let allocated = stats::allocated::read().unwrap();
        assert!(allocated > 0, "jemalloc should report non-zero allocation");
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_queue_retry() {
        let cli = Cli::try_parse_from(["fieldsync", "queue", "retry", "data", "7"]).unwrap();
        match cli.command {
            Commands::Queue {
                action: Some(queue::QueueAction::Retry { kind, id }),
            } => {
                assert_eq!(kind, queue::QueueKind::Data);
                assert_eq!(id, "7");
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn parses_completion_with_media() {
        let cli = Cli::try_parse_from([
            "fieldsync",
            "--plain",
            "deliveries",
            "complete",
            "del_1",
            "--signature",
            "/tmp/s.png",
            "--photo",
            "/tmp/a.jpg",
            "--photo",
            "/tmp/b.jpg",
        ])
        .unwrap();
        assert!(cli.plain);
        match cli.command {
            Commands::Deliveries {
                action: deliveries::DeliveryAction::Complete { id, photo, .. },
            } => {
                assert_eq!(id, "del_1");
                assert_eq!(photo.len(), 2);
            }
            other => panic!("unexpected parse: {other:?}"),
        }
    }
}
