// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level fieldsync configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSyncConfig {
    #[serde(default)]
    pub log: LogConfig,

    /// Local record store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Remote authority endpoint and credentials.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Orchestrator and retry policy.
    #[serde(default)]
    pub sync: SyncConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LogConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite record store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("fieldsync").join("fieldsync.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("fieldsync.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_wal_mode() -> bool {
    true
}

/// Remote authority configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Root URL; `/mutations`, `/media`, and `/health` are resolved against it.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token. `None` means the session is unauthenticated and no
    /// synchronization is attempted automatically.
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Timeout for a single `POST /mutations`.
    #[serde(default = "default_mutation_timeout_secs")]
    pub mutation_timeout_secs: u64,

    /// Timeout for a single media upload.
    #[serde(default = "default_media_timeout_secs")]
    pub media_timeout_secs: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_token: None,
            mutation_timeout_secs: default_mutation_timeout_secs(),
            media_timeout_secs: default_media_timeout_secs(),
        }
    }
}

impl RemoteConfig {
    pub fn mutation_timeout(&self) -> Duration {
        Duration::from_secs(self.mutation_timeout_secs)
    }

    pub fn media_timeout(&self) -> Duration {
        Duration::from_secs(self.media_timeout_secs)
    }
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080/api".to_string()
}

fn default_mutation_timeout_secs() -> u64 {
    15
}

fn default_media_timeout_secs() -> u64 {
    60
}

/// Orchestrator and retry policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Seconds between periodic passes while connected and authenticated.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,

    /// Retry threshold shared by the data and media queues.
    #[serde(default = "default_max_retry")]
    pub max_retry: u32,

    /// Seconds between reachability probes of the remote.
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,

    /// Lifetime of the store-wide sync lease. A pass renews it while running;
    /// a lease left behind by a crashed process blocks other syncs at most
    /// this long.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_retry: default_max_retry(),
            probe_interval_secs: default_probe_interval_secs(),
            lease_ttl_secs: default_lease_ttl_secs(),
        }
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_max_retry() -> u32 {
    3
}

fn default_probe_interval_secs() -> u64 {
    10
}

fn default_lease_ttl_secs() -> u64 {
    300
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Prometheus scrape listener, e.g. `127.0.0.1:9464`. Disabled when unset.
    #[serde(default)]
    pub listen_addr: Option<String>,
}
