// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.

use crate::diagnostic::ConfigError;
use crate::model::FieldSyncConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every failure instead of stopping at the first.
pub fn validate_config(config: &FieldSyncConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut invalid = |message: String| errors.push(ConfigError::Validation { message });

    if !LOG_LEVELS.contains(&config.log.level.as_str()) {
        invalid(format!(
            "log.level `{}` must be one of {}",
            config.log.level,
            LOG_LEVELS.join(", ")
        ));
    }

    if config.storage.database_path.trim().is_empty() {
        invalid("storage.database_path must not be empty".to_string());
    }

    let base_url = config.remote.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        invalid(format!(
            "remote.base_url `{base_url}` must start with http:// or https://"
        ));
    }

    if let Some(token) = &config.remote.auth_token
        && token.trim().is_empty()
    {
        invalid("remote.auth_token must not be blank when set".to_string());
    }

    for (key, value) in [
        ("remote.mutation_timeout_secs", config.remote.mutation_timeout_secs),
        ("remote.media_timeout_secs", config.remote.media_timeout_secs),
        ("sync.interval_secs", config.sync.interval_secs),
        ("sync.probe_interval_secs", config.sync.probe_interval_secs),
        ("sync.lease_ttl_secs", config.sync.lease_ttl_secs),
    ] {
        if value == 0 {
            invalid(format!("{key} must be greater than 0"));
        }
    }

    if config.sync.max_retry < 1 {
        invalid("sync.max_retry must be at least 1".to_string());
    }

    if let Some(addr) = &config.metrics.listen_addr
        && addr.parse::<std::net::SocketAddr>().is_err()
    {
        invalid(format!(
            "metrics.listen_addr `{addr}` is not a valid socket address"
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
