// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Layered configuration loading with Figment.
//!
//! Merge order (later overrides earlier): compiled defaults,
//! `/etc/fieldsync/fieldsync.toml`, `~/.config/fieldsync/fieldsync.toml`,
//! `./fieldsync.toml`, then `FIELDSYNC_*` environment variables.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::FieldSyncConfig;

pub(crate) const SYSTEM_CONFIG_FILE: &str = "/etc/fieldsync/fieldsync.toml";
pub(crate) const LOCAL_CONFIG_FILE: &str = "fieldsync.toml";

/// Top-level sections, used to turn `FIELDSYNC_SECTION_KEY` into `section.key`.
const SECTIONS: &[&str] = &["log", "storage", "remote", "sync", "metrics"];

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("fieldsync").join(LOCAL_CONFIG_FILE))
}

/// Load configuration from the standard hierarchy with env var overrides.
pub fn load_config() -> Result<FieldSyncConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no files, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<FieldSyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FieldSyncConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<FieldSyncConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(FieldSyncConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(FieldSyncConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_FILE))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_FILE))
        .merge(env_provider())
}

/// Environment provider with explicit section mapping.
///
/// Only the first underscore after a known section name becomes a dot, so
/// `FIELDSYNC_REMOTE_AUTH_TOKEN` maps to `remote.auth_token` rather than
/// `remote.auth.token`.
fn env_provider() -> Env {
    Env::prefixed("FIELDSYNC_").map(|key| {
        let key_str = key.as_str();
        SECTIONS
            .iter()
            .find_map(|section| {
                key_str
                    .strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key_str.to_string())
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_map_to_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("FIELDSYNC_REMOTE_AUTH_TOKEN", "tok-123");
            jail.set_env("FIELDSYNC_SYNC_INTERVAL_SECS", "45");
            jail.set_env("FIELDSYNC_LOG_LEVEL", "debug");
            let config: FieldSyncConfig = Figment::new()
                .merge(Serialized::defaults(FieldSyncConfig::default()))
                .merge(env_provider())
                .extract()?;
            assert_eq!(config.remote.auth_token.as_deref(), Some("tok-123"));
            assert_eq!(config.sync.interval_secs, 45);
            assert_eq!(config.log.level, "debug");
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "custom.toml",
                r#"
[remote]
base_url = "https://api.example.com"
"#,
            )?;
            let config = load_config_from_path(Path::new("custom.toml"))?;
            assert_eq!(config.remote.base_url, "https://api.example.com");
            assert_eq!(config.sync.max_retry, 3);
            Ok(())
        });
    }
}
