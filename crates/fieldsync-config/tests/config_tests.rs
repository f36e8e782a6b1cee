// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the fieldsync configuration system.

use fieldsync_config::{load_and_validate_str, load_config_from_str, ConfigError};

/// Valid TOML with every known field deserializes successfully.
#[test]
fn full_toml_deserializes() {
    let toml = r#"
[log]
level = "debug"

[storage]
database_path = "/tmp/fieldsync-test.db"
wal_mode = false

[remote]
base_url = "https://api.example.com/v1"
auth_token = "secret"
mutation_timeout_secs = 20
media_timeout_secs = 120

[sync]
interval_secs = 45
max_retry = 5
probe_interval_secs = 3

[metrics]
listen_addr = "127.0.0.1:9464"
"#;

    let config = load_and_validate_str(toml).expect("valid TOML should load");
    assert_eq!(config.log.level, "debug");
    assert_eq!(config.storage.database_path, "/tmp/fieldsync-test.db");
    assert!(!config.storage.wal_mode);
    assert_eq!(config.remote.base_url, "https://api.example.com/v1");
    assert_eq!(config.remote.auth_token.as_deref(), Some("secret"));
    assert_eq!(config.remote.mutation_timeout().as_secs(), 20);
    assert_eq!(config.remote.media_timeout().as_secs(), 120);
    assert_eq!(config.sync.interval().as_secs(), 45);
    assert_eq!(config.sync.max_retry, 5);
    assert_eq!(config.sync.probe_interval_secs, 3);
    assert_eq!(config.metrics.listen_addr.as_deref(), Some("127.0.0.1:9464"));
}

/// An empty document yields the documented defaults.
#[test]
fn empty_toml_uses_defaults() {
    let config = load_and_validate_str("").expect("defaults should validate");
    assert_eq!(config.sync.interval_secs, 30);
    assert_eq!(config.sync.max_retry, 3);
    assert_eq!(config.remote.mutation_timeout_secs, 15);
    assert!(config.remote.auth_token.is_none());
    assert!(config.storage.wal_mode);
}

/// Unknown keys are rejected with a suggestion.
#[test]
fn unknown_key_gets_suggestion() {
    let toml = r#"
[sync]
max_retries = 4
"#;
    let errors = load_and_validate_str(toml).expect_err("should reject unknown key");
    let unknown = errors
        .iter()
        .find_map(|e| match e {
            ConfigError::UnknownKey {
                key, suggestion, ..
            } => Some((key.clone(), suggestion.clone())),
            _ => None,
        })
        .expect("an UnknownKey diagnostic");
    assert_eq!(unknown.0, "max_retries");
    assert_eq!(unknown.1.as_deref(), Some("max_retry"));
}

/// Unknown top-level sections are rejected too.
#[test]
fn unknown_section_is_rejected() {
    let err = load_config_from_str("[telemetry]\nenabled = true\n")
        .expect_err("unknown section should fail");
    assert!(format!("{err}").contains("telemetry"));
}

/// A wrong value type is reported as InvalidType.
#[test]
fn wrong_type_reports_invalid_type() {
    let errors = load_and_validate_str("[sync]\ninterval_secs = \"soon\"\n")
        .expect_err("string for integer should fail");
    assert!(
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::InvalidType { key, .. } if key.contains("interval_secs"))),
        "got: {errors:?}"
    );
}

/// Semantic validation runs after successful deserialization.
#[test]
fn validation_errors_surface_from_str_loader() {
    let errors = load_and_validate_str("[remote]\nbase_url = \"localhost\"\n")
        .expect_err("scheme-less url should fail");
    assert!(errors
        .iter()
        .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("base_url"))));
}
