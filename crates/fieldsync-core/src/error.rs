// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the fieldsync engine.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all fieldsync adapter traits and engine operations.
#[derive(Debug, Error)]
pub enum FieldSyncError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Record store errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A record addressed by id does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A write would break a record-store invariant (e.g. a second open
    /// terminal transaction for the same delivery).
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// A send to the remote authority failed.
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl FieldSyncError {
    /// Wraps any error as a storage error.
    pub fn storage(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        FieldSyncError::Storage {
            source: source.into(),
        }
    }
}

/// Classification of a failed send to the remote authority.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// Connection refused, DNS failure, reset, TLS failure.
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete within its timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The remote refused the transaction (validation, conflict). Not retryable.
    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// Remote-side failure or throttling (5xx, 408, 429).
    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    /// Credentials were refused (401). The session is no longer valid.
    #[error("credentials rejected by remote")]
    Unauthorized,
}

impl RemoteError {
    /// Maps a non-success HTTP status to an error class.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => RemoteError::Unauthorized,
            408 | 429 => RemoteError::Server { status, body },
            400..=499 => RemoteError::Rejected { status, body },
            _ => RemoteError::Server { status, body },
        }
    }

    /// Whether the same send may succeed on a later pass.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::Network(_) | RemoteError::Timeout(_) | RemoteError::Server { .. }
        )
    }
}
