// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the fieldsync engine.
//!
//! Defines the error types, the domain model (deliveries, events, media
//! assets, data queue items), and the adapter traits that the record store and
//! remote transport implement.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{FieldSyncError, RemoteError};
pub use types::{AdapterType, HealthStatus};

pub use traits::{PluginAdapter, RecordStore, RemoteTransport};
