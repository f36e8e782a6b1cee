// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite record store for the fieldsync engine.
//!
//! WAL-mode SQLite with embedded migrations, a single-writer concurrency model
//! via `tokio-rusqlite`, and typed CRUD for deliveries, events, media assets,
//! and the data mutation queue.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteRecordStore;
pub use database::Database;
