// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for fieldsync integration tests.
//!
//! - [`MemoryRecordStore`] - in-memory record store with the same invariants as SQLite
//! - [`MockTransport`] - scripted remote with a send log and a concurrency gauge
//! - [`TestHarness`] - store, transport, gate, and orchestrator wired together

pub mod harness;
pub mod memory_store;
pub mod mock_transport;

pub use harness::TestHarness;
pub use memory_store::MemoryRecordStore;
pub use mock_transport::MockTransport;
