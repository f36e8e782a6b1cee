// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The offline-first synchronization engine.
//!
//! Two independent queue processors drain locally recorded work toward the
//! remote authority:
//!
//! - [`DataQueueProcessor`] sends structured delivery outcomes and is the only
//!   path by which a delivery reaches `COMPLETED_SYNC`.
//! - [`MediaProcessor`] uploads photos and signatures with its own retry
//!   accounting, so a stalled upload never blocks structured data.
//!
//! [`SyncOrchestrator`] decides when a pass runs (gate transitions, a periodic
//! timer bound to "connected and authenticated", or a manual trigger) and
//! guarantees that at most one pass runs at a time.

pub mod data_queue;
pub mod gate;
pub mod media;
pub mod metrics;
pub mod orchestrator;
pub mod status;

pub use data_queue::{DataQueueProcessor, DataQueueReport};
pub use gate::{GateState, SessionGate};
pub use media::{MediaProcessor, MediaReport};
pub use orchestrator::{PassOutcome, PassReport, SyncOrchestrator, SyncSettings, SyncStatus};
pub use status::Backlog;
