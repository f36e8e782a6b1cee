// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Query modules for CRUD operations on stored entities.

pub mod data_queue;
pub mod deliveries;
pub mod events;
pub mod lease;
pub mod media;
pub mod outcomes;
