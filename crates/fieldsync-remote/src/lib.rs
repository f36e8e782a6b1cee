// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP side of the fieldsync engine.
//!
//! [`HttpTransport`] implements [`RemoteTransport`](fieldsync_core::RemoteTransport)
//! against the remote authority's `/mutations` and `/media` endpoints, and
//! [`ReachabilityProbe`] reports whether `/health` answers at all.

pub mod client;
pub mod probe;

pub use client::HttpTransport;
pub use probe::ReachabilityProbe;

/// Resolve `path` against a base URL that may or may not end in `/`.
pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{path}", base_url.trim_end_matches('/'))
}
