// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote transport trait for delivering queued work to the remote authority.

use async_trait::async_trait;

use crate::error::RemoteError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{MediaUpload, MutationRequest};

/// One network send per call. Implementations do not retry internally; retry
/// accounting belongs to the queue processors.
///
/// Both endpoints must tolerate duplicates: a send that succeeded remotely but
/// whose response was lost will be repeated on a later pass.
#[async_trait]
pub trait RemoteTransport: PluginAdapter {
    /// `POST /mutations`.
    async fn send_mutation(&self, request: &MutationRequest) -> Result<(), RemoteError>;

    /// `POST /media` as multipart.
    async fn upload_media(&self, upload: &MediaUpload) -> Result<(), RemoteError>;
}
