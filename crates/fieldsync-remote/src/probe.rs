// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic reachability check of the remote authority.
//!
//! Any HTTP response from `GET {base_url}/health` means the network path is
//! up, whatever the status code. Connection errors and timeouts mean offline.

use std::time::Duration;

use fieldsync_config::model::RemoteConfig;
use fieldsync_core::FieldSyncError;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::endpoint;

pub struct ReachabilityProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl ReachabilityProbe {
    /// Build a probe whose per-request timeout is `timeout`.
    pub fn new(config: &RemoteConfig, timeout: Duration) -> Result<Self, FieldSyncError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| FieldSyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: endpoint(&config.base_url, "health"),
            timeout,
        })
    }

    /// One probe. Never fails: unreachable is a result, not an error.
    pub async fn check(&self) -> bool {
        match self
            .client
            .get(&self.url)
            .timeout(self.timeout)
            .send()
            .await
        {
            Ok(resp) => {
                debug!(status = %resp.status(), "remote reachable");
                true
            }
            Err(e) => {
                debug!(error = %e, "remote unreachable");
                false
            }
        }
    }

    /// Probe every `interval` until `cancel` fires, handing each result to
    /// `report`. The first probe runs immediately.
    pub async fn run<F>(self, interval: Duration, cancel: CancellationToken, report: F)
    where
        F: Fn(bool) + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let reachable = tokio::select! {
                        r = self.check() => r,
                        _ = cancel.cancelled() => break,
                    };
                    report(reachable);
                }
                _ = cancel.cancelled() => break,
            }
        }
        info!("reachability probe stopped");
    }
}
