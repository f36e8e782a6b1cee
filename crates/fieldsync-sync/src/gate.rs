// SPDX-FileCopyrightText: 2026 Fieldsync Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connectivity and session gate.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

/// What the orchestrator needs to know about the outside world.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateState {
    pub is_connected: bool,
    pub is_authenticated: bool,
}

impl GateState {
    pub fn new(is_connected: bool, is_authenticated: bool) -> Self {
        Self {
            is_connected,
            is_authenticated,
        }
    }

    /// Automatic synchronization runs only while both hold.
    pub fn is_eligible(&self) -> bool {
        self.is_connected && self.is_authenticated
    }
}

/// Shared, observable [`GateState`].
///
/// Subscribers are only woken when a setter actually changes the state.
#[derive(Debug, Clone)]
pub struct SessionGate {
    tx: Arc<watch::Sender<GateState>>,
}

impl SessionGate {
    pub fn new(initial: GateState) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> GateState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<GateState> {
        self.tx.subscribe()
    }

    pub fn set_connected(&self, is_connected: bool) {
        let changed = self.tx.send_if_modified(|state| {
            let changed = state.is_connected != is_connected;
            state.is_connected = is_connected;
            changed
        });
        if changed {
            info!(is_connected, "connectivity changed");
        }
    }

    pub fn set_authenticated(&self, is_authenticated: bool) {
        let changed = self.tx.send_if_modified(|state| {
            let changed = state.is_authenticated != is_authenticated;
            state.is_authenticated = is_authenticated;
            changed
        });
        if changed {
            info!(is_authenticated, "session state changed");
        }
    }

    /// Drop the session after the remote refused its credentials.
    pub fn revoke_session(&self) {
        self.set_authenticated(false);
    }
}
