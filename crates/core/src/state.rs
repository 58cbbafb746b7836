// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection state, the owned channel handle, and resume tokens.

use std::fmt;

use serde::Serialize;

/// Lifecycle state of the sync channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No channel and nothing scheduled.
    #[default]
    Disconnected,
    /// A handle is being installed.
    Connecting,
    /// A handle is installed and usable.
    Connected,
    /// A reconnection is scheduled or a dial is in flight.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        };
        f.write_str(s)
    }
}

/// A live bidirectional message channel supplied by the connector.
///
/// Both methods must return promptly; they are called from lifecycle
/// operations that never block. `send` runs while the manager's state lock
/// is held and must not call back into the manager.
pub trait ChannelHandle: Send + Sync {
    /// Queues a text frame. Returns false if the channel refused it.
    fn send(&self, frame: &str) -> bool;

    /// Closes the channel. Called exactly once, before a replacement is installed.
    fn close(&self);
}

/// Resume tokens handed back to the connector on the next dial.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct ReconnectionParameters {
    pub run_id: String,
    /// Server sync cursor; 0 means no sync has completed yet.
    pub last_received_sync_id: u64,
    /// Opaque push-registration token.
    pub vapid_key: String,
}

/// The single owned connection plus its resume tokens.
#[derive(Default)]
pub(crate) struct ConnectionSession {
    pub(crate) handle: Option<Box<dyn ChannelHandle>>,
    pub(crate) params: ReconnectionParameters,
}

impl ConnectionSession {
    pub(crate) fn has_handle(&self) -> bool {
        self.handle.is_some()
    }

    /// Sends on the installed handle, if any.
    pub(crate) fn send(&self, frame: &str) -> bool {
        self.handle.as_ref().is_some_and(|h| h.send(frame))
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
