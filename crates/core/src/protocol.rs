// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! JSON frames exchanged on the sync channel.
//!
//! Every frame is an object tagged by `command`. The client only originates
//! pings; the server answers with responses and streams sync batches.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Payload of a ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingData {
    /// Sync cursor the client has processed up to.
    pub last_received_id: u64,
}

/// Frames sent from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Heartbeat; the server echoes `request_id` in its response.
    Ping { data: PingData, request_id: u64 },
}

impl ClientFrame {
    pub fn ping(request_id: u64, last_received_id: u64) -> Self {
        ClientFrame::Ping {
            data: PingData { last_received_id },
            request_id,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Payload of a sync batch notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncData {
    /// Server-assigned cursor of the batch.
    pub id: u64,
}

/// Payload of the session handshake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectData {
    pub run_id: String,
    #[serde(default)]
    pub vapid_key: String,
}

/// Frames sent from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Handshake acknowledgment carrying the session's resume tokens.
    Connect { data: ConnectData },
    /// A sync batch was delivered.
    Sync { data: SyncData },
    /// Explicit pong.
    Pong { request_id: u64 },
    /// Generic response to a request; a ping's response counts as its pong.
    Response { request_id: u64 },
    /// Anything this client does not interpret.
    #[serde(other)]
    Unknown,
}

impl ServerFrame {
    pub fn from_json(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| Error::InvalidFrame(e.to_string()))
    }

    /// Request id for frames that answer a request.
    pub fn request_id(&self) -> Option<u64> {
        match self {
            ServerFrame::Pong { request_id } | ServerFrame::Response { request_id } => {
                Some(*request_id)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
