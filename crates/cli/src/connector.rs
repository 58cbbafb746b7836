// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket connector.
//!
//! The lifecycle manager decides *when* to dial; this module does the
//! dialing. Reconnect requests from the manager arrive on a channel and are
//! served one at a time by [`Connector::run`]; requests that queue up while
//! a dial is in flight are answered by that dial. Each successful dial
//! installs a [`WsChannel`] and only then starts reading from the socket.

use futures_util::{SinkExt, StreamExt};
use synclink_core::{
    ChannelHandle, ConnectionListener, ConnectionManager, HealthUpdate, ReconnectionParameters,
    ServerFrame,
};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, Result};

/// Builds the dial URL, carrying resume parameters when a session exists.
pub fn dial_url(base: &str, params: &ReconnectionParameters) -> String {
    if params.run_id.is_empty() {
        return base.to_string();
    }
    let separator = if base.contains('?') { '&' } else { '?' };
    format!(
        "{base}{separator}run_id={}&last_received_id={}",
        encode_query_value(&params.run_id),
        params.last_received_sync_id
    )
}

/// Percent-encodes everything outside the RFC 3986 unreserved set.
fn encode_query_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for byte in value.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            out.push(char::from(byte));
        } else {
            out.push_str(&format!("%{byte:02X}"));
        }
    }
    out
}

/// Applies one inbound text frame to the manager.
pub fn handle_frame(manager: &ConnectionManager, text: &str) -> Result<()> {
    let frame = ServerFrame::from_json(text)?;
    if let Some(request_id) = frame.request_id() {
        if manager.is_ping_response(request_id) {
            manager.on_pong(request_id);
        }
        return Ok(());
    }
    match frame {
        ServerFrame::Connect { data } => {
            let cursor = manager.reconnection_parameters().last_received_sync_id;
            manager.set_reconnection_state(&data.run_id, cursor, &data.vapid_key);
            manager.reset_reconnection_state();
            tracing::info!(run_id = %data.run_id, "session established");
        }
        ServerFrame::Sync { data } => {
            manager.update_last_received_sync_id(data.id);
            manager.update_last_sync_timestamp();
        }
        ServerFrame::Pong { .. } | ServerFrame::Response { .. } => {}
        ServerFrame::Unknown => tracing::trace!("ignoring unrecognized frame"),
    }
    Ok(())
}

enum Outbound {
    Text(String),
    Close,
}

/// Handle for one live socket.
pub struct WsChannel {
    outbound: mpsc::UnboundedSender<Outbound>,
    closed: CancellationToken,
}

impl ChannelHandle for WsChannel {
    fn send(&self, frame: &str) -> bool {
        !self.closed.is_cancelled() && self.outbound.send(Outbound::Text(frame.to_string())).is_ok()
    }

    fn close(&self) {
        self.closed.cancel();
        let _ = self.outbound.send(Outbound::Close);
    }
}

/// Listener half: forwards manager callbacks to the dial loop.
pub struct DialRequests {
    requests: mpsc::UnboundedSender<String>,
}

impl DialRequests {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (requests, rx) = mpsc::unbounded_channel();
        (DialRequests { requests }, rx)
    }

    /// Queues a dial that did not come from the manager.
    pub fn request(&self, reason: &str) {
        let _ = self.requests.send(reason.to_string());
    }
}

impl ConnectionListener for DialRequests {
    fn reconnect(&self, reason: &str) {
        tracing::info!(reason, "reconnect requested");
        self.request(reason);
    }

    fn set_offline(&self, offline: bool) {
        if offline {
            tracing::warn!("network offline");
        } else {
            tracing::info!("network back online");
        }
    }

    fn health_changed(&self, update: &HealthUpdate) {
        tracing::debug!(
            connected = update.connected,
            lag_ms = ?update.lag_ms,
            last_sync_age_ms = ?update.last_sync_age_ms,
            "health"
        );
    }
}

/// Serves dial requests for one manager.
pub struct Connector {
    base_url: String,
    manager: ConnectionManager,
}

impl Connector {
    pub fn new(base_url: &str, manager: ConnectionManager) -> Self {
        Connector {
            base_url: base_url.to_string(),
            manager,
        }
    }

    /// Dials once per request until `shutdown` is cancelled.
    pub async fn run(self, mut requests: mpsc::UnboundedReceiver<String>, shutdown: CancellationToken) {
        loop {
            let reason = tokio::select! {
                _ = shutdown.cancelled() => return,
                reason = requests.recv() => match reason {
                    Some(reason) => reason,
                    None => return,
                },
            };
            tracing::debug!(reason = %reason, "dialing");
            let result = self.dial().await;
            let mut coalesced = 0;
            while requests.try_recv().is_ok() {
                coalesced += 1;
            }
            if coalesced > 0 {
                tracing::debug!(coalesced, "dropped requests queued during dial");
            }
            if let Err(e) = result {
                tracing::warn!(error = %e, "dial failed");
                self.manager.connection_failed(&e.to_string());
            }
        }
    }

    async fn dial(&self) -> Result<()> {
        let url = dial_url(&self.base_url, &self.manager.reconnection_parameters());
        let timeout = self.manager.adaptive_timeout();
        let handshake = tokio_tungstenite::connect_async(url.as_str());
        let (stream, _) = tokio::time::timeout(timeout, handshake)
            .await
            .map_err(|_| {
                Error::Connect(format!("handshake timed out after {}ms", timeout.as_millis()))
            })?
            .map_err(|e| Error::Connect(e.to_string()))?;
        tracing::info!(url = %url, "socket open");

        let (mut sink, mut source) = stream.split();
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel();
        let closed = CancellationToken::new();

        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                match message {
                    Outbound::Text(text) => {
                        if let Err(e) = sink.send(Message::Text(text.into())).await {
                            tracing::debug!(error = %e, "socket write failed");
                            return;
                        }
                    }
                    Outbound::Close => {
                        let _ = sink.close().await;
                        return;
                    }
                }
            }
        });

        // Inbound frames may arrive right after the handshake; they must see
        // the installed handle.
        let channel = WsChannel {
            outbound,
            closed: closed.clone(),
        };
        if !self.manager.set_connection(Box::new(channel)) {
            tracing::info!(url = %url, "socket not installed");
            return Ok(());
        }

        let manager = self.manager.clone();
        let reader_closed = closed;
        tokio::spawn(async move {
            let reason = loop {
                let next = tokio::select! {
                    _ = reader_closed.cancelled() => return,
                    next = source.next() => next,
                };
                match next {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_frame(&manager, text.as_str()) {
                            tracing::warn!(error = %e, "dropping frame");
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break "socket closed by server".to_string(),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => break format!("socket error: {e}"),
                }
            };
            if !reader_closed.is_cancelled() {
                manager.connection_failed(&reason);
            }
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "connector_tests.rs"]
mod tests;
