// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Application-level heartbeat.
//!
//! Pings carry the sync cursor, so the loop only starts after the first sync
//! acknowledgment on a connection and skips ticks while the cursor is 0.
//! Exactly one ping is outstanding at a time; a newer ping supersedes the
//! previous request id and its pong timeout.

use std::sync::Arc;

use crate::error::Error;
use crate::protocol::ClientFrame;
use crate::reconnect::trigger_in;
use crate::shared::{CoreState, Effect, Shared};
use crate::state::ConnectionState;
use crate::timer::{spawn_interval, spawn_oneshot};

/// The ping awaiting a pong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingRecord {
    pub request_id: u64,
    pub sent_at_ms: u64,
}

/// Per-connection heartbeat bookkeeping.
#[derive(Debug, Default)]
pub(crate) struct HeartbeatState {
    /// Last allocated request id; never reused.
    pub(crate) last_request_id: u64,
    pub(crate) outstanding: Option<PingRecord>,
    pub(crate) ping_loop_started: bool,
    pub(crate) last_known_lag_ms: Option<u64>,
    /// Baseline for pong freshness; set on connect and on every pong.
    pub(crate) last_pong_ms: Option<u64>,
    pub(crate) last_sync_ms: Option<u64>,
}

/// Handle for driving the ping/pong protocol.
#[derive(Clone)]
pub struct HeartbeatMonitor {
    shared: Arc<Shared>,
}

impl HeartbeatMonitor {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        HeartbeatMonitor { shared }
    }

    /// (Re)starts the heartbeat loop.
    pub fn start(&self) {
        let shared = &self.shared;
        shared.with_state(|core, _| start_in(shared, core));
    }

    /// Stops the loop and forgets the outstanding ping.
    pub fn stop(&self) {
        self.shared.with_state(|core, _| stop_in(core));
    }

    /// Sends a ping now if the channel is eligible.
    ///
    /// Returns the request id of the ping that went out.
    pub fn send_ping(&self) -> Option<u64> {
        let shared = &self.shared;
        shared.with_state(|core, _| send_ping_in(shared, core))
    }

    /// Handles a pong. Returns false if `request_id` is not the outstanding ping.
    pub fn on_pong(&self, request_id: u64) -> bool {
        let shared = &self.shared;
        shared.with_state(|core, effects| {
            let record = match core.heartbeat.outstanding {
                Some(record) if record.request_id == request_id => record,
                _ => {
                    tracing::debug!(request_id, "ignoring stale pong");
                    return false;
                }
            };

            core.timers.pong_timeout.cancel();
            core.heartbeat.outstanding = None;

            let now = shared.now_ms();
            let lag = now.saturating_sub(record.sent_at_ms);
            core.health.on_pong(lag);
            core.health.consecutive_timeouts = 0;
            core.health.consecutive_ping_timeouts = 0;
            core.heartbeat.last_known_lag_ms = Some(lag);
            core.heartbeat.last_pong_ms = Some(now);

            tracing::debug!(request_id, lag_ms = lag, "pong");
            effects.push(Effect::Health(shared.health_update(core)));
            true
        })
    }

    /// Request id of the ping awaiting a pong, for demultiplexing responses.
    pub fn pending_request_id(&self) -> Option<u64> {
        self.shared
            .read(|core| core.heartbeat.outstanding.map(|r| r.request_id))
    }

    pub fn is_running(&self) -> bool {
        self.shared.read(|core| core.timers.heartbeat.is_live())
    }

    fn tick(&self, generation: u64) {
        let shared = &self.shared;
        shared.with_state(|core, _| {
            if core.timers.heartbeat.is_current(generation) {
                send_ping_in(shared, core);
            }
        });
    }

    fn on_pong_timeout(&self, generation: u64, request_id: u64) {
        let shared = &self.shared;
        shared.with_state(|core, _| {
            if !core.timers.pong_timeout.complete(generation) {
                return;
            }
            if core.connection != ConnectionState::Connected || !shared.is_reachable() {
                tracing::debug!(request_id, "pong timeout after connection loss; not counted");
                core.heartbeat.outstanding = None;
                return;
            }

            core.heartbeat.outstanding = None;
            core.health.consecutive_timeouts += 1;
            core.health.consecutive_ping_timeouts += 1;
            core.health.on_timeout();
            let consecutive = core.health.consecutive_ping_timeouts;
            tracing::warn!(request_id, consecutive, "pong timeout");

            if core.is_live() {
                trigger_in(
                    shared,
                    core,
                    &format!("ping timeout; consecutive={consecutive}"),
                    false,
                );
            }
        });
    }
}

pub(crate) fn start_in(shared: &Arc<Shared>, core: &mut CoreState) {
    let monitor = HeartbeatMonitor::new(Arc::clone(shared));
    let period = shared.config.heartbeat_interval();
    spawn_interval(core.timers.heartbeat.arm(), period, move |generation| {
        monitor.tick(generation);
    });
    tracing::debug!(interval_ms = shared.config.heartbeat_interval_ms, "heartbeat started");
}

pub(crate) fn stop_in(core: &mut CoreState) {
    core.timers.heartbeat.cancel();
    core.timers.pong_timeout.cancel();
    core.heartbeat.outstanding = None;
}

pub(crate) fn send_ping_in(shared: &Arc<Shared>, core: &mut CoreState) -> Option<u64> {
    if core.connection != ConnectionState::Connected {
        tracing::debug!(state = %core.connection, "heartbeat skipped: not connected");
        return None;
    }
    if !shared.is_reachable() {
        tracing::debug!("heartbeat skipped: network unreachable");
        return None;
    }
    let cursor = core.session.params.last_received_sync_id;
    if cursor == 0 {
        tracing::debug!("heartbeat skipped: no sync cursor yet");
        return None;
    }

    let request_id = core.heartbeat.last_request_id + 1;
    core.heartbeat.last_request_id = request_id;

    let frame = match ClientFrame::ping(request_id, cursor).to_json() {
        Ok(frame) => frame,
        Err(e) => {
            tracing::warn!(error = %e, "failed to encode ping");
            return None;
        }
    };

    if !core.session.send(&frame) {
        tracing::warn!(request_id, error = %Error::SendFailure, "ping not sent");
        return None;
    }

    core.heartbeat.outstanding = Some(PingRecord {
        request_id,
        sent_at_ms: shared.now_ms(),
    });

    let monitor = HeartbeatMonitor::new(Arc::clone(shared));
    spawn_oneshot(
        core.timers.pong_timeout.arm(),
        shared.config.pong_timeout(),
        move |generation| monitor.on_pong_timeout(generation, request_id),
    );
    tracing::debug!(request_id, cursor, "ping sent");
    Some(request_id)
}

#[cfg(test)]
#[path = "heartbeat_tests.rs"]
mod tests;
