// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The lifecycle manager facade.
//!
//! [`ConnectionManager`] owns the shared state and hands out the component
//! handles. The connector talks to it: it installs handles after a dial,
//! reports failures, feeds sync progress and pongs, and reads resume tokens
//! back when the manager asks it to reconnect.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::clock::{ClockSource, MonotonicClock};
use crate::config::LifecycleConfig;
use crate::error::Result;
use crate::health::{HealthMetrics, HealthUpdate};
use crate::heartbeat::{self, HeartbeatMonitor};
use crate::network::{NetworkChangeWatcher, NetworkObserver, NetworkState};
use crate::reconnect::{cancel_in, trigger_in, ReconnectionScheduler, ReconnectionState};
use crate::shared::{ConnectionListener, CoreState, Effect, Shared};
use crate::state::{ChannelHandle, ConnectionState, ReconnectionParameters};
use crate::watchdog::FailsafeWatchdog;

/// Which timer classes currently have a live task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LiveTimers {
    pub heartbeat: bool,
    pub pong_timeout: bool,
    pub reconnect: bool,
    pub failsafe: bool,
    pub network_pump: bool,
}

/// Everything a status display or debug dump might want.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthSnapshot {
    pub state: ConnectionState,
    pub connected: bool,
    pub lag_ms: Option<u64>,
    pub last_sync_age_ms: Option<u64>,
    pub adaptive_timeout_ms: u64,
    pub metrics: HealthMetrics,
    pub reconnection: ReconnectionState,
    pub network: NetworkState,
    pub timers: LiveTimers,
}

/// Keeps one sync channel alive.
#[derive(Clone)]
pub struct ConnectionManager {
    shared: Arc<Shared>,
}

impl ConnectionManager {
    pub fn new(
        config: LifecycleConfig,
        clock: Arc<dyn ClockSource>,
        observer: Arc<dyn NetworkObserver>,
        listener: Arc<dyn ConnectionListener>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(ConnectionManager {
            shared: Arc::new(Shared::new(config, clock, observer, listener)),
        })
    }

    /// Like [`ConnectionManager::new`] with a [`MonotonicClock`].
    pub fn with_monotonic_clock(
        config: LifecycleConfig,
        observer: Arc<dyn NetworkObserver>,
        listener: Arc<dyn ConnectionListener>,
    ) -> Result<Self> {
        Self::new(config, Arc::new(MonotonicClock::new()), observer, listener)
    }

    pub fn config(&self) -> &LifecycleConfig {
        &self.shared.config
    }

    pub fn heartbeat(&self) -> HeartbeatMonitor {
        HeartbeatMonitor::new(Arc::clone(&self.shared))
    }

    pub fn scheduler(&self) -> ReconnectionScheduler {
        ReconnectionScheduler::new(Arc::clone(&self.shared))
    }

    pub fn network(&self) -> NetworkChangeWatcher {
        NetworkChangeWatcher::new(Arc::clone(&self.shared))
    }

    pub fn watchdog(&self) -> FailsafeWatchdog {
        FailsafeWatchdog::new(Arc::clone(&self.shared))
    }

    /// Starts the network watcher and the failsafe watchdog.
    ///
    /// Returns false if the observer refused registration; the watchdog runs
    /// either way.
    pub fn start(&self) -> bool {
        let watching = self.network().start();
        self.watchdog().start();
        watching
    }

    /// Cancels every timer, closes the channel, and unregisters from the
    /// observer.
    pub fn shutdown(&self) {
        self.shared.with_state(|core, effects| {
            let timers = &mut core.timers;
            timers.heartbeat.cancel();
            timers.pong_timeout.cancel();
            timers.reconnect.cancel();
            timers.failsafe.cancel();
            timers.network_pump.cancel();
            core.heartbeat.outstanding = None;
            core.reconnect.is_reconnecting = false;
            if let Some(handle) = core.session.handle.take() {
                effects.push(Effect::Close(handle));
            }
            core.connection = ConnectionState::Disconnected;
        });
        self.shared.observer.stop();
        tracing::info!("connection manager shut down");
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.read(|core| core.connection)
    }

    /// Connected with a live handle.
    pub fn is_connected(&self) -> bool {
        self.shared.read(CoreState::is_live)
    }

    /// Installs a freshly dialed channel.
    ///
    /// Ignored while another installation is in progress; the rejected
    /// handle is closed. An existing handle is closed before the new one
    /// is installed. The heartbeat does not start until the first sync
    /// acknowledgment.
    pub fn set_connection(&self, handle: Box<dyn ChannelHandle>) -> bool {
        let shared = &self.shared;
        let admitted = shared.with_state(|core, effects| {
            if core.connection == ConnectionState::Connecting {
                tracing::info!("set_connection ignored: already connecting");
                effects.push(Effect::Close(handle));
                return None;
            }
            core.connection = ConnectionState::Connecting;
            heartbeat::stop_in(core);
            if let Some(old) = core.session.handle.take() {
                tracing::debug!("closing previous channel");
                effects.push(Effect::Close(old));
            }
            Some(handle)
        });
        let Some(handle) = admitted else {
            return false;
        };

        shared.with_state(|core, effects| {
            if core.connection != ConnectionState::Connecting {
                tracing::info!(state = %core.connection, "connection cleared during installation");
                effects.push(Effect::Close(handle));
                return false;
            }
            core.session.handle = Some(handle);
            core.connection = ConnectionState::Connected;
            core.network.is_connected = true;
            core.heartbeat.last_pong_ms = Some(shared.now_ms());
            core.heartbeat.ping_loop_started = false;
            tracing::info!("channel connected");
            effects.push(Effect::Health(shared.health_update(core)));
            true
        })
    }

    /// Drops the channel and all per-connection state.
    pub fn clear_connection(&self) {
        self.shared.with_state(|core, effects| clear_in(core, effects));
        tracing::info!("channel cleared");
    }

    /// The connector's dial, handshake, or socket failed.
    ///
    /// Clears the connection and requests a reconnection.
    pub fn connection_failed(&self, reason: &str) {
        let shared = &self.shared;
        let scheduled = shared.with_state(|core, effects| {
            clear_in(core, effects);
            trigger_in(shared, core, reason, false)
        });
        if !scheduled {
            tracing::info!(reason, "connection failed; recovery left to the failsafe watchdog");
        }
    }

    /// Stores the resume tokens from a completed handshake.
    pub fn set_reconnection_state(&self, run_id: &str, last_received_sync_id: u64, vapid_key: &str) {
        self.shared.with_state(|core, _| {
            core.session.params = ReconnectionParameters {
                run_id: run_id.to_string(),
                last_received_sync_id,
                vapid_key: vapid_key.to_string(),
            };
        });
    }

    pub fn clear_reconnection_state(&self) {
        self.shared
            .with_state(|core, _| core.session.params = ReconnectionParameters::default());
    }

    pub fn reconnection_parameters(&self) -> ReconnectionParameters {
        self.shared.read(|core| core.session.params.clone())
    }

    /// Marks the connection verified after a successful handshake.
    pub fn reset_reconnection_state(&self) {
        self.scheduler().reset_reconnection_state();
    }

    pub fn trigger_reconnection(&self, reason: &str) -> bool {
        self.scheduler().trigger(reason)
    }

    pub fn force_reconnection(&self, reason: &str) -> bool {
        self.scheduler().force_trigger(reason)
    }

    pub fn cancel_reconnection(&self) {
        self.scheduler().cancel_reconnection();
    }

    /// Advances the resume cursor.
    pub fn update_last_received_sync_id(&self, id: u64) {
        self.shared
            .with_state(|core, _| core.session.params.last_received_sync_id = id);
    }

    /// Records a completed sync batch.
    ///
    /// The first acknowledgment on a connection starts the heartbeat.
    pub fn update_last_sync_timestamp(&self) {
        let shared = &self.shared;
        shared.with_state(|core, effects| {
            core.heartbeat.last_sync_ms = Some(shared.now_ms());
            if core.health.consecutive_timeouts > 0 {
                core.health.on_recovered_stable();
            }
            if !core.heartbeat.ping_loop_started && core.connection == ConnectionState::Connected {
                core.heartbeat.ping_loop_started = true;
                heartbeat::start_in(shared, core);
            }
            effects.push(Effect::Health(shared.health_update(core)));
        });
    }

    pub fn on_pong(&self, request_id: u64) -> bool {
        self.heartbeat().on_pong(request_id)
    }

    pub fn pending_ping_id(&self) -> Option<u64> {
        self.heartbeat().pending_request_id()
    }

    /// True if `request_id` answers the outstanding ping.
    pub fn is_ping_response(&self, request_id: u64) -> bool {
        self.pending_ping_id() == Some(request_id)
    }

    pub fn health(&self) -> HealthUpdate {
        self.shared.read(|core| self.shared.health_update(core))
    }

    pub fn health_snapshot(&self) -> HealthSnapshot {
        self.shared.read(|core| {
            let update = self.shared.health_update(core);
            HealthSnapshot {
                state: core.connection,
                connected: update.connected,
                lag_ms: update.lag_ms,
                last_sync_age_ms: update.last_sync_age_ms,
                adaptive_timeout_ms: core.health.adaptive_timeout_ms(),
                metrics: core.health.clone(),
                reconnection: core.reconnect,
                network: core.network.clone(),
                timers: live_timers(core),
            }
        })
    }

    /// Health-weighted timeout for request/response operations.
    pub fn adaptive_timeout(&self) -> Duration {
        Duration::from_millis(self.shared.read(|core| core.health.adaptive_timeout_ms()))
    }

    pub fn live_timers(&self) -> LiveTimers {
        self.shared.read(live_timers)
    }
}

fn live_timers(core: &CoreState) -> LiveTimers {
    LiveTimers {
        heartbeat: core.timers.heartbeat.is_live(),
        pong_timeout: core.timers.pong_timeout.is_live(),
        reconnect: core.timers.reconnect.is_live(),
        failsafe: core.timers.failsafe.is_live(),
        network_pump: core.timers.network_pump.is_live(),
    }
}

fn clear_in(core: &mut CoreState, effects: &mut Vec<Effect>) {
    if let Some(handle) = core.session.handle.take() {
        effects.push(Effect::Close(handle));
    }
    heartbeat::stop_in(core);
    core.heartbeat.last_known_lag_ms = None;
    core.heartbeat.ping_loop_started = false;
    cancel_in(core);
    core.connection = ConnectionState::Disconnected;
    effects.push(Effect::Health(HealthUpdate::disconnected()));
}

#[cfg(test)]
#[path = "connection_tests.rs"]
mod tests;
