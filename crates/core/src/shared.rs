// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! The single serialization point for lifecycle state.
//!
//! Every component handle ([`ConnectionManager`](crate::ConnectionManager),
//! [`HeartbeatMonitor`](crate::HeartbeatMonitor), ...) wraps the same
//! `Arc<Shared>`. Mutations happen inside [`Shared::with_state`]; callbacks
//! that leave the crate are queued as [`Effect`]s and dispatched after the
//! lock is released, so listeners may call straight back into the manager.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::clock::ClockSource;
use crate::config::LifecycleConfig;
use crate::health::{HealthMetrics, HealthUpdate};
use crate::heartbeat::HeartbeatState;
use crate::network::{NetworkObserver, NetworkState};
use crate::reconnect::{BackoffPolicy, ReconnectionState};
use crate::state::{ChannelHandle, ConnectionSession, ConnectionState};
use crate::timer::TimerSlot;

/// Outbound callbacks implemented by the embedding application.
pub trait ConnectionListener: Send + Sync {
    /// Dial the server again. On success the connector calls
    /// [`ConnectionManager::set_connection`](crate::ConnectionManager::set_connection).
    fn reconnect(&self, reason: &str);

    /// Enter or leave offline mode.
    fn set_offline(&self, _offline: bool) {}

    /// Health telemetry for the presentation layer.
    fn health_changed(&self, _update: &HealthUpdate) {}
}

/// Side effects produced under the lock and run after it is released.
pub(crate) enum Effect {
    Health(HealthUpdate),
    Offline(bool),
    Reconnect(String),
    Close(Box<dyn ChannelHandle>),
}

/// One slot per timer class.
#[derive(Debug, Default)]
pub(crate) struct Timers {
    pub(crate) heartbeat: TimerSlot,
    pub(crate) pong_timeout: TimerSlot,
    pub(crate) reconnect: TimerSlot,
    pub(crate) failsafe: TimerSlot,
    pub(crate) network_pump: TimerSlot,
}

/// All mutable lifecycle state.
pub(crate) struct CoreState {
    pub(crate) connection: ConnectionState,
    pub(crate) session: ConnectionSession,
    pub(crate) heartbeat: HeartbeatState,
    pub(crate) reconnect: ReconnectionState,
    pub(crate) network: NetworkState,
    pub(crate) health: HealthMetrics,
    pub(crate) timers: Timers,
}

impl CoreState {
    pub(crate) fn new(config: &LifecycleConfig) -> Self {
        CoreState {
            connection: ConnectionState::Disconnected,
            session: ConnectionSession::default(),
            heartbeat: HeartbeatState::default(),
            reconnect: ReconnectionState::default(),
            network: NetworkState::new(config.debounce_base_ms),
            health: HealthMetrics::default(),
            timers: Timers::default(),
        }
    }

    /// Connected with a live handle.
    pub(crate) fn is_live(&self) -> bool {
        self.connection == ConnectionState::Connected && self.session.has_handle()
    }
}

pub(crate) struct Shared {
    state: Mutex<CoreState>,
    pub(crate) config: LifecycleConfig,
    pub(crate) backoff: BackoffPolicy,
    pub(crate) clock: Arc<dyn ClockSource>,
    pub(crate) observer: Arc<dyn NetworkObserver>,
    pub(crate) listener: Arc<dyn ConnectionListener>,
}

impl Shared {
    pub(crate) fn new(
        config: LifecycleConfig,
        clock: Arc<dyn ClockSource>,
        observer: Arc<dyn NetworkObserver>,
        listener: Arc<dyn ConnectionListener>,
    ) -> Self {
        Shared {
            state: Mutex::new(CoreState::new(&config)),
            backoff: BackoffPolicy::from_config(&config),
            config,
            clock,
            observer,
            listener,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CoreState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub(crate) fn is_reachable(&self) -> bool {
        self.observer.is_reachable()
    }

    /// Runs `f` under the state lock, then dispatches the effects it queued.
    pub(crate) fn with_state<R>(&self, f: impl FnOnce(&mut CoreState, &mut Vec<Effect>) -> R) -> R {
        let mut effects = Vec::new();
        let result = {
            let mut core = self.lock();
            f(&mut core, &mut effects)
        };
        self.dispatch(effects);
        result
    }

    /// Read-only access to the state.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&CoreState) -> R) -> R {
        let core = self.lock();
        f(&core)
    }

    /// Telemetry for the current state.
    pub(crate) fn health_update(&self, core: &CoreState) -> HealthUpdate {
        if !core.is_live() {
            return HealthUpdate::disconnected();
        }
        let now = self.now_ms();
        HealthUpdate {
            connected: true,
            lag_ms: core.heartbeat.last_known_lag_ms,
            last_sync_age_ms: core
                .heartbeat
                .last_sync_ms
                .map(|t| now.saturating_sub(t)),
        }
    }

    fn dispatch(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Health(update) => self.listener.health_changed(&update),
                Effect::Offline(offline) => self.listener.set_offline(offline),
                Effect::Reconnect(reason) => self.listener.reconnect(&reason),
                Effect::Close(handle) => handle.close(),
            }
        }
    }
}
