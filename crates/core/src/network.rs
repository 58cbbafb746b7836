// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! OS network change handling.
//!
//! Connectivity notifications arrive on the observer's own context and are
//! forwarded through an unbounded channel to a single pump task, which
//! applies them under the state lock.
//!
//! # Classification
//!
//! | Event                                   | Outcome                                   |
//! |-----------------------------------------|-------------------------------------------|
//! | available, was offline, validated       | restore; forced reconnect                 |
//! | lost, nothing else reachable            | propagate offline                         |
//! | capabilities, was offline               | restore; reconnect                        |
//! | capabilities, new network identity      | switch; reconnect (no debounce)           |
//! | capabilities, new transport, same id    | debounced; rejections count as flaps      |
//! | capabilities lost internet/validation   | mark local flag down only                 |

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::Result;
use crate::health::HealthUpdate;
use crate::reconnect::{cancel_in, trigger_in};
use crate::shared::{CoreState, Effect, Shared};

/// Opaque identity of an OS network object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NetworkId(pub u64);

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "net#{}", self.0)
    }
}

/// Physical or virtual transport behind a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportType {
    #[default]
    None,
    Wifi,
    Cellular,
    Ethernet,
    Vpn,
    Other,
}

impl fmt::Display for TransportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransportType::None => "none",
            TransportType::Wifi => "wifi",
            TransportType::Cellular => "cellular",
            TransportType::Ethernet => "ethernet",
            TransportType::Vpn => "vpn",
            TransportType::Other => "other",
        };
        f.write_str(s)
    }
}

/// Capability snapshot of one network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NetworkCapabilities {
    pub has_internet: bool,
    /// The OS confirmed the internet capability actually works.
    pub is_validated: bool,
    pub transport: TransportType,
}

impl NetworkCapabilities {
    pub fn usable(&self) -> bool {
        self.has_internet && self.is_validated
    }
}

/// Connectivity notification from the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkEvent {
    Available(NetworkId),
    Lost(NetworkId),
    CapabilitiesChanged(NetworkId, NetworkCapabilities),
}

/// Where observers deliver their notifications.
pub type NetworkEventSink = mpsc::UnboundedSender<NetworkEvent>;

/// Source of OS connectivity information.
pub trait NetworkObserver: Send + Sync {
    /// Registers for notifications delivered to `sink`.
    fn start(&self, sink: NetworkEventSink) -> Result<()>;

    /// Unregisters. Further notifications are dropped.
    fn stop(&self);

    /// True if any network is currently usable.
    fn is_reachable(&self) -> bool;

    /// Current capabilities of `network`, if it still exists.
    fn capabilities(&self, network: NetworkId) -> Option<NetworkCapabilities>;
}

/// Watcher-local view of connectivity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkState {
    pub current_type: TransportType,
    pub is_connected: bool,
    /// When the last accepted transition happened.
    pub last_change_ms: u64,
    pub flap_count: u32,
    pub adaptive_debounce_ms: u64,
    pub last_active_network: Option<NetworkId>,
    /// Network seen as available with internet but not yet validated.
    pub awaiting_validation: Option<NetworkId>,
}

impl NetworkState {
    pub fn new(debounce_base_ms: u64) -> Self {
        NetworkState {
            current_type: TransportType::None,
            is_connected: false,
            last_change_ms: 0,
            flap_count: 0,
            adaptive_debounce_ms: debounce_base_ms,
            last_active_network: None,
            awaiting_validation: None,
        }
    }
}

/// How a capability change was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkDecision {
    /// Not usable and nothing to do.
    Ignored,
    /// Lost internet or validation; local flag lowered.
    Regressed,
    /// First sighting of a network; recorded without reconnecting.
    Adopted,
    /// Came back after being offline.
    Restored,
    /// A different network instance took over.
    Switched,
    /// Transport changed on the same network after the debounce window.
    TransportChanged,
    /// Transport changed inside the debounce window.
    Flapped,
    /// Nothing meaningful changed.
    Unchanged,
}

/// Handle that connects an observer to the lifecycle state.
#[derive(Clone)]
pub struct NetworkChangeWatcher {
    shared: Arc<Shared>,
}

impl NetworkChangeWatcher {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        NetworkChangeWatcher { shared }
    }

    /// Registers with the observer and starts the event pump.
    ///
    /// On registration failure the watcher stays inert until started again.
    pub fn start(&self) -> bool {
        let (tx, mut rx) = mpsc::unbounded_channel();
        if let Err(e) = self.shared.observer.start(tx) {
            tracing::warn!(error = %e, "network watcher inactive");
            return false;
        }

        let reachable = self.shared.is_reachable();
        let ticket = self.shared.with_state(|core, _| {
            core.network.is_connected = reachable;
            core.timers.network_pump.arm()
        });

        let watcher = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ticket.token.cancelled() => return,
                    event = rx.recv() => match event {
                        Some(event) => watcher.handle_event(event),
                        None => return,
                    },
                }
            }
        });
        tracing::info!(reachable, "network watcher started");
        true
    }

    /// Unregisters from the observer and stops the pump.
    pub fn stop(&self) {
        self.shared.with_state(|core, _| core.timers.network_pump.cancel());
        self.shared.observer.stop();
    }

    /// Applies one notification.
    pub fn handle_event(&self, event: NetworkEvent) {
        match event {
            NetworkEvent::Available(id) => self.on_available(id),
            NetworkEvent::Lost(id) => self.on_lost(id),
            NetworkEvent::CapabilitiesChanged(id, caps) => {
                self.on_capabilities_changed(id, caps);
            }
        }
    }

    pub fn on_available(&self, network: NetworkId) {
        let Some(caps) = self.shared.observer.capabilities(network) else {
            tracing::debug!(%network, "available network vanished before inspection");
            return;
        };
        let shared = &self.shared;
        shared.with_state(|core, effects| {
            if core.network.is_connected || !caps.has_internet {
                return;
            }
            accept(shared, core, network, caps.transport);
            tracing::info!(%network, transport = %caps.transport, validated = caps.is_validated, "network available");
            if caps.is_validated {
                effects.push(Effect::Offline(false));
                trigger_in(shared, core, "network restored", true);
            } else {
                core.network.awaiting_validation = Some(network);
            }
        });
    }

    pub fn on_lost(&self, network: NetworkId) {
        let shared = &self.shared;
        let reachable = shared.is_reachable();
        shared.with_state(|core, effects| {
            core.network.is_connected = false;
            if core.network.awaiting_validation == Some(network) {
                core.network.awaiting_validation = None;
            }
            if reachable {
                tracing::info!(%network, "network lost; another network is still reachable");
                return;
            }
            tracing::warn!(%network, "network lost; offline");
            core.timers.pong_timeout.cancel();
            core.heartbeat.outstanding = None;
            cancel_in(core);
            effects.push(Effect::Offline(true));
            effects.push(Effect::Health(HealthUpdate::disconnected()));
        });
    }

    pub fn on_capabilities_changed(
        &self,
        network: NetworkId,
        caps: NetworkCapabilities,
    ) -> NetworkDecision {
        let shared = &self.shared;
        let decision = shared.with_state(|core, effects| {
            let decision = classify(shared, core, network, caps);
            match decision {
                NetworkDecision::Restored => {
                    effects.push(Effect::Offline(false));
                    trigger_in(shared, core, "network restored", false);
                }
                NetworkDecision::Switched => {
                    trigger_in(shared, core, "network switched", false);
                }
                NetworkDecision::TransportChanged => {
                    trigger_in(shared, core, "network transport changed", false);
                }
                _ => {}
            }
            decision
        });
        tracing::debug!(%network, transport = %caps.transport, ?decision, "capabilities changed");
        decision
    }

    pub fn state(&self) -> NetworkState {
        self.shared.read(|core| core.network.clone())
    }
}

/// Decides what a capability change means and updates the bookkeeping.
fn classify(
    shared: &Shared,
    core: &mut CoreState,
    network: NetworkId,
    caps: NetworkCapabilities,
) -> NetworkDecision {
    let state = &mut core.network;

    if !caps.usable() {
        let is_active = state.last_active_network.is_none_or(|id| id == network);
        if state.is_connected && is_active {
            state.is_connected = false;
            return NetworkDecision::Regressed;
        }
        return NetworkDecision::Ignored;
    }

    let now = shared.now_ms();

    if !state.is_connected || state.awaiting_validation == Some(network) {
        accept(shared, core, network, caps.transport);
        return NetworkDecision::Restored;
    }

    let active_network = state.last_active_network;
    match active_network {
        None => {
            state.last_active_network = Some(network);
            state.current_type = caps.transport;
            state.last_change_ms = now;
            NetworkDecision::Adopted
        }
        Some(active) if active != network => {
            accept(shared, core, network, caps.transport);
            NetworkDecision::Switched
        }
        Some(_) if caps.transport != state.current_type => {
            let since = now.saturating_sub(state.last_change_ms);
            if since > state.adaptive_debounce_ms {
                accept(shared, core, network, caps.transport);
                NetworkDecision::TransportChanged
            } else {
                state.flap_count += 1;
                if state.flap_count >= shared.config.flap_threshold {
                    state.adaptive_debounce_ms = state
                        .adaptive_debounce_ms
                        .saturating_mul(2)
                        .min(shared.config.debounce_max_ms);
                }
                tracing::info!(
                    flap_count = state.flap_count,
                    debounce_ms = state.adaptive_debounce_ms,
                    "transport change inside debounce window"
                );
                NetworkDecision::Flapped
            }
        }
        Some(_) => NetworkDecision::Unchanged,
    }
}

/// Records an accepted transition and clears flap bookkeeping.
fn accept(shared: &Shared, core: &mut CoreState, network: NetworkId, transport: TransportType) {
    let state = &mut core.network;
    state.is_connected = true;
    state.current_type = transport;
    state.last_active_network = Some(network);
    state.last_change_ms = shared.now_ms();
    state.flap_count = 0;
    state.adaptive_debounce_ms = shared.config.debounce_base_ms;
    state.awaiting_validation = None;
}

#[cfg(test)]
#[path = "network_tests.rs"]
mod tests;
