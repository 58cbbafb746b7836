// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! synclink-core: lifecycle manager for a persistent sync channel
//!
//! This crate keeps a single WebSocket-style channel alive across flaky
//! networks: a connection state machine, an application heartbeat, a
//! reconnection scheduler that never gives up, a network change watcher
//! with flap suppression, and a failsafe watchdog. The dial itself is left
//! to the embedding connector.

pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod fake;
pub mod health;
pub mod heartbeat;
pub mod network;
pub mod protocol;
pub mod reconnect;
mod shared;
pub mod state;
pub mod timer;
pub mod watchdog;

#[cfg(test)]
mod test_helpers;

pub use clock::{ClockSource, ManualClock, MonotonicClock};
pub use config::LifecycleConfig;
pub use connection::{ConnectionManager, HealthSnapshot, LiveTimers};
pub use error::{Error, Result};
pub use fake::FakeNetworkObserver;
pub use health::{HealthMetrics, HealthUpdate};
pub use heartbeat::{HeartbeatMonitor, PingRecord};
pub use network::{
    NetworkCapabilities, NetworkChangeWatcher, NetworkDecision, NetworkEvent, NetworkEventSink,
    NetworkId, NetworkObserver, NetworkState, TransportType,
};
pub use protocol::{ClientFrame, ServerFrame};
pub use reconnect::{BackoffPolicy, ReconnectionScheduler, ReconnectionState};
pub use shared::ConnectionListener;
pub use state::{ChannelHandle, ConnectionState, ReconnectionParameters};
pub use watchdog::FailsafeWatchdog;
