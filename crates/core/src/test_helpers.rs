// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared doubles for lifecycle tests.

#![allow(clippy::unwrap_used)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::clock::MonotonicClock;
use crate::config::LifecycleConfig;
use crate::connection::ConnectionManager;
use crate::fake::FakeNetworkObserver;
use crate::health::HealthUpdate;
use crate::network::{NetworkCapabilities, NetworkId, TransportType};
use crate::shared::ConnectionListener;
use crate::state::ChannelHandle;

/// Records every outbound callback.
#[derive(Default)]
pub struct RecordingListener {
    pub reconnects: Mutex<Vec<String>>,
    pub offline: Mutex<Vec<bool>>,
    pub health: Mutex<Vec<HealthUpdate>>,
}

impl RecordingListener {
    pub fn reconnects(&self) -> Vec<String> {
        self.reconnects.lock().unwrap().clone()
    }

    pub fn offline(&self) -> Vec<bool> {
        self.offline.lock().unwrap().clone()
    }

    pub fn last_health(&self) -> Option<HealthUpdate> {
        self.health.lock().unwrap().last().copied()
    }
}

impl ConnectionListener for RecordingListener {
    fn reconnect(&self, reason: &str) {
        self.reconnects.lock().unwrap().push(reason.to_string());
    }

    fn set_offline(&self, offline: bool) {
        self.offline.lock().unwrap().push(offline);
    }

    fn health_changed(&self, update: &HealthUpdate) {
        self.health.lock().unwrap().push(*update);
    }
}

type CloseHook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct ChannelLog {
    sent: Mutex<Vec<String>>,
    closes: AtomicUsize,
    refuse: AtomicBool,
    on_close: Mutex<Option<CloseHook>>,
}

/// Channel double; clones share one log.
#[derive(Clone, Default)]
pub struct MockChannel {
    log: Arc<ChannelLog>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn boxed(&self) -> Box<dyn ChannelHandle> {
        Box::new(self.clone())
    }

    pub fn sent(&self) -> Vec<String> {
        self.log.sent.lock().unwrap().clone()
    }

    pub fn sent_json(&self) -> Vec<serde_json::Value> {
        self.sent()
            .iter()
            .map(|s| serde_json::from_str(s).unwrap())
            .collect()
    }

    pub fn close_count(&self) -> usize {
        self.log.closes.load(Ordering::SeqCst)
    }

    pub fn refuse_sends(&self, refuse: bool) {
        self.log.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Runs `hook` the first time the channel is closed.
    pub fn on_close(&self, hook: impl FnOnce() + Send + 'static) {
        *self.log.on_close.lock().unwrap() = Some(Box::new(hook));
    }
}

impl ChannelHandle for MockChannel {
    fn send(&self, frame: &str) -> bool {
        if self.log.refuse.load(Ordering::SeqCst) {
            return false;
        }
        self.log.sent.lock().unwrap().push(frame.to_string());
        true
    }

    fn close(&self) {
        self.log.closes.fetch_add(1, Ordering::SeqCst);
        let hook = self.log.on_close.lock().unwrap().take();
        if let Some(hook) = hook {
            hook();
        }
    }
}

/// A manager wired to doubles, on tokio's clock.
pub struct Harness {
    pub manager: ConnectionManager,
    pub observer: Arc<FakeNetworkObserver>,
    pub listener: Arc<RecordingListener>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(LifecycleConfig::default())
    }

    pub fn with_config(config: LifecycleConfig) -> Self {
        let observer = Arc::new(FakeNetworkObserver::new());
        let listener = Arc::new(RecordingListener::default());
        let manager = ConnectionManager::new(
            config,
            Arc::new(MonotonicClock::new()),
            observer.clone(),
            listener.clone(),
        )
        .unwrap();
        Harness {
            manager,
            observer,
            listener,
        }
    }

    /// Installs a channel and acknowledges a first sync with `cursor`.
    pub fn connect_synced(&self, cursor: u64) -> MockChannel {
        let channel = MockChannel::new();
        assert!(self.manager.set_connection(channel.boxed()));
        self.manager.update_last_received_sync_id(cursor);
        self.manager.update_last_sync_timestamp();
        channel
    }
}

pub fn caps(transport: TransportType) -> NetworkCapabilities {
    NetworkCapabilities {
        has_internet: true,
        is_validated: true,
        transport,
    }
}

pub fn unvalidated(transport: TransportType) -> NetworkCapabilities {
    NetworkCapabilities {
        has_internet: true,
        is_validated: false,
        transport,
    }
}

pub const WIFI: NetworkId = NetworkId(100);
pub const CELL: NetworkId = NetworkId(200);

/// Advances tokio's paused clock and lets woken tasks run.
pub async fn advance_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

/// Lets freshly spawned tasks register their timers.
pub async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}
