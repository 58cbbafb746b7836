// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Scriptable [`NetworkObserver`] for deterministic tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::error::{Error, Result};
use crate::network::{
    NetworkCapabilities, NetworkEvent, NetworkEventSink, NetworkId, NetworkObserver,
};

/// Observer whose connectivity is set by the test.
#[derive(Debug, Default)]
pub struct FakeNetworkObserver {
    sink: Mutex<Option<NetworkEventSink>>,
    networks: Mutex<HashMap<NetworkId, NetworkCapabilities>>,
    reachable: AtomicBool,
    fail_start: AtomicBool,
}

impl FakeNetworkObserver {
    /// A reachable observer with no networks registered.
    pub fn new() -> Self {
        let fake = FakeNetworkObserver::default();
        fake.reachable.store(true, Ordering::SeqCst);
        fake
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Makes the next `start` fail with a registration error.
    pub fn fail_next_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    /// Registers or updates the capabilities reported for `network`.
    pub fn set_capabilities(&self, network: NetworkId, caps: NetworkCapabilities) {
        lock(&self.networks).insert(network, caps);
    }

    pub fn remove(&self, network: NetworkId) {
        lock(&self.networks).remove(&network);
    }

    /// Delivers `event` to the registered sink. Returns false if not started.
    pub fn emit(&self, event: NetworkEvent) -> bool {
        match lock(&self.sink).as_ref() {
            Some(sink) => sink.send(event).is_ok(),
            None => false,
        }
    }

    pub fn is_started(&self) -> bool {
        lock(&self.sink).is_some()
    }
}

impl NetworkObserver for FakeNetworkObserver {
    fn start(&self, sink: NetworkEventSink) -> Result<()> {
        if self.fail_start.swap(false, Ordering::SeqCst) {
            return Err(Error::ObserverRegistration("fake registration refused".into()));
        }
        *lock(&self.sink) = Some(sink);
        Ok(())
    }

    fn stop(&self) {
        lock(&self.sink).take();
    }

    fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    fn capabilities(&self, network: NetworkId) -> Option<NetworkCapabilities> {
        lock(&self.networks).get(&network).copied()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
