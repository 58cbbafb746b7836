// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic audit that recovers from missed or raced callbacks.

use std::sync::Arc;

use crate::reconnect::trigger_in;
use crate::shared::Shared;
use crate::timer::spawn_interval;

const FAILSAFE_REASON: &str = "failsafe: stuck disconnected with network available";

/// Forces a reconnection when the network is up but nothing is connected
/// or scheduled.
#[derive(Clone)]
pub struct FailsafeWatchdog {
    shared: Arc<Shared>,
}

impl FailsafeWatchdog {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        FailsafeWatchdog { shared }
    }

    /// (Re)starts the periodic audit.
    pub fn start(&self) {
        let watchdog = self.clone();
        let period = self.shared.config.watchdog_interval();
        self.shared.with_state(|core, _| {
            spawn_interval(core.timers.failsafe.arm(), period, move |generation| {
                watchdog.audit(generation);
            });
        });
        tracing::debug!(interval_ms = self.shared.config.watchdog_interval_ms, "failsafe watchdog started");
    }

    pub fn stop(&self) {
        self.shared.with_state(|core, _| core.timers.failsafe.cancel());
    }

    pub fn is_running(&self) -> bool {
        self.shared.read(|core| core.timers.failsafe.is_live())
    }

    /// Runs one audit immediately. Returns true if a reconnection was forced.
    pub fn audit_now(&self) -> bool {
        let shared = &self.shared;
        let reachable = shared.is_reachable();
        shared.with_state(|core, _| {
            if !reachable || core.is_live() || core.reconnect.is_reconnecting {
                return false;
            }
            tracing::warn!(state = %core.connection, "failsafe audit found a stuck connection");
            trigger_in(shared, core, FAILSAFE_REASON, true)
        })
    }

    fn audit(&self, generation: u64) {
        let current = self
            .shared
            .read(|core| core.timers.failsafe.is_current(generation));
        if current {
            self.audit_now();
        }
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
