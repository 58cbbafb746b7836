// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Reconnection scheduling with exponential backoff.
//!
//! The scheduler never gives up: when the attempt counter reaches the cap it
//! wraps to zero and the delays start over from the base. Requests closer
//! together than the minimum spacing are dropped outright.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::config::LifecycleConfig;
use crate::shared::{CoreState, Effect, Shared};
use crate::state::ConnectionState;
use crate::timer::spawn_oneshot;

/// Exponential backoff parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    attempt_cap: u32,
    min_spacing_ms: u64,
}

impl BackoffPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, attempt_cap: u32, min_spacing_ms: u64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            attempt_cap,
            min_spacing_ms,
        }
    }

    pub fn from_config(config: &LifecycleConfig) -> Self {
        Self::new(
            config.reconnect_base_delay_ms,
            config.reconnect_max_delay_ms,
            config.reconnect_attempt_cap,
            config.reconnect_min_spacing_ms,
        )
    }

    /// `min(base * 2^attempt, max)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20);
        let multiplier = 1_u64 << shift;
        let calculated = self.base_delay_ms.saturating_mul(multiplier);
        Duration::from_millis(calculated.min(self.max_delay_ms))
    }

    pub fn attempt_cap(&self) -> u32 {
        self.attempt_cap
    }

    pub fn min_spacing_ms(&self) -> u64 {
        self.min_spacing_ms
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::from_config(&LifecycleConfig::default())
    }
}

/// Bookkeeping for scheduled reconnections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconnectionState {
    /// Attempts since the last verified connection; wraps at the cap.
    pub attempts: u32,
    /// A reconnection timer is pending.
    pub is_reconnecting: bool,
    /// When the last reconnection was scheduled.
    pub last_reconnection_ms: Option<u64>,
}

/// Handle for requesting, cancelling, and resetting reconnections.
#[derive(Clone)]
pub struct ReconnectionScheduler {
    shared: Arc<Shared>,
}

impl ReconnectionScheduler {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        ReconnectionScheduler { shared }
    }

    /// Requests a reconnection unless one is already under way.
    ///
    /// Returns true if a reconnection timer was armed.
    pub fn trigger(&self, reason: &str) -> bool {
        let shared = &self.shared;
        shared.with_state(|core, _| trigger_in(shared, core, reason, false))
    }

    /// Cancels any pending attempt and schedules a fresh one.
    ///
    /// Still subject to the minimum spacing between reconnections.
    pub fn force_trigger(&self, reason: &str) -> bool {
        let shared = &self.shared;
        shared.with_state(|core, _| trigger_in(shared, core, reason, true))
    }

    /// Cancels the pending reconnection timer, if any.
    pub fn cancel_reconnection(&self) {
        self.shared.with_state(|core, _| cancel_in(core));
    }

    /// Marks the connection verified: zeroes attempts and cancels the timer.
    pub fn reset_reconnection_state(&self) {
        self.shared.with_state(|core, _| reset_in(core));
    }

    pub fn state(&self) -> ReconnectionState {
        self.shared.read(|core| core.reconnect)
    }

    /// Fires the reconnect callback if `generation` is still the armed timer.
    fn fire(&self, generation: u64, reason: String) {
        self.shared.with_state(|core, effects| {
            if !core.timers.reconnect.complete(generation) {
                return;
            }
            core.reconnect.is_reconnecting = false;
            tracing::info!(reason = %reason, "invoking reconnect");
            effects.push(Effect::Reconnect(reason));
        });
    }
}

pub(crate) fn trigger_in(shared: &Arc<Shared>, core: &mut CoreState, reason: &str, force: bool) -> bool {
    if !force && (core.connection == ConnectionState::Reconnecting || core.reconnect.is_reconnecting) {
        tracing::debug!(reason, "reconnection already under way; trigger suppressed");
        return false;
    }
    schedule_in(shared, core, reason)
}

pub(crate) fn schedule_in(shared: &Arc<Shared>, core: &mut CoreState, reason: &str) -> bool {
    let now = shared.now_ms();
    let policy = shared.backoff;

    if let Some(last) = core.reconnect.last_reconnection_ms {
        let since = now.saturating_sub(last);
        if since < policy.min_spacing_ms() {
            tracing::debug!(reason, since_ms = since, "reconnection rate limited; dropped");
            return false;
        }
    }

    core.timers.reconnect.cancel();

    if core.reconnect.attempts >= policy.attempt_cap() {
        tracing::info!(
            attempts = core.reconnect.attempts,
            "reconnection attempt cap reached; restarting backoff"
        );
        core.reconnect.attempts = 0;
    }

    let delay = policy.delay_for_attempt(core.reconnect.attempts);
    core.reconnect.attempts += 1;
    core.reconnect.is_reconnecting = true;
    core.reconnect.last_reconnection_ms = Some(now);
    core.connection = ConnectionState::Reconnecting;

    let attempt = core.reconnect.attempts;
    // CORRECTNESS: delay is bounded by reconnect_max_delay_ms
    #[allow(clippy::cast_possible_truncation)]
    let delay_ms = delay.as_millis() as u64;
    tracing::info!(reason, attempt, delay_ms, "reconnection scheduled");

    let annotated = format!("{reason} (attempt {attempt}, after {delay_ms}ms)");
    let scheduler = ReconnectionScheduler::new(Arc::clone(shared));
    spawn_oneshot(core.timers.reconnect.arm(), delay, move |generation| {
        scheduler.fire(generation, annotated);
    });
    true
}

pub(crate) fn cancel_in(core: &mut CoreState) {
    if core.timers.reconnect.cancel() {
        tracing::debug!("pending reconnection cancelled");
    }
    core.reconnect.is_reconnecting = false;
    if core.connection == ConnectionState::Reconnecting {
        core.connection = ConnectionState::Disconnected;
    }
}

pub(crate) fn reset_in(core: &mut CoreState) {
    core.timers.reconnect.cancel();
    core.reconnect.attempts = 0;
    core.reconnect.is_reconnecting = false;
    if !core.session.has_handle() {
        tracing::debug!("reconnection state reset without an installed handle");
    }
    core.connection = ConnectionState::Connected;
}

#[cfg(test)]
#[path = "reconnect_tests.rs"]
mod tests;
