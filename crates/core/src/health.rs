// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Connection health smoothing.
//!
//! Latency is tracked as an exponential moving average and jitter folds into
//! a `stability` score in `[0, 1]`. Both feed the adaptive request timeout.

use serde::Serialize;

/// EMA seed before any pong has been observed.
pub const INITIAL_EMA_LATENCY_MS: f64 = 1_000.0;
/// Lower bound of the adaptive request timeout.
pub const MIN_ADAPTIVE_TIMEOUT_MS: u64 = 3_000;
/// Upper bound of the adaptive request timeout.
pub const MAX_ADAPTIVE_TIMEOUT_MS: u64 = 15_000;

const EMA_WEIGHT_OLD: f64 = 0.7;
const EMA_WEIGHT_NEW: f64 = 0.3;
const STABILITY_DECAY: f64 = 0.9;
const TIMEOUT_PENALTY: f64 = 0.8;
const STABILITY_FLOOR: f64 = 0.1;

/// Smoothed latency and stability statistics for the live channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthMetrics {
    pub ema_latency_ms: f64,
    pub stability: f64,
    pub consecutive_timeouts: u32,
    pub consecutive_ping_timeouts: u32,
}

impl Default for HealthMetrics {
    fn default() -> Self {
        HealthMetrics {
            ema_latency_ms: INITIAL_EMA_LATENCY_MS,
            stability: 1.0,
            consecutive_timeouts: 0,
            consecutive_ping_timeouts: 0,
        }
    }
}

impl HealthMetrics {
    /// Folds a pong round-trip time into the average and stability score.
    pub fn on_pong(&mut self, lag_ms: u64) {
        let lag = lag_ms as f64;
        self.ema_latency_ms = EMA_WEIGHT_OLD * self.ema_latency_ms + EMA_WEIGHT_NEW * lag;
        let deviation = (lag - self.ema_latency_ms).abs();
        let delta = stability_delta(deviation);
        self.stability = (STABILITY_DECAY * self.stability + delta).clamp(0.0, 1.0);
    }

    /// Penalises stability after a missed response.
    pub fn on_timeout(&mut self) {
        self.stability = (self.stability * TIMEOUT_PENALTY).max(STABILITY_FLOOR);
    }

    /// Clears the timeout streak and nudges stability back up.
    pub fn on_recovered_stable(&mut self) {
        self.consecutive_timeouts = 0;
        self.stability = (STABILITY_DECAY * self.stability + 0.1).clamp(0.0, 1.0);
    }

    /// Health-weighted timeout for request/response operations.
    ///
    /// `clamp(5000 + min(1.5 * ema, 5000) + (1 - stability) * 5000
    /// + consecutive_timeouts * 2000, 3000, 15000)`.
    pub fn adaptive_timeout_ms(&self) -> u64 {
        let latency_term = (1.5 * self.ema_latency_ms).min(5_000.0);
        let instability_term = (1.0 - self.stability) * 5_000.0;
        let timeout_term = f64::from(self.consecutive_timeouts) * 2_000.0;
        let raw = 5_000.0 + latency_term + instability_term + timeout_term;
        // CORRECTNESS: clamped into [3000, 15000] before the cast
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let millis = raw.clamp(
            MIN_ADAPTIVE_TIMEOUT_MS as f64,
            MAX_ADAPTIVE_TIMEOUT_MS as f64,
        ) as u64;
        millis
    }
}

/// Stability credit for a sample deviating `deviation_ms` from the average.
pub fn stability_delta(deviation_ms: f64) -> f64 {
    if deviation_ms < 200.0 {
        0.1
    } else if deviation_ms < 500.0 {
        0.05
    } else if deviation_ms < 1_000.0 {
        0.02
    } else {
        0.01
    }
}

/// Health telemetry pushed to the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct HealthUpdate {
    pub connected: bool,
    pub lag_ms: Option<u64>,
    pub last_sync_age_ms: Option<u64>,
}

impl HealthUpdate {
    pub fn disconnected() -> Self {
        HealthUpdate::default()
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
