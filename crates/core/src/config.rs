// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle tuning knobs.
//!
//! Every field has a serde default so a `[lifecycle]` table may list only
//! the values it overrides.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timing and policy configuration for the connection lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Heartbeat ping interval in milliseconds (default: 15000).
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Max time to wait for a pong in milliseconds (default: 12000).
    #[serde(default = "default_pong_timeout_ms")]
    pub pong_timeout_ms: u64,
    /// First reconnection delay in milliseconds (default: 3000).
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Upper bound on the reconnection delay in milliseconds (default: 30000).
    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,
    /// Attempt count at which the backoff wraps back to the base delay (default: 5).
    #[serde(default = "default_reconnect_attempt_cap")]
    pub reconnect_attempt_cap: u32,
    /// Minimum spacing between two scheduled reconnections in milliseconds (default: 5000).
    #[serde(default = "default_reconnect_min_spacing_ms")]
    pub reconnect_min_spacing_ms: u64,
    /// Base debounce window for transport type changes in milliseconds (default: 15000).
    #[serde(default = "default_debounce_base_ms")]
    pub debounce_base_ms: u64,
    /// Ceiling for the adaptive debounce window in milliseconds (default: 60000).
    #[serde(default = "default_debounce_max_ms")]
    pub debounce_max_ms: u64,
    /// Rejected transitions before the debounce window starts doubling (default: 3).
    #[serde(default = "default_flap_threshold")]
    pub flap_threshold: u32,
    /// Failsafe audit interval in milliseconds (default: 30000).
    #[serde(default = "default_watchdog_interval_ms")]
    pub watchdog_interval_ms: u64,
    /// Poll interval for observers that sample the OS rather than subscribe (default: 2000).
    #[serde(default = "default_network_poll_interval_ms")]
    pub network_poll_interval_ms: u64,
}

fn default_heartbeat_interval_ms() -> u64 {
    15_000
}

fn default_pong_timeout_ms() -> u64 {
    12_000
}

fn default_reconnect_base_delay_ms() -> u64 {
    3_000
}

fn default_reconnect_max_delay_ms() -> u64 {
    30_000
}

fn default_reconnect_attempt_cap() -> u32 {
    5
}

fn default_reconnect_min_spacing_ms() -> u64 {
    5_000
}

fn default_debounce_base_ms() -> u64 {
    15_000
}

fn default_debounce_max_ms() -> u64 {
    60_000
}

fn default_flap_threshold() -> u32 {
    3
}

fn default_watchdog_interval_ms() -> u64 {
    30_000
}

fn default_network_poll_interval_ms() -> u64 {
    2_000
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        LifecycleConfig {
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            pong_timeout_ms: default_pong_timeout_ms(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            reconnect_attempt_cap: default_reconnect_attempt_cap(),
            reconnect_min_spacing_ms: default_reconnect_min_spacing_ms(),
            debounce_base_ms: default_debounce_base_ms(),
            debounce_max_ms: default_debounce_max_ms(),
            flap_threshold: default_flap_threshold(),
            watchdog_interval_ms: default_watchdog_interval_ms(),
            network_poll_interval_ms: default_network_poll_interval_ms(),
        }
    }
}

impl LifecycleConfig {
    /// Checks that intervals are non-zero and bounds are ordered.
    pub fn validate(&self) -> Result<()> {
        let intervals = [
            ("heartbeat_interval_ms", self.heartbeat_interval_ms),
            ("pong_timeout_ms", self.pong_timeout_ms),
            ("reconnect_base_delay_ms", self.reconnect_base_delay_ms),
            ("debounce_base_ms", self.debounce_base_ms),
            ("watchdog_interval_ms", self.watchdog_interval_ms),
            ("network_poll_interval_ms", self.network_poll_interval_ms),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(Error::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        if self.reconnect_max_delay_ms < self.reconnect_base_delay_ms {
            return Err(Error::InvalidConfig(
                "reconnect_max_delay_ms must be >= reconnect_base_delay_ms".to_string(),
            ));
        }
        if self.debounce_max_ms < self.debounce_base_ms {
            return Err(Error::InvalidConfig(
                "debounce_max_ms must be >= debounce_base_ms".to_string(),
            ));
        }
        if self.reconnect_attempt_cap == 0 {
            return Err(Error::InvalidConfig(
                "reconnect_attempt_cap must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn pong_timeout(&self) -> Duration {
        Duration::from_millis(self.pong_timeout_ms)
    }

    pub fn watchdog_interval(&self) -> Duration {
        Duration::from_millis(self.watchdog_interval_ms)
    }

    pub fn network_poll_interval(&self) -> Duration {
        Duration::from_millis(self.network_poll_interval_ms)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
