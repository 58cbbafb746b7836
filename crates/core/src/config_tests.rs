// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[test]
fn defaults_match_documented_values() {
    let config = LifecycleConfig::default();
    assert_eq!(config.heartbeat_interval_ms, 15_000);
    assert_eq!(config.pong_timeout_ms, 12_000);
    assert_eq!(config.reconnect_base_delay_ms, 3_000);
    assert_eq!(config.reconnect_max_delay_ms, 30_000);
    assert_eq!(config.reconnect_attempt_cap, 5);
    assert_eq!(config.reconnect_min_spacing_ms, 5_000);
    assert_eq!(config.debounce_base_ms, 15_000);
    assert_eq!(config.debounce_max_ms, 60_000);
    assert_eq!(config.flap_threshold, 3);
    assert_eq!(config.watchdog_interval_ms, 30_000);
    assert!(config.validate().is_ok());
}

#[test]
fn partial_json_fills_defaults() {
    let config: LifecycleConfig =
        serde_json::from_str(r#"{"heartbeat_interval_ms": 5000}"#).unwrap();
    assert_eq!(config.heartbeat_interval_ms, 5_000);
    assert_eq!(config.pong_timeout_ms, 12_000);
    assert_eq!(config.heartbeat_interval(), Duration::from_secs(5));
}

#[parameterized(
    zero_heartbeat = { LifecycleConfig { heartbeat_interval_ms: 0, ..LifecycleConfig::default() }, "heartbeat_interval_ms" },
    zero_pong = { LifecycleConfig { pong_timeout_ms: 0, ..LifecycleConfig::default() }, "pong_timeout_ms" },
    inverted_backoff = { LifecycleConfig { reconnect_max_delay_ms: 1_000, ..LifecycleConfig::default() }, "reconnect_max_delay_ms" },
    inverted_debounce = { LifecycleConfig { debounce_max_ms: 1_000, ..LifecycleConfig::default() }, "debounce_max_ms" },
    zero_cap = { LifecycleConfig { reconnect_attempt_cap: 0, ..LifecycleConfig::default() }, "reconnect_attempt_cap" },
)]
fn validate_rejects(config: LifecycleConfig, field: &str) {
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains(field));
}
