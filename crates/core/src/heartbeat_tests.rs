// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use crate::test_helpers::{advance_ms, Harness, MockChannel};

#[tokio::test(start_paused = true)]
async fn heartbeat_waits_for_first_sync() {
    let h = Harness::new();
    let channel = MockChannel::new();
    h.manager.set_connection(channel.boxed());

    assert!(!h.manager.heartbeat().is_running());
    advance_ms(60_000).await;
    assert!(channel.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn no_ping_while_cursor_is_zero() {
    let h = Harness::new();
    let channel = h.connect_synced(0);
    assert!(h.manager.heartbeat().is_running());

    advance_ms(45_001).await;
    assert!(channel.sent().is_empty());
    assert_eq!(h.manager.pending_ping_id(), None);
    assert_eq!(h.manager.health_snapshot().metrics.consecutive_timeouts, 0);
}

#[tokio::test(start_paused = true)]
async fn tick_sends_ping_with_cursor() {
    let h = Harness::new();
    let channel = h.connect_synced(42);

    advance_ms(15_001).await;
    let sent = channel.sent_json();
    assert_eq!(
        sent,
        vec![serde_json::json!({
            "command": "ping",
            "data": { "last_received_id": 42 },
            "request_id": 1
        })]
    );
    assert_eq!(h.manager.pending_ping_id(), Some(1));
    assert!(h.manager.live_timers().pong_timeout);
}

#[tokio::test(start_paused = true)]
async fn matching_pong_records_lag() {
    let h = Harness::new();
    h.connect_synced(5);
    let monitor = h.manager.heartbeat();

    advance_ms(15_000).await;
    advance_ms(250).await;
    assert!(monitor.on_pong(1));

    let health = h.listener.last_health().unwrap();
    assert!(health.connected);
    assert_eq!(health.lag_ms, Some(250));
    assert_eq!(h.manager.pending_ping_id(), None);
    assert!(!h.manager.live_timers().pong_timeout);

    let metrics = h.manager.health_snapshot().metrics;
    assert!((metrics.ema_latency_ms - 775.0).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn stale_pong_is_ignored() {
    let h = Harness::new();
    h.connect_synced(5);
    let monitor = h.manager.heartbeat();

    // Ping 7 times out, then ping 8 goes out.
    for _ in 0..6 {
        monitor.send_ping();
        monitor.on_pong(monitor.pending_request_id().unwrap());
    }
    assert_eq!(monitor.send_ping(), Some(7));
    advance_ms(12_001).await;
    h.manager.reset_reconnection_state();
    assert_eq!(monitor.send_ping(), Some(8));
    let before = h.manager.health_snapshot().metrics;

    assert!(!monitor.on_pong(7));
    assert_eq!(monitor.pending_request_id(), Some(8));
    assert_eq!(h.manager.health_snapshot().metrics, before);
    assert_eq!(before.consecutive_ping_timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn pong_timeout_counts_and_triggers_reconnect() {
    let h = Harness::new();
    h.connect_synced(9);

    advance_ms(15_000).await;
    advance_ms(12_001).await;

    let snapshot = h.manager.health_snapshot();
    assert_eq!(snapshot.metrics.consecutive_timeouts, 1);
    assert_eq!(snapshot.metrics.consecutive_ping_timeouts, 1);
    assert!((snapshot.metrics.stability - 0.8).abs() < 1e-9);
    assert_eq!(h.manager.pending_ping_id(), None);
    assert!(snapshot.reconnection.is_reconnecting);
    assert_eq!(snapshot.state, ConnectionState::Reconnecting);

    advance_ms(3_000).await;
    assert_eq!(
        h.listener.reconnects(),
        vec!["ping timeout; consecutive=1 (attempt 1, after 3000ms)".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn pong_timeout_after_network_loss_is_not_counted() {
    let h = Harness::new();
    h.connect_synced(9);

    advance_ms(15_001).await;
    h.observer.set_reachable(false);
    assert!(h.manager.pending_ping_id().is_some());
    advance_ms(12_000).await;

    let snapshot = h.manager.health_snapshot();
    assert_eq!(snapshot.metrics.consecutive_ping_timeouts, 0);
    assert!(!snapshot.reconnection.is_reconnecting);
    assert_eq!(h.manager.pending_ping_id(), None);
    assert!(!h.manager.live_timers().pong_timeout);
}

#[tokio::test(start_paused = true)]
async fn unreachable_network_skips_tick() {
    let h = Harness::new();
    let channel = h.connect_synced(3);
    h.observer.set_reachable(false);

    advance_ms(15_001).await;
    assert!(channel.sent().is_empty());
}

#[tokio::test(start_paused = true)]
async fn refused_send_leaves_nothing_outstanding() {
    let h = Harness::new();
    let channel = h.connect_synced(3);
    channel.refuse_sends(true);

    assert_eq!(h.manager.heartbeat().send_ping(), None);
    assert_eq!(h.manager.pending_ping_id(), None);
    assert!(!h.manager.live_timers().pong_timeout);

    channel.refuse_sends(false);
    advance_ms(15_001).await;
    // Request ids are never reused, even for pings that failed to send.
    assert_eq!(h.manager.pending_ping_id(), Some(2));
}

#[tokio::test(start_paused = true)]
async fn new_ping_supersedes_pong_timeout() {
    let h = Harness::new();
    let channel = MockChannel::new();
    h.manager.set_connection(channel.boxed());
    h.manager.update_last_received_sync_id(3);
    let monitor = h.manager.heartbeat();

    monitor.send_ping();
    advance_ms(11_000).await;
    monitor.send_ping();
    advance_ms(11_000).await;

    // The first timeout would have fired at 12s; only the second is live.
    assert_eq!(h.manager.health_snapshot().metrics.consecutive_ping_timeouts, 0);
    assert_eq!(monitor.pending_request_id(), Some(2));

    advance_ms(1_001).await;
    assert_eq!(h.manager.health_snapshot().metrics.consecutive_ping_timeouts, 1);
}

#[tokio::test(start_paused = true)]
async fn stop_forgets_outstanding_ping() {
    let h = Harness::new();
    h.connect_synced(3);
    let monitor = h.manager.heartbeat();
    monitor.send_ping();

    monitor.stop();
    assert!(!monitor.is_running());
    assert_eq!(monitor.pending_request_id(), None);
    let timers = h.manager.live_timers();
    assert!(!timers.heartbeat);
    assert!(!timers.pong_timeout);
}
