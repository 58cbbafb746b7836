// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use std::sync::Arc;
use std::time::Duration;
use synclink_core::{ConnectionState, FakeNetworkObserver, LifecycleConfig};
use tokio::net::TcpListener;

fn manager() -> (ConnectionManager, mpsc::UnboundedReceiver<String>) {
    let (dialer, rx) = DialRequests::new();
    let manager = ConnectionManager::with_monotonic_clock(
        LifecycleConfig::default(),
        Arc::new(FakeNetworkObserver::new()),
        Arc::new(dialer),
    )
    .unwrap();
    (manager, rx)
}

/// Channel that accepts everything and remembers nothing.
struct NullChannel;

impl ChannelHandle for NullChannel {
    fn send(&self, _frame: &str) -> bool {
        true
    }

    fn close(&self) {}
}

/// Polls `check` until it holds or five seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !check() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[test]
fn dial_url_without_session_is_base() {
    let params = ReconnectionParameters::default();
    assert_eq!(dial_url("wss://h/ws", &params), "wss://h/ws");
}

#[test]
fn dial_url_carries_resume_parameters() {
    let params = ReconnectionParameters {
        run_id: "run 1/a".into(),
        last_received_sync_id: 42,
        vapid_key: "k".into(),
    };
    assert_eq!(
        dial_url("wss://h/ws", &params),
        "wss://h/ws?run_id=run%201%2Fa&last_received_id=42"
    );
    assert_eq!(
        dial_url("wss://h/ws?v=2", &params),
        "wss://h/ws?v=2&run_id=run%201%2Fa&last_received_id=42"
    );
}

#[tokio::test]
async fn connect_frame_stores_session_and_verifies() {
    let (manager, _rx) = manager();
    manager.update_last_received_sync_id(9);
    manager.set_connection(Box::new(NullChannel));

    handle_frame(&manager, r#"{"command":"connect","data":{"run_id":"r-1","vapid_key":"v"}}"#)
        .unwrap();

    let params = manager.reconnection_parameters();
    assert_eq!(params.run_id, "r-1");
    assert_eq!(params.vapid_key, "v");
    assert_eq!(params.last_received_sync_id, 9);
    assert_eq!(manager.state(), ConnectionState::Connected);
    assert_eq!(manager.scheduler().state().attempts, 0);
}

#[tokio::test]
async fn sync_frame_advances_cursor_and_starts_heartbeat() {
    let (manager, _rx) = manager();
    manager.set_connection(Box::new(NullChannel));

    handle_frame(&manager, r#"{"command":"sync","data":{"id":17}}"#).unwrap();

    assert_eq!(manager.reconnection_parameters().last_received_sync_id, 17);
    assert!(manager.live_timers().heartbeat);
    assert!(manager.health().last_sync_age_ms.is_some());
}

#[tokio::test]
async fn response_to_ping_counts_as_pong() {
    let (manager, _rx) = manager();
    manager.set_connection(Box::new(NullChannel));
    manager.update_last_received_sync_id(3);
    let id = manager.heartbeat().send_ping().unwrap();

    handle_frame(&manager, &format!(r#"{{"command":"response","request_id":{}}}"#, id + 10)).unwrap();
    assert_eq!(manager.pending_ping_id(), Some(id));

    handle_frame(&manager, &format!(r#"{{"command":"response","request_id":{id}}}"#)).unwrap();
    assert_eq!(manager.pending_ping_id(), None);
    assert!(manager.health().lag_ms.is_some());
}

#[tokio::test]
async fn malformed_frame_is_an_error() {
    let (manager, _rx) = manager();
    let err = handle_frame(&manager, "{").unwrap_err();
    assert!(matches!(err, Error::Core(synclink_core::Error::InvalidFrame(_))));
}

#[tokio::test]
async fn dial_installs_socket_and_reports_server_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::Text(
            r#"{"command":"connect","data":{"run_id":"r-9"}}"#.into(),
        ))
        .await
        .unwrap();
        ws.send(Message::Text(r#"{"command":"sync","data":{"id":5}}"#.into()))
            .await
            .unwrap();
        // The test decides when to hang up.
        ws
    });

    let (dialer, rx) = DialRequests::new();
    let dialer = Arc::new(dialer);
    let manager = ConnectionManager::with_monotonic_clock(
        LifecycleConfig::default(),
        Arc::new(FakeNetworkObserver::new()),
        dialer.clone(),
    )
    .unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(Connector::new(&url, manager.clone()).run(rx, shutdown.clone()));

    dialer.request("initial connect");
    eventually(|| manager.reconnection_parameters().last_received_sync_id == 5).await;
    assert_eq!(manager.reconnection_parameters().run_id, "r-9");
    assert!(manager.is_connected());

    let mut ws = server.await.unwrap();
    ws.close(None).await.unwrap();
    eventually(|| !manager.is_connected()).await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);

    shutdown.cancel();
    manager.shutdown();
}

#[tokio::test]
async fn refused_dial_reports_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    drop(listener);

    let (manager, _unused) = manager();
    let (dialer, rx) = DialRequests::new();
    let shutdown = CancellationToken::new();
    tokio::spawn(Connector::new(&url, manager.clone()).run(rx, shutdown.clone()));

    dialer.request("initial connect");
    eventually(|| manager.scheduler().state().attempts == 1).await;
    assert_eq!(manager.state(), ConnectionState::Reconnecting);
    shutdown.cancel();
    manager.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sync_right_after_handshake_starts_heartbeat() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());

    let server = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        ws.send(Message::Text(r#"{"command":"sync","data":{"id":5}}"#.into()))
            .await
            .unwrap();
        ws
    });

    let (dialer, rx) = DialRequests::new();
    let dialer = Arc::new(dialer);
    let manager = ConnectionManager::with_monotonic_clock(
        LifecycleConfig::default(),
        Arc::new(FakeNetworkObserver::new()),
        dialer.clone(),
    )
    .unwrap();
    let shutdown = CancellationToken::new();
    tokio::spawn(Connector::new(&url, manager.clone()).run(rx, shutdown.clone()));

    dialer.request("initial connect");
    eventually(|| manager.live_timers().heartbeat).await;
    assert_eq!(manager.reconnection_parameters().last_received_sync_id, 5);
    assert!(manager.is_connected());

    let _ws = server.await.unwrap();
    shutdown.cancel();
    manager.shutdown();
}

#[tokio::test]
async fn requests_queued_during_dial_do_not_redial() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("ws://{}/ws", listener.local_addr().unwrap());
    let accepted = Arc::new(AtomicUsize::new(0));

    let server_accepted = accepted.clone();
    let server = tokio::spawn(async move {
        let mut open = Vec::new();
        loop {
            let (tcp, _) = listener.accept().await.unwrap();
            open.push(tokio_tungstenite::accept_async(tcp).await.unwrap());
            server_accepted.fetch_add(1, Ordering::SeqCst);
        }
    });

    let (dialer, rx) = DialRequests::new();
    let dialer = Arc::new(dialer);
    let manager = ConnectionManager::with_monotonic_clock(
        LifecycleConfig::default(),
        Arc::new(FakeNetworkObserver::new()),
        dialer.clone(),
    )
    .unwrap();

    dialer.request("initial connect");
    dialer.reconnect("failsafe");
    dialer.reconnect("network restored");

    let shutdown = CancellationToken::new();
    tokio::spawn(Connector::new(&url, manager.clone()).run(rx, shutdown.clone()));

    eventually(|| manager.is_connected()).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 1);
    assert!(manager.is_connected());

    shutdown.cancel();
    manager.shutdown();
    server.abort();
}
