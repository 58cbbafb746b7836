// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! synclink - a client that keeps one sync WebSocket alive.
//!
//! Wires [`synclink_core::ConnectionManager`] to a tokio-tungstenite
//! connector and a sysfs network observer.
//!
//! # Main Components
//!
//! - [`Config`] - TOML configuration (server url, lifecycle knobs, sysfs paths)
//! - [`connector`] - dialing, socket tasks, and inbound frame handling
//! - [`sysfs`] - polling network observer for Linux
//! - [`Error`] - Error types for all operations

mod cli;
pub mod config;
pub mod connector;
pub mod error;
pub mod sysfs;

pub use cli::Cli;
pub use config::Config;
pub use error::{Error, Result};

use std::sync::Arc;
use std::time::Duration;

use synclink_core::ConnectionManager;
use tokio_util::sync::CancellationToken;

use connector::{Connector, DialRequests};
use sysfs::SysfsObserver;

/// Runs the client until Ctrl-C.
pub async fn run(config: Config, status_interval: Option<Duration>) -> Result<()> {
    let observer = Arc::new(SysfsObserver::new(
        &config.network,
        config.lifecycle.network_poll_interval(),
    ));
    let (dialer, requests) = DialRequests::new();
    let dialer = Arc::new(dialer);
    let manager =
        ConnectionManager::with_monotonic_clock(config.lifecycle.clone(), observer, dialer.clone())?;

    tracing::info!(url = %config.server.url, "synclink starting");
    manager.start();

    let shutdown = CancellationToken::new();
    let connector = Connector::new(&config.server.url, manager.clone());
    let dial_loop = tokio::spawn(connector.run(requests, shutdown.clone()));
    if let Some(period) = status_interval {
        tokio::spawn(report_status(manager.clone(), period, shutdown.clone()));
    }

    dialer.request("initial connect");

    tokio::signal::ctrl_c().await?;
    tracing::info!("interrupted; shutting down");
    shutdown.cancel();
    manager.shutdown();
    let _ = dial_loop.await;
    Ok(())
}

async fn report_status(manager: ConnectionManager, period: Duration, shutdown: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = interval.tick() => {}
        }
        match serde_json::to_string(&manager.health_snapshot()) {
            Ok(json) => tracing::info!(snapshot = %json, "status"),
            Err(e) => tracing::warn!(error = %e, "failed to encode status"),
        }
    }
}
