// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Linux network observer backed by sysfs and the kernel route table.
//!
//! There is no change notification to subscribe to, so interface state is
//! polled. An interface is considered to have internet when its `operstate`
//! is `up` and it carries a default route. No reachability probe is made, so
//! `is_validated` mirrors `has_internet`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use synclink_core::{
    Error as CoreError, NetworkCapabilities, NetworkEvent, NetworkEventSink, NetworkId,
    NetworkObserver, Result as CoreResult, TransportType,
};
use tokio_util::sync::CancellationToken;

use crate::config::NetworkConfig;

/// One interface as seen on the last poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interface {
    pub name: String,
    pub id: NetworkId,
    pub caps: NetworkCapabilities,
}

/// Interfaces keyed by name.
pub type Snapshot = HashMap<String, Interface>;

/// Classifies an interface by its kernel name.
pub fn classify_interface(name: &str) -> TransportType {
    if name.starts_with("wl") {
        TransportType::Wifi
    } else if name.starts_with("ww") || name.starts_with("rmnet") {
        TransportType::Cellular
    } else if name.starts_with("en") || name.starts_with("eth") {
        TransportType::Ethernet
    } else if name.starts_with("tun") || name.starts_with("wg") || name.starts_with("tap") {
        TransportType::Vpn
    } else {
        TransportType::Other
    }
}

/// Interfaces with a default route in `/proc/net/route` format.
pub fn parse_default_routes(table: &str) -> HashSet<String> {
    table
        .lines()
        .skip(1)
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let iface = fields.next()?;
            let destination = fields.next()?;
            (destination == "00000000").then(|| iface.to_string())
        })
        .collect()
}

/// Reads every non-loopback interface under `sysfs_root`.
pub fn scan(sysfs_root: &Path, route_table: &Path) -> io::Result<Snapshot> {
    // A missing route table means no default route anywhere.
    let routes = fs::read_to_string(route_table)
        .map(|table| parse_default_routes(&table))
        .unwrap_or_default();

    let mut snapshot = Snapshot::new();
    for entry in fs::read_dir(sysfs_root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == "lo" {
            continue;
        }
        let dir = entry.path();
        let Some(index) = read_trimmed(&dir.join("ifindex")).and_then(|s| s.parse().ok()) else {
            continue;
        };
        let up = read_trimmed(&dir.join("operstate")).is_some_and(|s| s == "up");
        let has_internet = up && routes.contains(&name);
        let caps = NetworkCapabilities {
            has_internet,
            is_validated: has_internet,
            transport: classify_interface(&name),
        };
        snapshot.insert(
            name.clone(),
            Interface {
                name,
                id: NetworkId(index),
                caps,
            },
        );
    }
    Ok(snapshot)
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

/// Events that turn `old` into `new`.
///
/// Snapshots must be published before these are delivered, since the
/// watcher queries capabilities when it sees `Available`.
pub fn diff(old: &Snapshot, new: &Snapshot) -> Vec<NetworkEvent> {
    let mut events = Vec::new();
    for (name, iface) in new {
        match old.get(name) {
            Some(prev) if prev.id != iface.id => {
                events.push(NetworkEvent::Lost(prev.id));
                appeared(iface, &mut events);
            }
            Some(prev) if prev.caps != iface.caps => {
                if prev.caps.has_internet && !iface.caps.has_internet {
                    events.push(NetworkEvent::CapabilitiesChanged(iface.id, iface.caps));
                    events.push(NetworkEvent::Lost(iface.id));
                } else if !prev.caps.has_internet && iface.caps.has_internet {
                    appeared(iface, &mut events);
                } else {
                    events.push(NetworkEvent::CapabilitiesChanged(iface.id, iface.caps));
                }
            }
            Some(_) => {}
            None => appeared(iface, &mut events),
        }
    }
    for (name, prev) in old {
        if !new.contains_key(name) && prev.caps.has_internet {
            events.push(NetworkEvent::Lost(prev.id));
        }
    }
    events
}

fn appeared(iface: &Interface, events: &mut Vec<NetworkEvent>) {
    if iface.caps.has_internet {
        events.push(NetworkEvent::Available(iface.id));
        events.push(NetworkEvent::CapabilitiesChanged(iface.id, iface.caps));
    }
}

/// Scan state shared with the poll task.
struct Scanner {
    sysfs_root: PathBuf,
    route_table: PathBuf,
    snapshot: Mutex<Snapshot>,
}

impl Scanner {
    fn poll(&self) -> io::Result<Vec<NetworkEvent>> {
        let new = scan(&self.sysfs_root, &self.route_table)?;
        let mut snapshot = lock(&self.snapshot);
        let events = diff(&snapshot, &new);
        *snapshot = new;
        Ok(events)
    }
}

/// Polling observer over `/sys/class/net`.
pub struct SysfsObserver {
    scanner: Arc<Scanner>,
    poll_interval: Duration,
    poller: Mutex<Option<CancellationToken>>,
}

impl SysfsObserver {
    pub fn new(config: &NetworkConfig, poll_interval: Duration) -> Self {
        SysfsObserver {
            scanner: Arc::new(Scanner {
                sysfs_root: config.sysfs_root.clone(),
                route_table: config.route_table.clone(),
                snapshot: Mutex::new(Snapshot::new()),
            }),
            poll_interval,
            poller: Mutex::new(None),
        }
    }

    /// Rescans and returns the events since the previous poll.
    pub fn poll(&self) -> io::Result<Vec<NetworkEvent>> {
        self.scanner.poll()
    }
}

impl NetworkObserver for SysfsObserver {
    fn start(&self, sink: NetworkEventSink) -> CoreResult<()> {
        let scanner = &self.scanner;
        let initial = scan(&scanner.sysfs_root, &scanner.route_table).map_err(|e| {
            CoreError::ObserverRegistration(format!("{}: {e}", scanner.sysfs_root.display()))
        })?;
        tracing::info!(
            root = %scanner.sysfs_root.display(),
            interfaces = initial.len(),
            "watching network interfaces"
        );
        *lock(&scanner.snapshot) = initial;

        let token = CancellationToken::new();
        if let Some(previous) = lock(&self.poller).replace(token.clone()) {
            previous.cancel();
        }

        let scanner = Arc::clone(scanner);
        let period = self.poll_interval;
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    _ = interval.tick() => {}
                }
                let events = match scanner.poll() {
                    Ok(events) => events,
                    Err(e) => {
                        tracing::warn!(error = %e, "interface scan failed");
                        continue;
                    }
                };
                for event in events {
                    tracing::debug!(?event, "network event");
                    if sink.send(event).is_err() {
                        return;
                    }
                }
            }
        });
        Ok(())
    }

    fn stop(&self) {
        if let Some(token) = lock(&self.poller).take() {
            token.cancel();
            tracing::info!("stopped watching network interfaces");
        }
    }

    fn is_reachable(&self) -> bool {
        lock(&self.scanner.snapshot)
            .values()
            .any(|iface| iface.caps.usable())
    }

    fn capabilities(&self, network: NetworkId) -> Option<NetworkCapabilities> {
        lock(&self.scanner.snapshot)
            .values()
            .find(|iface| iface.id == network)
            .map(|iface| iface.caps)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
#[path = "sysfs_tests.rs"]
mod tests;
