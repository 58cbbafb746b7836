// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Injectable time sources.
//!
//! Every timestamp the lifecycle manager records (ping send times,
//! reconnection spacing, network change debounce, sync age) comes from a
//! [`ClockSource`], so tests can drive time by hand.

use std::sync::atomic::{AtomicU64, Ordering};

/// Trait for getting the current time in milliseconds.
///
/// Values only need to be monotonic relative to each other; the origin is
/// unspecified.
pub trait ClockSource: Send + Sync {
    /// Returns the current time in milliseconds.
    fn now_ms(&self) -> u64;
}

/// Monotonic clock backed by `tokio::time::Instant`.
///
/// Follows tokio's paused clock in tests, so timer tasks and recorded
/// timestamps stay in step under `tokio::time::advance`.
#[derive(Debug)]
pub struct MonotonicClock {
    origin: tokio::time::Instant,
}

impl MonotonicClock {
    /// Creates a clock whose zero is the moment of construction.
    pub fn new() -> Self {
        MonotonicClock {
            origin: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for MonotonicClock {
    fn now_ms(&self) -> u64 {
        // CORRECTNESS: u64 millis covers ~584 million years of uptime
        #[allow(clippy::cast_possible_truncation)]
        let elapsed = self.origin.elapsed().as_millis() as u64;
        elapsed
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Creates a manual clock starting at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        ManualClock {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    /// Moves the clock forward by `delta_ms`.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute value.
    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl ClockSource for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
