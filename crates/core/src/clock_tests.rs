// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;

#[test]
fn manual_clock_advances_and_sets() {
    let clock = ManualClock::new(1_000);
    assert_eq!(clock.now_ms(), 1_000);

    clock.advance(250);
    assert_eq!(clock.now_ms(), 1_250);

    clock.set(10);
    assert_eq!(clock.now_ms(), 10);
}

#[tokio::test(start_paused = true)]
async fn monotonic_clock_follows_paused_time() {
    let clock = MonotonicClock::new();
    assert_eq!(clock.now_ms(), 0);

    tokio::time::advance(Duration::from_millis(1_500)).await;
    assert_eq!(clock.now_ms(), 1_500);
}
