// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellable timer slots.
//!
//! Each timer class owns one [`TimerSlot`]. Arming a slot cancels the token
//! of the timer it replaces and bumps the slot generation; a task that wakes
//! up late checks its generation under the state lock before acting, so a
//! superseded timer can never fire.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Holder for at most one live timer of a given class.
#[derive(Debug, Default)]
pub struct TimerSlot {
    token: Option<CancellationToken>,
    generation: u64,
}

/// Proof of arming, carried by the spawned task.
#[derive(Debug, Clone)]
pub struct TimerTicket {
    pub token: CancellationToken,
    pub generation: u64,
}

impl TimerSlot {
    /// Cancels any live timer and arms a new one.
    pub fn arm(&mut self) -> TimerTicket {
        self.cancel();
        self.generation = self.generation.wrapping_add(1);
        let token = CancellationToken::new();
        self.token = Some(token.clone());
        TimerTicket {
            token,
            generation: self.generation,
        }
    }

    /// Cancels the live timer. Returns true if one was live.
    pub fn cancel(&mut self) -> bool {
        match self.token.take() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// True if `generation` still names the live timer.
    pub fn is_current(&self, generation: u64) -> bool {
        self.token.is_some() && self.generation == generation
    }

    /// Retires a one-shot timer that fired. Returns false if it was superseded.
    pub fn complete(&mut self, generation: u64) -> bool {
        if self.is_current(generation) {
            self.token = None;
            true
        } else {
            false
        }
    }

    pub fn is_live(&self) -> bool {
        self.token.is_some()
    }
}

/// Spawns a one-shot timer that runs `fire` after `delay` unless cancelled.
pub fn spawn_oneshot<F>(ticket: TimerTicket, delay: Duration, fire: F)
where
    F: FnOnce(u64) + Send + 'static,
{
    tokio::spawn(async move {
        tokio::select! {
            _ = ticket.token.cancelled() => {}
            _ = tokio::time::sleep(delay) => fire(ticket.generation),
        }
    });
}

/// Spawns a repeating timer that runs `tick` every `period` until cancelled.
///
/// The first tick happens one full period after spawning.
pub fn spawn_interval<F>(ticket: TimerTicket, period: Duration, mut tick: F)
where
    F: FnMut(u64) + Send + 'static,
{
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticket.token.cancelled() => return,
                _ = interval.tick() => tick(ticket.generation),
            }
        }
    });
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
