// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wall-clock abstraction for pacing virtual time against real time.
//!
//! The kernel itself never consults wall time; only the pacer does, and it
//! goes through this trait so pacing is testable without real delays.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub trait WallClock: Send + Sync {
    fn now(&self) -> Instant;

    /// Block the calling thread for `d` of wall time.
    fn sleep(&self, d: Duration);
}

/// The real wall clock.
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl WallClock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        std::thread::sleep(d);
    }
}

/// Controllable clock for tests. `sleep` advances the clock instead of
/// blocking, so paced runs complete immediately while still observing the
/// amount of wall time the pacer asked for.
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
}

impl FakeClock {
    pub fn new() -> Self {
        FakeClock { current: Arc::new(Mutex::new(Instant::now())) }
    }

    pub fn advance(&self, d: Duration) {
        *self.current.lock() += d;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }
}

#[cfg(test)]
#[path = "wall_tests.rs"]
mod tests;
