// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Virtual timestamps for the simulation clock.
//!
//! `SimTime` is the authoritative notion of "when" inside a running
//! executive. It has nothing to do with wall time; the kernel advances it
//! from event to event and, in the parallel variant, may move it backwards
//! through an explicit rollback.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub};

/// A point on the virtual timeline.
///
/// Wraps a UTC timestamp so models can schedule against calendar dates,
/// while the kernel itself only ever compares and orders.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(DateTime<Utc>);

impl SimTime {
    /// The earliest representable instant. A freshly constructed (or reset)
    /// executive sits here until its first event advances the clock.
    pub const EPOCH_MIN: SimTime = SimTime(DateTime::<Utc>::MIN_UTC);

    pub fn new(at: DateTime<Utc>) -> Self {
        SimTime(at)
    }

    /// Build a timestamp from calendar components. Returns `None` for
    /// out-of-range or ambiguous inputs.
    pub fn from_ymd_hms(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec).single().map(SimTime)
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Overflow-checked addition; `None` when the result leaves the
    /// representable range.
    pub fn checked_add(self, delta: Duration) -> Option<Self> {
        self.0.checked_add_signed(delta).map(SimTime)
    }

    /// Signed distance from `earlier` to `self`.
    pub fn since(self, earlier: SimTime) -> Duration {
        self.0.signed_duration_since(earlier.0)
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, delta: Duration) -> SimTime {
        SimTime(self.0 + delta)
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, delta: Duration) {
        self.0 = self.0 + delta;
    }
}

impl Sub<Duration> for SimTime {
    type Output = SimTime;

    fn sub(self, delta: Duration) -> SimTime {
        SimTime(self.0 - delta)
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, earlier: SimTime) -> Duration {
        self.since(earlier)
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimTime({})", self.0.to_rfc3339())
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
#[path = "time_tests.rs"]
mod tests;
