// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event identity, firing priority, and handler-group tags.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::cmp::Ordering;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Globally unique identity of a scheduled event.
///
/// Keys are allocated from a single atomic counter, so allocation order is
/// the deterministic tiebreak for events sharing a timestamp and priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKey(u64);

impl EventKey {
    /// Allocate the next key.
    pub fn next() -> Self {
        EventKey(NEXT_KEY.fetch_add(1, AtomicOrdering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "evt-{}", self.0)
    }
}

/// Firing priority. Higher fires first among events at the same instant.
///
/// Backed by `f64` with `total_cmp` ordering, so every value (including
/// infinities) participates in a total order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(f64);

impl Priority {
    pub const ZERO: Priority = Priority(0.0);

    pub fn new(value: f64) -> Self {
        Priority(value)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::ZERO
    }
}

impl From<f64> for Priority {
    fn from(value: f64) -> Self {
        Priority(value)
    }
}

impl PartialEq for Priority {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for Priority {}

impl PartialOrd for Priority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Priority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Group tag for bulk rescission.
///
/// Callers that schedule families of related events (a fiber's wake-ups, a
/// metronome's ticks) stamp them with one tag so the whole family can be
/// rescinded in a single call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HandlerTag(SmolStr);

impl HandlerTag {
    pub fn new(tag: impl AsRef<str>) -> Self {
        HandlerTag(SmolStr::new(tag.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for HandlerTag {
    fn from(s: &str) -> Self {
        HandlerTag::new(s)
    }
}

impl fmt::Display for HandlerTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;
