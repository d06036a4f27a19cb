// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lifecycle signals published by the executive.
//!
//! One enum, one subscriber registry. Subscribers run synchronously on the
//! thread that produced the signal; a panic inside a subscriber is treated
//! as a lifecycle-hook failure and deliberately not contained.

use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tw_core::{EventKey, EventKind, Priority, SimTime, UserData};

/// Everything observable about an event at fire/completion time.
#[derive(Clone)]
pub struct EventNotice {
    pub key: EventKey,
    /// Scheduled firing time (may trail `now` for clamped requests).
    pub when: SimTime,
    /// The clock at the moment the signal was published.
    pub now: SimTime,
    pub priority: Priority,
    pub kind: EventKind,
    pub daemon: bool,
    pub user_data: Option<UserData>,
}

impl fmt::Debug for EventNotice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventNotice")
            .field("key", &self.key)
            .field("when", &self.when)
            .field("now", &self.now)
            .field("priority", &self.priority)
            .field("kind", &self.kind)
            .field("daemon", &self.daemon)
            .field("user_data", &self.user_data.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum ExecSignal {
    Started { run_number: u64 },
    Stopped,
    Finished,
    Reset,
    Paused,
    Resumed,
    Aborted,
    ClockAboutToChange { from: SimTime, to: SimTime },
    EventAboutToFire(EventNotice),
    EventCompleted(EventNotice),
    EventAborted { key: EventKey },
    RolledBack { to: SimTime },
}

impl ExecSignal {
    /// Stable short name, handy for log fields and tests.
    pub fn name(&self) -> &'static str {
        match self {
            ExecSignal::Started { .. } => "started",
            ExecSignal::Stopped => "stopped",
            ExecSignal::Finished => "finished",
            ExecSignal::Reset => "reset",
            ExecSignal::Paused => "paused",
            ExecSignal::Resumed => "resumed",
            ExecSignal::Aborted => "aborted",
            ExecSignal::ClockAboutToChange { .. } => "clock_about_to_change",
            ExecSignal::EventAboutToFire(_) => "event_about_to_fire",
            ExecSignal::EventCompleted(_) => "event_completed",
            ExecSignal::EventAborted { .. } => "event_aborted",
            ExecSignal::RolledBack { .. } => "rolled_back",
        }
    }
}

pub type SignalFn = Arc<dyn Fn(&ExecSignal) + Send + Sync>;

/// Handle for unsubscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalToken(u64);

#[derive(Default)]
pub struct SignalHub {
    subscribers: Mutex<Vec<(SignalToken, SignalFn)>>,
    next: AtomicU64,
}

impl SignalHub {
    pub fn new() -> Self {
        SignalHub::default()
    }

    pub fn subscribe(&self, subscriber: SignalFn) -> SignalToken {
        let token = SignalToken(self.next.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((token, subscriber));
        token
    }

    pub fn unsubscribe(&self, token: SignalToken) -> bool {
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|(t, _)| *t != token);
        subs.len() != before
    }

    pub fn emit(&self, signal: &ExecSignal) {
        // Snapshot so subscribers may (un)subscribe reentrantly.
        let subs: Vec<SignalFn> =
            self.subscribers.lock().iter().map(|(_, f)| Arc::clone(f)).collect();
        for f in subs {
            f(signal);
        }
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
