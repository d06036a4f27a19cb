// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic event helper.
//!
//! A metronome re-issues an event at `start, start+period, …` strictly
//! before `end`, calling every subscriber on each tick. Unsubscribing stops
//! future deliveries but does not cancel a callback already in flight.

use crate::error::ExecError;
use crate::executive::{EventContext, EventRequest, Executive};
use chrono::Duration;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tw_core::{HandlerTag, SimTime};

pub type TickFn = Arc<dyn Fn(&EventContext) + Send + Sync>;

/// Handle for unsubscribing a tick callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickToken(u64);

pub struct Metronome {
    self_ref: Weak<Metronome>,
    exec: Weak<Executive>,
    end: SimTime,
    period: Duration,
    daemon: bool,
    tag: HandlerTag,
    subscribers: Mutex<Vec<(TickToken, TickFn)>>,
    next_token: AtomicU64,
}

impl Metronome {
    /// Ticks hold the loop open until `end` (or cancellation).
    pub fn new(
        exec: &Arc<Executive>,
        start: SimTime,
        end: SimTime,
        period: Duration,
    ) -> Result<Arc<Self>, ExecError> {
        Self::create(exec, start, end, period, false)
    }

    /// Daemon ticks: the metronome observes the run without prolonging it.
    pub fn daemon(
        exec: &Arc<Executive>,
        start: SimTime,
        end: SimTime,
        period: Duration,
    ) -> Result<Arc<Self>, ExecError> {
        Self::create(exec, start, end, period, true)
    }

    fn create(
        exec: &Arc<Executive>,
        start: SimTime,
        end: SimTime,
        period: Duration,
        daemon: bool,
    ) -> Result<Arc<Self>, ExecError> {
        if period <= Duration::zero() {
            return Err(ExecError::InvalidPeriod);
        }
        // Distinct per metronome, so cancelling one never sweeps a sibling
        // on the same executive.
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let metronome = Arc::new_cyclic(|self_ref| Metronome {
            self_ref: self_ref.clone(),
            exec: Arc::downgrade(exec),
            end,
            period,
            daemon,
            tag: HandlerTag::new(format!(
                "metronome:{}:{}",
                exec.name(),
                SEQ.fetch_add(1, Ordering::Relaxed)
            )),
            subscribers: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(0),
        });
        if start < end {
            metronome.schedule(exec, start)?;
        }
        Ok(metronome)
    }

    pub fn subscribe(&self, tick: impl Fn(&EventContext) + Send + Sync + 'static) -> TickToken {
        let token = TickToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((token, Arc::new(tick)));
        token
    }

    /// Stop future deliveries to this subscriber. An in-flight callback is
    /// not interrupted.
    pub fn unsubscribe(&self, token: TickToken) -> bool {
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|(t, _)| *t != token);
        subs.len() != before
    }

    /// Rescind all scheduled ticks.
    pub fn cancel(&self) {
        if let Some(exec) = self.exec.upgrade() {
            exec.rescind_by_tag(&self.tag);
        }
    }

    fn schedule(&self, exec: &Arc<Executive>, at: SimTime) -> Result<(), ExecError> {
        let weak = self.self_ref.clone();
        let mut request = EventRequest::new(at, move |ctx| {
            if let Some(metronome) = weak.upgrade() {
                metronome.tick(ctx)?;
            }
            Ok(())
        })
        .tag(self.tag.clone());
        if self.daemon {
            request = request.daemon();
        }
        exec.request(request)?;
        Ok(())
    }

    fn tick(&self, ctx: &EventContext) -> Result<(), crate::error::HandlerError> {
        let subscribers: Vec<TickFn> =
            self.subscribers.lock().iter().map(|(_, f)| Arc::clone(f)).collect();
        for tick in subscribers {
            tick(ctx);
        }
        let next = ctx.when() + self.period;
        if next < self.end {
            self.schedule(ctx.exec(), next)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "metronome_tests.rs"]
mod tests;
