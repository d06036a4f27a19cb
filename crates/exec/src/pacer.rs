// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wall-clock pacing of virtual-time advancement.
//!
//! A pacer holds `(virtual elapsed) / (wall elapsed)` near `10^scale` by
//! sleeping the executive thread whenever the clock is about to advance,
//! and raises render ticks at `frame_rate` per wall second from a helper
//! thread while the run is live.

use crate::executive::{ExecState, Executive};
use crate::signal::ExecSignal;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tw_core::{SimTime, SystemClock, WallClock};

pub type RenderFn = Arc<dyn Fn(SimTime) + Send + Sync>;

/// Handle for unsubscribing a render callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderToken(u64);

struct Anchor {
    wall: Instant,
    virt: SimTime,
}

pub struct Pacer {
    self_ref: Weak<Pacer>,
    scale: f64,
    frame_rate: u32,
    clock: Arc<dyn WallClock>,
    anchor: Mutex<Option<Anchor>>,
    subscribers: Mutex<Vec<(RenderToken, RenderFn)>>,
    next_token: AtomicU64,
}

impl Pacer {
    /// `scale` is the base-10 exponent of the virtual/wall ratio: 0 is real
    /// time, 1 is ten times faster than wall, -1 ten times slower.
    pub fn new(scale: f64, frame_rate: u32) -> Arc<Self> {
        Self::with_clock(scale, frame_rate, Arc::new(SystemClock))
    }

    pub fn with_clock(scale: f64, frame_rate: u32, clock: Arc<dyn WallClock>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Pacer {
            self_ref: self_ref.clone(),
            scale,
            frame_rate,
            clock,
            anchor: Mutex::new(None),
            subscribers: Mutex::new(Vec::new()),
            next_token: AtomicU64::new(0),
        })
    }

    /// Attach to an executive. Pacing applies to every subsequent run until
    /// the returned token is unsubscribed from the executive's signals.
    pub fn attach(&self, exec: &Arc<Executive>) -> crate::signal::SignalToken {
        let pacer = self.self_ref.clone();
        let weak_exec = Arc::downgrade(exec);
        exec.signals().subscribe(Arc::new(move |signal| {
            let Some(pacer) = pacer.upgrade() else { return };
            match signal {
                ExecSignal::Started { .. } => {
                    *pacer.anchor.lock() = None;
                    pacer.spawn_render_thread(&weak_exec);
                }
                ExecSignal::ClockAboutToChange { from, to } => pacer.pace(*from, *to),
                ExecSignal::RolledBack { .. }
                | ExecSignal::Finished
                | ExecSignal::Stopped
                | ExecSignal::Reset => {
                    *pacer.anchor.lock() = None;
                }
                _ => {}
            }
        }))
    }

    pub fn subscribe_render(&self, render: impl Fn(SimTime) + Send + Sync + 'static) -> RenderToken {
        let token = RenderToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        self.subscribers.lock().push((token, Arc::new(render)));
        token
    }

    pub fn unsubscribe_render(&self, token: RenderToken) -> bool {
        let mut subs = self.subscribers.lock();
        let before = subs.len();
        subs.retain(|(t, _)| *t != token);
        subs.len() != before
    }

    /// Sleep the executive thread so the wall clock catches up with the
    /// virtual advancement `from -> to`.
    ///
    /// The first advance of a run (the jump from the epoch to model time)
    /// only anchors; pacing applies to advancement after that.
    fn pace(&self, _from: SimTime, to: SimTime) {
        let mut anchor = self.anchor.lock();
        let Some(anchor) = anchor.as_mut() else {
            *anchor = Some(Anchor { wall: self.clock.now(), virt: to });
            return;
        };
        let virt_elapsed = (to - anchor.virt).num_milliseconds() as f64 / 1000.0;
        if virt_elapsed <= 0.0 {
            return;
        }
        let target_wall = virt_elapsed / 10f64.powf(self.scale);
        let actual_wall = self.clock.now().duration_since(anchor.wall).as_secs_f64();
        if target_wall > actual_wall {
            self.clock.sleep(Duration::from_secs_f64(target_wall - actual_wall));
        }
    }

    fn spawn_render_thread(&self, exec: &Weak<Executive>) {
        if self.frame_rate == 0 {
            return;
        }
        let pacer = self.self_ref.clone();
        let exec = exec.clone();
        let clock = Arc::clone(&self.clock);
        let frame = Duration::from_secs_f64(1.0 / f64::from(self.frame_rate));
        let name = exec
            .upgrade()
            .map(|e| format!("{}-render", e.name()))
            .unwrap_or_else(|| "render".to_string());
        let spawned = std::thread::Builder::new().name(name).spawn(move || loop {
            clock.sleep(frame);
            let Some(pacer) = pacer.upgrade() else { break };
            let Some(exec) = exec.upgrade() else { break };
            if !matches!(exec.state(), ExecState::Running | ExecState::Paused) {
                break;
            }
            let now = exec.now();
            let subscribers: Vec<RenderFn> =
                pacer.subscribers.lock().iter().map(|(_, f)| Arc::clone(f)).collect();
            for render in subscribers {
                render(now);
            }
        });
        if let Err(err) = spawned {
            tracing::warn!(error = %err, "failed to spawn render thread");
        }
    }
}

#[cfg(test)]
#[path = "pacer_tests.rs"]
mod tests;
