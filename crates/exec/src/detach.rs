// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Detachable event controllers: cooperative fibers on the executive.
//!
//! Each in-flight detachable event owns one OS thread driven in strict
//! handoff with the executive thread through a pair of manual-reset gates.
//! Exactly one of the two runs at any instant, so from the model's point of
//! view this is still a single logical thread; the fiber only yields at its
//! explicit suspension points.
//!
//! A resumed fiber is scheduled as an ordinary event at the current clock,
//! so a suspend/resume round-trip never moves `Now` backwards.

use crate::error::{ExecError, HandlerError};
use crate::executive::{failure_message, EventContext, EventRequest, Executive, Record};
use crate::signal::{EventNotice, ExecSignal};
use parking_lot::Mutex;
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tw_core::{EventKey, Gate, HandlerTag, Priority, SimTime};

/// Fiber lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachState {
    /// The fiber is running (or about to run) a slice.
    Runnable,
    /// Parked at a suspension point.
    Suspended,
    /// The handler returned.
    Completed,
    /// The fiber was aborted; its abort handler has run.
    Aborted,
}

struct Flags {
    state: DetachState,
    aborting: bool,
    /// A resume arrived while the fiber was still runnable; consume it at
    /// the next suspend instead of parking.
    pending_resume: bool,
    /// Where the fiber last suspended, when diagnostics are enabled.
    suspended_at: Option<Backtrace>,
    /// Failure carried out of the handler, surfaced to the loop's policy.
    error: Option<String>,
}

pub struct DetachController {
    self_ref: Weak<DetachController>,
    exec: Weak<Executive>,
    key: EventKey,
    tag: HandlerTag,
    capture_backtrace: bool,
    flags: Mutex<Flags>,
    /// Closed while the fiber is parked; opened to run a slice.
    fiber_gate: Gate,
    /// Closed while the executive is parked; opened when the fiber yields.
    exec_gate: Gate,
    abort_handler: Mutex<Option<Box<dyn FnOnce() + Send>>>,
    notice: EventNotice,
}

impl DetachController {
    /// Spawn the fiber for `record` and run its first slice. Called on the
    /// executive thread at fire time.
    pub(crate) fn launch(
        exec: &Arc<Executive>,
        record: &Record,
        notice: EventNotice,
    ) -> Result<Arc<Self>, ExecError> {
        let dec = Arc::new_cyclic(|self_ref| DetachController {
            self_ref: self_ref.clone(),
            exec: Arc::downgrade(exec),
            key: record.key,
            tag: HandlerTag::new(format!("fiber:{}", record.key)),
            capture_backtrace: exec.config().capture_suspend_backtrace,
            flags: Mutex::new(Flags {
                state: DetachState::Runnable,
                aborting: false,
                pending_resume: false,
                suspended_at: None,
                error: None,
            }),
            fiber_gate: Gate::closed_gate(),
            exec_gate: Gate::closed_gate(),
            abort_handler: Mutex::new(None),
            notice,
        });
        exec.register_fiber(Arc::clone(&dec));

        let ctx = EventContext::new(Arc::clone(exec), record, Some(Arc::clone(&dec)));
        let handler = record.handler.clone();
        let fiber = Arc::clone(&dec);
        std::thread::Builder::new()
            .name(format!("{}-fiber-{}", exec.name(), record.key))
            .spawn(move || {
                fiber.fiber_gate.wait();
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| (handler)(&ctx)));
                fiber.complete(outcome);
            })
            .map_err(|source| ExecError::Spawn { what: "fiber", source })?;

        dec.run_slice();
        Ok(dec)
    }

    pub fn key(&self) -> EventKey {
        self.key
    }

    /// Tag stamped on every event this fiber schedules for itself, so an
    /// abort can sweep them in one rescission.
    pub fn tag(&self) -> &HandlerTag {
        &self.tag
    }

    pub fn state(&self) -> DetachState {
        self.flags.lock().state
    }

    pub fn is_done(&self) -> bool {
        matches!(self.state(), DetachState::Completed | DetachState::Aborted)
    }

    /// Backtrace captured at the last suspension, when enabled.
    pub fn suspended_at(&self) -> Option<String> {
        self.flags.lock().suspended_at.as_ref().map(|bt| bt.to_string())
    }

    /// Handler to run on the fiber if it is aborted.
    pub fn set_abort_handler(&self, handler: impl FnOnce() + Send + 'static) {
        *self.abort_handler.lock() = Some(Box::new(handler));
    }

    fn executive(&self) -> Result<Arc<Executive>, ExecError> {
        self.exec.upgrade().ok_or(ExecError::ExecutiveGone)
    }

    // ---------------------------------------------------------------
    // Handoff
    // ---------------------------------------------------------------

    /// Drive one slice of the fiber. Executive thread only. Returns once
    /// the fiber has either suspended again or finished.
    fn run_slice(&self) {
        self.fiber_gate.open();
        self.exec_gate.wait();
        self.exec_gate.close();
    }

    /// Park the fiber until another event resumes it. Fiber thread only.
    pub fn suspend(&self) -> Result<(), ExecError> {
        {
            let mut flags = self.flags.lock();
            if flags.aborting {
                drop(flags);
                return self.unwind_abort();
            }
            if flags.pending_resume {
                flags.pending_resume = false;
                return Ok(());
            }
            flags.state = DetachState::Suspended;
            if self.capture_backtrace {
                flags.suspended_at = Some(Backtrace::force_capture());
            }
        }
        // Re-arm our own gate before releasing the executive.
        self.fiber_gate.close();
        self.exec_gate.open();
        self.fiber_gate.wait();

        let aborting = {
            let mut flags = self.flags.lock();
            flags.state = DetachState::Runnable;
            flags.suspended_at = None;
            flags.aborting
        };
        if aborting {
            return self.unwind_abort();
        }
        Ok(())
    }

    /// Schedule a wake-up at `when`, then park. Fiber thread only.
    pub fn suspend_until(&self, exec: &Arc<Executive>, when: SimTime) -> Result<(), ExecError> {
        let weak = self.self_ref.clone();
        exec.request(
            EventRequest::new(when, move |ctx| {
                if let Some(dec) = weak.upgrade() {
                    dec.resume_now(ctx.exec())?;
                }
                Ok(())
            })
            .tag(self.tag.clone()),
        )?;
        self.suspend()
    }

    /// Run the abort handler on the fiber and unwind out of the handler.
    fn unwind_abort(&self) -> Result<(), ExecError> {
        if let Some(handler) = self.abort_handler.lock().take() {
            handler();
        }
        Err(ExecError::FiberAborted)
    }

    /// Fiber thread epilogue: record the outcome and hand control back.
    fn complete(&self, outcome: Result<Result<(), HandlerError>, Box<dyn std::any::Any + Send>>) {
        {
            let mut flags = self.flags.lock();
            flags.state = if flags.aborting { DetachState::Aborted } else { DetachState::Completed };
            // An abort unwinds with FiberAborted; that is not a failure.
            if flags.state == DetachState::Completed {
                flags.error = failure_message(outcome);
            }
        }
        self.exec_gate.open();
    }

    // ---------------------------------------------------------------
    // Resumption
    // ---------------------------------------------------------------

    /// Wake this fiber from another event. The next slice runs as an event
    /// at the current clock.
    pub fn resume(&self) -> Result<EventKey, ExecError> {
        self.resume_with_priority(Priority::ZERO)
    }

    /// As [`DetachController::resume`], ordering the wake-up against other
    /// same-instant events with `priority`.
    pub fn resume_with_priority(&self, priority: Priority) -> Result<EventKey, ExecError> {
        let exec = self.executive()?;
        self.schedule_resume(&exec, priority)
    }

    /// Request the wake-up event that will run the fiber's next slice.
    pub(crate) fn schedule_resume(
        &self,
        exec: &Arc<Executive>,
        priority: Priority,
    ) -> Result<EventKey, ExecError> {
        let weak = self.self_ref.clone();
        exec.request(
            EventRequest::new(exec.now(), move |ctx| {
                if let Some(dec) = weak.upgrade() {
                    dec.resume_now(ctx.exec())?;
                }
                Ok(())
            })
            .priority(priority)
            .tag(self.tag.clone()),
        )
    }

    /// Run the next slice. Executive thread only (called from wake events).
    pub(crate) fn resume_now(&self, exec: &Arc<Executive>) -> Result<(), HandlerError> {
        {
            let mut flags = self.flags.lock();
            match flags.state {
                DetachState::Suspended => {}
                DetachState::Runnable => {
                    // Resume raced the fiber before it parked; let the next
                    // suspend consume it instead.
                    flags.pending_resume = true;
                    return Ok(());
                }
                DetachState::Completed | DetachState::Aborted => {
                    tracing::debug!(key = %self.key, "resume of finished fiber ignored");
                    return Ok(());
                }
            }
        }
        self.run_slice();
        match self.finish_if_done(exec) {
            Some(message) => Err(ExecError::Handler { key: self.key, message }.into()),
            None => Ok(()),
        }
    }

    /// Abort the fiber: rescind its scheduled wake-ups, run its abort
    /// handler on the fiber, and unwind it. Idempotent. Executive thread
    /// (or post-run cleanup) only.
    pub fn abort(&self) -> Result<(), ExecError> {
        let exec = self.executive()?;
        {
            let mut flags = self.flags.lock();
            if matches!(flags.state, DetachState::Completed | DetachState::Aborted) {
                return Ok(());
            }
            if flags.aborting {
                return Ok(());
            }
            flags.aborting = true;
        }
        tracing::debug!(exec = %exec.name(), key = %self.key, "aborting fiber");
        exec.rescind_by_tag(&self.tag);
        let suspended = self.flags.lock().state == DetachState::Suspended;
        if suspended {
            self.run_slice();
            self.finish_if_done(&exec);
        }
        Ok(())
    }

    /// If the fiber has finished, publish completion and drop it from the
    /// registry. Returns the handler's failure message, if any, for the
    /// caller to route through the executive's failure policy.
    pub(crate) fn finish_if_done(&self, exec: &Arc<Executive>) -> Option<String> {
        let (state, error) = {
            let mut flags = self.flags.lock();
            (flags.state, flags.error.take())
        };
        match state {
            DetachState::Runnable | DetachState::Suspended => None,
            DetachState::Completed => {
                exec.remove_fiber(self.key);
                let mut notice = self.notice.clone();
                notice.now = exec.now();
                exec.signals().emit(&ExecSignal::EventCompleted(notice));
                exec.notify_done(self.key);
                error
            }
            DetachState::Aborted => {
                exec.remove_fiber(self.key);
                exec.signals().emit(&ExecSignal::EventAborted { key: self.key });
                exec.notify_done(self.key);
                None
            }
        }
    }
}

impl std::fmt::Debug for DetachController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetachController")
            .field("key", &self.key)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
#[path = "detach_tests.rs"]
mod tests;
