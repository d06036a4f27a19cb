// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The executive: a single-threaded event loop over virtual time.
//!
//! Producers on any thread stage requests into a lock-protected buffer; the
//! loop drains the buffer at event boundaries, pops the minimum of the
//! future event set, advances the clock, and dispatches. Detachable events
//! hand off to fibers (see [`crate::detach`]); everything else runs inline.
//!
//! The same type carries the parallel-variant capabilities: when
//! `retain_past_events` is set the executive keeps a history and can be
//! rolled back to an earlier clock, and its gates and published status let
//! a coordinator quiesce it between events.

use crate::config::ExecConfig;
use crate::detach::DetachController;
use crate::error::{ExecError, HandlerError};
use crate::signal::{EventNotice, ExecSignal, SignalHub};
use parking_lot::{Condvar, Mutex};
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tw_core::{
    EventKey, EventKind, EventRecord, FutureEventSet, Gate, HandlerTag, Priority, SimTime,
    UserData,
};

/// Event handlers receive the firing context and may fail; the loop applies
/// the configured failure policy.
pub type EventHandler = Arc<dyn Fn(&EventContext) -> Result<(), HandlerError> + Send + Sync>;

pub(crate) type Record = EventRecord<EventHandler>;

/// Executive lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Stopped,
    Running,
    Paused,
    Finished,
}

impl ExecState {
    fn name(self) -> &'static str {
        match self {
            ExecState::Stopped => "stopped",
            ExecState::Running => "running",
            ExecState::Paused => "paused",
            ExecState::Finished => "finished",
        }
    }
}

/// Where the executive thread currently is, published for coordinators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecStatus {
    /// Not running (never started, finished, or stopped).
    Idle,
    /// Between events, making progress.
    InLoop,
    /// Parked at the exec-time gate.
    AtExecGate,
    /// Parked at the rollback gate.
    AtRollbackGate,
    /// Inside an event call (possibly parked on the pending-read gate).
    InEvent,
}

struct StatusCell {
    state: Mutex<ExecStatus>,
    cond: Condvar,
}

impl StatusCell {
    fn new() -> Self {
        StatusCell { state: Mutex::new(ExecStatus::Idle), cond: Condvar::new() }
    }

    fn set(&self, status: ExecStatus) {
        *self.state.lock() = status;
        self.cond.notify_all();
    }

    fn get(&self) -> ExecStatus {
        *self.state.lock()
    }

    fn wait_for(&self, mut pred: impl FnMut(ExecStatus) -> bool, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        let deadline = std::time::Instant::now() + timeout;
        while !pred(*state) {
            if self.cond.wait_until(&mut state, deadline).timed_out() {
                return pred(*state);
            }
        }
        true
    }
}

/// A fired event retained for rollback.
struct PastRecord {
    fired_at: SimTime,
    record: Record,
}

struct Inner {
    state: ExecState,
    now: SimTime,
    future: FutureEventSet<EventHandler>,
    pending: Vec<Record>,
    past: Vec<PastRecord>,
    /// Non-daemon records across `pending` and `future`.
    non_daemon: usize,
    event_count: u64,
    run_number: u64,
    paused: bool,
    /// Key of the event currently being fired, if any.
    current: Option<EventKey>,
    /// A rollback rebased the counters while an event was in flight; that
    /// event's own post-fire bookkeeping must not apply again.
    rolled_back_in_flight: bool,
}

struct JoinWaiter {
    remaining: Mutex<usize>,
    fiber: Weak<DetachController>,
    priority: Priority,
}

/// How a finished run left the loop.
enum RunEnd {
    Finished,
    Stopped,
    Aborted,
}

enum LoopStep {
    Fire(Record),
    Rollback(SimTime),
    Drained,
}

pub struct Executive {
    self_ref: Weak<Executive>,
    cfg: ExecConfig,
    inner: Mutex<Inner>,
    pause_cond: Condvar,
    signals: SignalHub,
    started_once: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    fibers: Mutex<HashMap<EventKey, Arc<DetachController>>>,
    async_inflight: Mutex<HashSet<EventKey>>,
    joins: Mutex<HashMap<EventKey, Vec<Arc<JoinWaiter>>>>,
    post_rollback: Mutex<Vec<Box<dyn FnOnce(&Arc<Executive>) + Send>>>,
    exec_gate: Gate,
    rollback_gate: Gate,
    pending_read_gate: Gate,
    status: StatusCell,
    stop_requested: AtomicBool,
    abort_requested: AtomicBool,
}

impl Executive {
    pub fn new(cfg: ExecConfig) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Executive {
            self_ref: self_ref.clone(),
            cfg,
            inner: Mutex::new(Inner {
                state: ExecState::Stopped,
                now: SimTime::EPOCH_MIN,
                future: FutureEventSet::new(),
                pending: Vec::new(),
                past: Vec::new(),
                non_daemon: 0,
                event_count: 0,
                run_number: 0,
                paused: false,
                current: None,
                rolled_back_in_flight: false,
            }),
            pause_cond: Condvar::new(),
            signals: SignalHub::new(),
            started_once: Mutex::new(Vec::new()),
            fibers: Mutex::new(HashMap::new()),
            async_inflight: Mutex::new(HashSet::new()),
            joins: Mutex::new(HashMap::new()),
            post_rollback: Mutex::new(Vec::new()),
            exec_gate: Gate::open_gate(),
            rollback_gate: Gate::open_gate(),
            pending_read_gate: Gate::open_gate(),
            status: StatusCell::new(),
            stop_requested: AtomicBool::new(false),
            abort_requested: AtomicBool::new(false),
        })
    }

    pub fn named(name: impl AsRef<str>) -> Arc<Self> {
        Executive::new(ExecConfig::named(name))
    }

    /// A strong handle to ourselves, for contexts and scheduled closures.
    fn strong(&self) -> Arc<Executive> {
        match self.self_ref.upgrade() {
            Some(exec) => exec,
            // A method is executing on &self, so an owner exists.
            None => unreachable!("executive self-reference expired while in use"),
        }
    }

    pub fn config(&self) -> &ExecConfig {
        &self.cfg
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }

    pub fn now(&self) -> SimTime {
        self.inner.lock().now
    }

    pub fn state(&self) -> ExecState {
        self.inner.lock().state
    }

    /// Events fired so far in the current run.
    pub fn event_count(&self) -> u64 {
        self.inner.lock().event_count
    }

    /// Number of completed and in-progress runs. Survives `reset`.
    pub fn run_number(&self) -> u64 {
        self.inner.lock().run_number
    }

    /// Pending (staged or future) records that hold the loop open.
    pub fn non_daemon_pending(&self) -> usize {
        self.inner.lock().non_daemon
    }

    /// Total pending records, daemon or not.
    pub fn pending_len(&self) -> usize {
        let inner = self.inner.lock();
        inner.future.len() + inner.pending.len()
    }

    pub fn signals(&self) -> &SignalHub {
        &self.signals
    }

    /// Register a hook that runs exactly once, at the next start, before the
    /// recurring `Started` signal.
    pub fn on_started_once(&self, hook: impl FnOnce() + Send + 'static) {
        self.started_once.lock().push(Box::new(hook));
    }

    /// In-flight detachable controller for `key`, if one exists.
    pub fn fiber(&self, key: EventKey) -> Option<Arc<DetachController>> {
        self.fibers.lock().get(&key).cloned()
    }

    /// Resume the suspended detachable event `key` at the current clock.
    /// Returns the key of the scheduled wake-up event.
    pub fn resume_fiber(&self, key: EventKey) -> Result<EventKey, ExecError> {
        match self.fiber(key) {
            Some(dec) => dec.resume(),
            None => Err(ExecError::EventKeyUnknown(key)),
        }
    }

    // ---------------------------------------------------------------
    // Requesting and rescinding
    // ---------------------------------------------------------------

    /// Stage a request. Thread-safe; drained into the future set at the
    /// next loop boundary (or at `start`).
    pub fn request(&self, req: EventRequest) -> Result<EventKey, ExecError> {
        let mut inner = self.inner.lock();
        let mut when = req.when;
        if when < inner.now {
            if self.cfg.ignore_causality_violations {
                when = inner.now;
            } else {
                return Err(ExecError::CausalityViolation {
                    exec: self.cfg.name.clone(),
                    requested: when,
                    now: inner.now,
                });
            }
        }
        let key = EventKey::next();
        let record = EventRecord {
            key,
            when,
            priority: req.priority,
            kind: req.kind,
            daemon: req.daemon,
            added_when: inner.now,
            tag: req.tag,
            handler: req.handler,
            user_data: req.user_data,
            revocation: req.revocation,
        };
        if !record.daemon {
            inner.non_daemon += 1;
        }
        inner.pending.push(record);
        Ok(key)
    }

    /// Request a synchronous, priority-zero event.
    pub fn request_event<F>(&self, when: SimTime, handler: F) -> Result<EventKey, ExecError>
    where
        F: Fn(&EventContext) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.request(EventRequest::new(when, handler))
    }

    /// Same as [`Executive::request_event`] but the event's presence does
    /// not keep the loop alive.
    pub fn request_daemon_event<F>(&self, when: SimTime, handler: F) -> Result<EventKey, ExecError>
    where
        F: Fn(&EventContext) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.request(EventRequest::new(when, handler).daemon())
    }

    /// Remove a pending event before it fires. Idempotent; returns `false`
    /// if the key is unknown or already fired. A removed record's
    /// revocation action runs exactly once, and joins on it are satisfied.
    pub fn rescind(&self, key: EventKey) -> bool {
        let removed = {
            let mut inner = self.inner.lock();
            let record = match inner.pending.iter().position(|r| r.key == key) {
                Some(i) => Some(inner.pending.remove(i)),
                None => inner.future.remove(key),
            };
            if let Some(rec) = &record {
                if !rec.daemon {
                    inner.non_daemon -= 1;
                }
            }
            record
        };
        match removed {
            Some(record) => {
                tracing::debug!(exec = %self.cfg.name, key = %key, "event rescinded");
                self.discard(record);
                true
            }
            None => false,
        }
    }

    /// Rescind every pending event carrying `tag`. Returns how many were
    /// removed.
    pub fn rescind_by_tag(&self, tag: &HandlerTag) -> usize {
        self.rescind_if(|rec| rec.tag.as_ref() == Some(tag))
    }

    /// Rescind every pending event matching the predicate.
    pub fn rescind_if(
        &self,
        mut pred: impl FnMut(&EventRecord<EventHandler>) -> bool,
    ) -> usize {
        let removed = {
            let mut inner = self.inner.lock();
            let mut removed: Vec<Record> = Vec::new();
            let mut staged = Vec::new();
            for rec in inner.pending.drain(..) {
                if pred(&rec) {
                    removed.push(rec);
                } else {
                    staged.push(rec);
                }
            }
            inner.pending = staged;
            removed.extend(inner.future.remove_if(&mut pred));
            for rec in &removed {
                if !rec.daemon {
                    inner.non_daemon -= 1;
                }
            }
            removed
        };
        let count = removed.len();
        for record in removed {
            self.discard(record);
        }
        count
    }

    /// Run the revocation action and satisfy joins for a record discarded
    /// unfired.
    fn discard(&self, record: Record) {
        if let Some(revocation) = &record.revocation {
            revocation();
        }
        self.notify_done(record.key);
    }

    // ---------------------------------------------------------------
    // Run control
    // ---------------------------------------------------------------

    fn bad_state(
        &self,
        state: ExecState,
        operation: &'static str,
        required: &'static str,
    ) -> ExecError {
        ExecError::BadState {
            exec: self.cfg.name.clone(),
            state: state.name(),
            operation,
            required,
        }
    }

    /// Run the event loop on the calling thread until the non-daemon set
    /// drains or a stop is requested.
    pub fn start(&self) -> Result<(), ExecError> {
        let run_number = {
            let mut inner = self.inner.lock();
            if inner.state != ExecState::Stopped {
                return Err(self.bad_state(inner.state, "start", "stopped"));
            }
            inner.state = ExecState::Running;
            inner.run_number += 1;
            inner.event_count = 0;
            // Anything already below the clock was stale before this run.
            let now = inner.now;
            let stale = inner.future.remove_if(|rec| rec.when < now);
            for rec in &stale {
                if !rec.daemon {
                    inner.non_daemon -= 1;
                }
            }
            if !stale.is_empty() {
                tracing::debug!(
                    exec = %self.cfg.name,
                    dropped = stale.len(),
                    "dropped stale events at start"
                );
            }
            inner.run_number
        };
        self.stop_requested.store(false, Ordering::SeqCst);
        self.abort_requested.store(false, Ordering::SeqCst);
        self.status.set(ExecStatus::InLoop);
        tracing::info!(exec = %self.cfg.name, run_number, "executive started");

        let once: Vec<Box<dyn FnOnce() + Send>> = std::mem::take(&mut *self.started_once.lock());
        for hook in once {
            hook();
        }
        self.signals.emit(&ExecSignal::Started { run_number });

        let end = self.run_loop();
        self.abort_orphans();
        self.status.set(ExecStatus::Idle);

        match end {
            Ok(RunEnd::Finished) => {
                self.inner.lock().state = ExecState::Finished;
                tracing::info!(
                    exec = %self.cfg.name,
                    events = self.event_count(),
                    now = %self.now(),
                    "executive finished"
                );
                self.signals.emit(&ExecSignal::Finished);
                Ok(())
            }
            Ok(RunEnd::Stopped) => {
                self.inner.lock().state = ExecState::Stopped;
                tracing::info!(exec = %self.cfg.name, "executive stopped");
                self.signals.emit(&ExecSignal::Stopped);
                Ok(())
            }
            Ok(RunEnd::Aborted) => {
                self.inner.lock().state = ExecState::Stopped;
                tracing::warn!(exec = %self.cfg.name, "executive aborted");
                self.signals.emit(&ExecSignal::Aborted);
                Ok(())
            }
            Err(err) => {
                self.inner.lock().state = ExecState::Stopped;
                tracing::error!(exec = %self.cfg.name, error = %err, "executive run failed");
                self.signals.emit(&ExecSignal::Aborted);
                Err(err)
            }
        }
    }

    fn run_loop(&self) -> Result<RunEnd, ExecError> {
        loop {
            // Coordination barriers between events. Both are open gates
            // outside parallel runs, so this is a fast path.
            self.status.set(ExecStatus::AtExecGate);
            self.exec_gate.wait();
            self.status.set(ExecStatus::AtRollbackGate);
            self.rollback_gate.wait();
            self.status.set(ExecStatus::InLoop);

            // Pause monitor.
            {
                let mut inner = self.inner.lock();
                while inner.paused && !self.stop_requested.load(Ordering::SeqCst) {
                    self.pause_cond.wait(&mut inner);
                }
            }

            if self.abort_requested.load(Ordering::SeqCst) {
                return Ok(RunEnd::Aborted);
            }
            if self.stop_requested.load(Ordering::SeqCst) {
                return Ok(RunEnd::Stopped);
            }

            let step = {
                let mut inner = self.inner.lock();
                Self::drain(&mut inner);
                if inner.non_daemon == 0 {
                    LoopStep::Drained
                } else {
                    let next_when = inner.future.peek().map(|r| r.when);
                    match next_when {
                        None => LoopStep::Drained,
                        Some(when) if when < inner.now && self.cfg.retain_past_events => {
                            LoopStep::Rollback(when)
                        }
                        Some(_) => match inner.future.pop_first() {
                            Some(record) => {
                                inner.current = Some(record.key);
                                LoopStep::Fire(record)
                            }
                            None => LoopStep::Drained,
                        },
                    }
                }
            };

            match step {
                LoopStep::Drained => return Ok(RunEnd::Finished),
                LoopStep::Rollback(to) => {
                    self.perform_rollback(to)?;
                }
                LoopStep::Fire(record) => self.fire(record)?,
            }
        }
    }

    /// Move staged requests into the future set.
    fn drain(inner: &mut Inner) {
        let Inner { pending, future, .. } = inner;
        for record in pending.drain(..) {
            future.insert(record);
        }
    }

    fn fire(&self, record: Record) -> Result<(), ExecError> {
        {
            let now = self.now();
            if record.when > now {
                self.signals.emit(&ExecSignal::ClockAboutToChange { from: now, to: record.when });
                self.inner.lock().now = record.when;
            }
        }
        let fired_at = self.now();
        let notice = EventNotice {
            key: record.key,
            when: record.when,
            now: fired_at,
            priority: record.priority,
            kind: record.kind,
            daemon: record.daemon,
            user_data: record.user_data.clone(),
        };
        tracing::debug!(
            exec = %self.cfg.name,
            key = %record.key,
            kind = %record.kind,
            now = %fired_at,
            "firing event"
        );
        self.signals.emit(&ExecSignal::EventAboutToFire(notice.clone()));
        self.status.set(ExecStatus::InEvent);
        let result = match record.kind {
            EventKind::Synchronous => self.fire_synchronous(&record, &notice),
            EventKind::Detachable => self.fire_detachable(&record, &notice),
            EventKind::Asynchronous => self.fire_asynchronous(&record, &notice),
        };
        self.status.set(ExecStatus::InLoop);
        result
    }

    fn fire_synchronous(&self, record: &Record, notice: &EventNotice) -> Result<(), ExecError> {
        let ctx = EventContext::new(self.strong(), record, None);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| (record.handler)(&ctx)));
        self.record_fired(record, notice.now);
        self.signals.emit(&ExecSignal::EventCompleted(notice.clone()));
        self.notify_done(record.key);
        match failure_message(outcome) {
            None => Ok(()),
            Some(message) => self.handler_failed(record.key, message),
        }
    }

    fn fire_detachable(&self, record: &Record, notice: &EventNotice) -> Result<(), ExecError> {
        let exec = self.strong();
        let dec = DetachController::launch(&exec, record, notice.clone())?;
        self.record_fired(record, notice.now);
        if let Some(message) = dec.finish_if_done(&exec) {
            return self.handler_failed(record.key, message);
        }
        Ok(())
    }

    fn fire_asynchronous(&self, record: &Record, notice: &EventNotice) -> Result<(), ExecError> {
        self.async_inflight.lock().insert(record.key);
        self.record_fired(record, notice.now);
        let exec = self.strong();
        let ctx = EventContext::new(self.strong(), record, None);
        let handler = record.handler.clone();
        let notice = notice.clone();
        let key = record.key;
        std::thread::Builder::new()
            .name(format!("{}-async-{}", self.cfg.name, key))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| (handler)(&ctx)));
                exec.async_inflight.lock().remove(&key);
                exec.signals.emit(&ExecSignal::EventCompleted(notice));
                exec.notify_done(key);
                if let Some(message) = failure_message(outcome) {
                    tracing::warn!(
                        exec = %exec.cfg.name,
                        key = %key,
                        error = %message,
                        "asynchronous handler failed"
                    );
                }
            })
            .map_err(|source| ExecError::Spawn { what: "asynchronous event", source })?;
        Ok(())
    }

    /// Post-fire bookkeeping: counters, history, and the `current` marker.
    fn record_fired(&self, record: &Record, fired_at: SimTime) {
        let mut inner = self.inner.lock();
        inner.event_count += 1;
        if inner.rolled_back_in_flight {
            // A rollback already rebased the counters and reinstated this
            // record into the future set; this firing is logically undone.
            inner.rolled_back_in_flight = false;
        } else {
            if !record.daemon {
                inner.non_daemon -= 1;
            }
            if self.cfg.retain_past_events {
                inner.past.push(PastRecord { fired_at, record: record.clone() });
            }
        }
        inner.current = None;
    }

    /// Apply the configured failure policy to an error escaping a handler.
    pub(crate) fn handler_failed(&self, key: EventKey, message: String) -> Result<(), ExecError> {
        if self.cfg.swallow_handler_failures {
            tracing::warn!(
                exec = %self.cfg.name,
                key = %key,
                error = %message,
                "event handler failed; continuing"
            );
            Ok(())
        } else {
            Err(ExecError::Handler { key, message })
        }
    }

    /// Abort any fiber still suspended when the loop exits.
    fn abort_orphans(&self) {
        let orphans: Vec<Arc<DetachController>> = self.fibers.lock().values().cloned().collect();
        for dec in orphans {
            tracing::warn!(
                exec = %self.cfg.name,
                key = %dec.key(),
                "aborting orphaned fiber at run end"
            );
            if let Err(err) = dec.abort() {
                tracing::warn!(exec = %self.cfg.name, key = %dec.key(), error = %err, "orphan abort failed");
            }
        }
    }

    /// Request a cooperative stop; the loop exits at the next boundary.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
        self.pause_cond.notify_all();
    }

    /// Abort the run. The loop exits at the next boundary and the executive
    /// lands in `Stopped` with an `Aborted` signal.
    pub fn abort(&self) {
        self.abort_requested.store(true, Ordering::SeqCst);
        self.stop_requested.store(true, Ordering::SeqCst);
        self.pause_cond.notify_all();
    }

    /// Hold the loop between events until `resume`.
    pub fn pause(&self) -> Result<(), ExecError> {
        {
            let mut inner = self.inner.lock();
            if inner.state != ExecState::Running {
                return Err(self.bad_state(inner.state, "pause", "running"));
            }
            inner.paused = true;
            inner.state = ExecState::Paused;
        }
        self.signals.emit(&ExecSignal::Paused);
        Ok(())
    }

    /// Release a paused loop.
    pub fn resume(&self) -> Result<(), ExecError> {
        {
            let mut inner = self.inner.lock();
            if inner.state != ExecState::Paused {
                return Err(self.bad_state(inner.state, "resume", "paused"));
            }
            inner.paused = false;
            inner.state = ExecState::Running;
        }
        self.pause_cond.notify_all();
        self.signals.emit(&ExecSignal::Resumed);
        Ok(())
    }

    /// Clear all schedule state and return to `Stopped` at the epoch.
    /// Only `run_number` survives.
    pub fn reset(&self) -> Result<(), ExecError> {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                ExecState::Stopped | ExecState::Finished => {}
                state => return Err(self.bad_state(state, "reset", "stopped or finished")),
            }
            inner.future.clear();
            inner.pending.clear();
            inner.past.clear();
            inner.non_daemon = 0;
            inner.event_count = 0;
            inner.now = SimTime::EPOCH_MIN;
            inner.paused = false;
            inner.current = None;
            inner.rolled_back_in_flight = false;
            inner.state = ExecState::Stopped;
        }
        self.joins.lock().clear();
        self.post_rollback.lock().clear();
        self.stop_requested.store(false, Ordering::SeqCst);
        self.abort_requested.store(false, Ordering::SeqCst);
        tracing::info!(exec = %self.cfg.name, "executive reset");
        self.signals.emit(&ExecSignal::Reset);
        Ok(())
    }

    // ---------------------------------------------------------------
    // Rollback (parallel variant)
    // ---------------------------------------------------------------

    /// Restore the executive to virtual time `to`.
    ///
    /// Future events enqueued at or after `to` are revoked (their
    /// revocation actions run); fired events with `when >= to` move back
    /// into the future set unless they too were enqueued after the target.
    /// Idempotent for a fixed `to`.
    pub fn perform_rollback(&self, to: SimTime) -> Result<(), ExecError> {
        if !self.cfg.retain_past_events {
            return Err(ExecError::RollbackImpossible { exec: self.cfg.name.clone(), to });
        }
        if !self.fibers.lock().is_empty() {
            tracing::warn!(
                exec = %self.cfg.name,
                "rollback with suspended fibers in flight; fibers are not rolled back"
            );
        }
        let discarded = {
            let mut inner = self.inner.lock();
            Self::drain(&mut inner);
            let mut discarded = inner.future.remove_if(|rec| rec.added_when >= to);
            let past = std::mem::take(&mut inner.past);
            for entry in past {
                if entry.record.when >= to {
                    if entry.record.added_when >= to {
                        discarded.push(entry.record);
                    } else {
                        inner.future.insert(entry.record);
                    }
                } else {
                    inner.past.push(entry);
                }
            }
            inner.non_daemon = inner.future.non_daemon_len();
            if inner.current.is_some() {
                inner.rolled_back_in_flight = true;
            }
            if to <= inner.now {
                inner.now = to;
            } else {
                tracing::warn!(
                    exec = %self.cfg.name,
                    to = %to,
                    now = %inner.now,
                    "rollback target is ahead of the clock; clock unchanged"
                );
            }
            discarded
        };
        tracing::info!(exec = %self.cfg.name, to = %to, revoked = discarded.len(), "rolled back");
        for record in discarded {
            self.discard(record);
        }
        self.signals.emit(&ExecSignal::RolledBack { to });
        let deferred: Vec<Box<dyn FnOnce(&Arc<Executive>) + Send>> =
            std::mem::take(&mut *self.post_rollback.lock());
        if !deferred.is_empty() {
            let exec = self.strong();
            for action in deferred {
                action(&exec);
            }
        }
        Ok(())
    }

    /// Queue an action to run after the next rollback completes.
    pub fn defer_post_rollback(&self, action: impl FnOnce(&Arc<Executive>) + Send + 'static) {
        self.post_rollback.lock().push(Box::new(action));
    }

    /// Drop retained history that can never be re-fired because every
    /// executive on the shared timeline has advanced past it.
    pub fn prune_past(&self, before: SimTime) {
        let mut inner = self.inner.lock();
        inner.past.retain(|entry| entry.record.when >= before);
    }

    /// Retained history length (for coordinators and tests).
    pub fn past_len(&self) -> usize {
        self.inner.lock().past.len()
    }

    // ---------------------------------------------------------------
    // Coordination surface
    // ---------------------------------------------------------------

    /// Gate a peer executive can close to suspend this one between events.
    pub fn exec_gate(&self) -> &Gate {
        &self.exec_gate
    }

    /// Gate the coordinator closes while arranging a rollback.
    pub fn rollback_gate(&self) -> &Gate {
        &self.rollback_gate
    }

    /// Gate a caller parks on while awaiting a value from another
    /// executive's future.
    pub fn pending_read_gate(&self) -> &Gate {
        &self.pending_read_gate
    }

    pub fn status(&self) -> ExecStatus {
        self.status.get()
    }

    /// Wait until the published status satisfies `pred`, or `timeout`
    /// elapses. Returns whether the predicate held.
    pub fn wait_status(&self, pred: impl FnMut(ExecStatus) -> bool, timeout: Duration) -> bool {
        self.status.wait_for(pred, timeout)
    }

    /// Park the calling (executive) thread at the rollback gate as the main
    /// loop would, restoring `InEvent` afterwards. Used by callers blocked
    /// mid-event that observe a rollback being coordinated.
    pub fn park_for_rollback(&self) {
        self.status.set(ExecStatus::AtRollbackGate);
        self.rollback_gate.wait();
        self.status.set(ExecStatus::InEvent);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    // ---------------------------------------------------------------
    // Fiber plumbing (crate-internal)
    // ---------------------------------------------------------------

    pub(crate) fn register_fiber(&self, dec: Arc<DetachController>) {
        self.fibers.lock().insert(dec.key(), dec);
    }

    pub(crate) fn remove_fiber(&self, key: EventKey) {
        self.fibers.lock().remove(&key);
    }

    pub(crate) fn fiber_count(&self) -> usize {
        self.fibers.lock().len()
    }

    /// Satisfy joins on `key` (the event fired, was rescinded, or was
    /// revoked). Fibers whose last awaited key this was get a resume event
    /// scheduled at the current clock.
    pub(crate) fn notify_done(&self, key: EventKey) {
        let ready: Vec<(Arc<DetachController>, Priority)> = {
            let mut joins = self.joins.lock();
            let Some(waiters) = joins.remove(&key) else { return };
            waiters
                .into_iter()
                .filter_map(|waiter| {
                    let mut remaining = waiter.remaining.lock();
                    *remaining -= 1;
                    if *remaining == 0 {
                        waiter.fiber.upgrade().map(|dec| (dec, waiter.priority))
                    } else {
                        None
                    }
                })
                .collect()
        };
        if ready.is_empty() {
            return;
        }
        let exec = self.strong();
        for (dec, priority) in ready {
            if let Err(err) = dec.schedule_resume(&exec, priority) {
                tracing::warn!(
                    exec = %self.cfg.name,
                    key = %dec.key(),
                    error = %err,
                    "failed to schedule join resume"
                );
            }
        }
    }

    /// Register a join of `dec` on `keys`. Returns the number of keys still
    /// outstanding; zero means the caller need not suspend. Unknown keys
    /// count as already fired.
    pub(crate) fn register_join(&self, dec: &Arc<DetachController>, keys: &[EventKey]) -> usize {
        let inner = self.inner.lock();
        let fibers = self.fibers.lock();
        let async_inflight = self.async_inflight.lock();
        let mut joins = self.joins.lock();
        let outstanding: Vec<EventKey> = keys
            .iter()
            .copied()
            .filter(|k| *k != dec.key())
            .filter(|k| {
                inner.future.contains(*k)
                    || inner.pending.iter().any(|r| r.key == *k)
                    || inner.current == Some(*k)
                    || async_inflight.contains(k)
                    || fibers.get(k).is_some_and(|f| !f.is_done())
            })
            .collect();
        if outstanding.is_empty() {
            return 0;
        }
        let waiter = Arc::new(JoinWaiter {
            remaining: Mutex::new(outstanding.len()),
            fiber: Arc::downgrade(dec),
            priority: Priority::ZERO,
        });
        let count = outstanding.len();
        for key in outstanding {
            joins.entry(key).or_default().push(Arc::clone(&waiter));
        }
        count
    }
}

impl std::fmt::Debug for Executive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executive")
            .field("name", &self.cfg.name)
            .field("state", &self.state())
            .field("now", &self.now())
            .finish()
    }
}

/// Normalize a handler outcome (including a contained panic) into an error
/// message.
pub(crate) fn failure_message(
    outcome: Result<Result<(), HandlerError>, Box<dyn std::any::Any + Send>>,
) -> Option<String> {
    match outcome {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(payload) => Some(
            payload
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "handler panicked".to_string()),
        ),
    }
}

// -------------------------------------------------------------------
// Requests and firing context
// -------------------------------------------------------------------

/// A fully specified event request, built fluently.
pub struct EventRequest {
    when: SimTime,
    handler: EventHandler,
    priority: Priority,
    kind: EventKind,
    daemon: bool,
    user_data: Option<UserData>,
    tag: Option<HandlerTag>,
    revocation: Option<tw_core::RevocationAction>,
}

impl EventRequest {
    pub fn new<F>(when: SimTime, handler: F) -> Self
    where
        F: Fn(&EventContext) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        EventRequest {
            when,
            handler: Arc::new(handler),
            priority: Priority::ZERO,
            kind: EventKind::Synchronous,
            daemon: false,
            user_data: None,
            tag: None,
            revocation: None,
        }
    }

    pub fn priority(mut self, priority: impl Into<Priority>) -> Self {
        self.priority = priority.into();
        self
    }

    pub fn daemon(mut self) -> Self {
        self.daemon = true;
        self
    }

    pub fn detachable(mut self) -> Self {
        self.kind = EventKind::Detachable;
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.kind = EventKind::Asynchronous;
        self
    }

    pub fn user_data(mut self, data: UserData) -> Self {
        self.user_data = Some(data);
        self
    }

    pub fn tag(mut self, tag: impl Into<HandlerTag>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Action to run if this event is discarded unfired.
    pub fn on_revoked(mut self, action: impl Fn() + Send + Sync + 'static) -> Self {
        self.revocation = Some(Arc::new(action));
        self
    }

    pub fn when(&self) -> SimTime {
        self.when
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// What a handler sees when its event fires.
pub struct EventContext {
    exec: Arc<Executive>,
    key: EventKey,
    when: SimTime,
    priority: Priority,
    kind: EventKind,
    user_data: Option<UserData>,
    detach: Option<Arc<DetachController>>,
}

impl EventContext {
    pub(crate) fn new(
        exec: Arc<Executive>,
        record: &Record,
        detach: Option<Arc<DetachController>>,
    ) -> Self {
        EventContext {
            exec,
            key: record.key,
            when: record.when,
            priority: record.priority,
            kind: record.kind,
            user_data: record.user_data.clone(),
            detach,
        }
    }

    pub fn exec(&self) -> &Arc<Executive> {
        &self.exec
    }

    pub fn key(&self) -> EventKey {
        self.key
    }

    /// Scheduled firing time of this event.
    pub fn when(&self) -> SimTime {
        self.when
    }

    /// The executive clock right now.
    pub fn now(&self) -> SimTime {
        self.exec.now()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn user_data(&self) -> Option<&UserData> {
        self.user_data.as_ref()
    }

    /// Downcast the user payload.
    pub fn data<T: 'static>(&self) -> Option<&T> {
        self.user_data.as_ref().and_then(|d| d.downcast_ref::<T>())
    }

    /// The detachable controller, if this event runs on a fiber.
    pub fn controller(&self) -> Result<&Arc<DetachController>, ExecError> {
        self.detach.as_ref().ok_or(ExecError::DetachableMisuse("controller access"))
    }

    /// Park this fiber until another event resumes it.
    pub fn suspend(&self) -> Result<(), ExecError> {
        match &self.detach {
            Some(dec) => dec.suspend(),
            None => Err(ExecError::DetachableMisuse("suspend")),
        }
    }

    /// Schedule a wake-up after `delay` of virtual time, then park.
    pub fn suspend_for(&self, delay: chrono::Duration) -> Result<(), ExecError> {
        self.suspend_until(self.now() + delay)
    }

    /// Schedule a wake-up at `when`, then park.
    pub fn suspend_until(&self, when: SimTime) -> Result<(), ExecError> {
        match &self.detach {
            Some(dec) => dec.suspend_until(&self.exec, when),
            None => Err(ExecError::DetachableMisuse("suspend_until")),
        }
    }

    /// Park this fiber until every referenced event has fired or been
    /// rescinded. Unknown keys count as already fired.
    pub fn join(&self, keys: &[EventKey]) -> Result<(), ExecError> {
        let dec = match &self.detach {
            Some(dec) => dec,
            None => return Err(ExecError::DetachableMisuse("join")),
        };
        let outstanding = self.exec.register_join(dec, keys);
        if outstanding == 0 {
            return Ok(());
        }
        dec.suspend()
    }
}

#[cfg(test)]
#[path = "executive_tests.rs"]
mod tests;
