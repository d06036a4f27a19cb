// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The CoExecutor: several executives, one virtual timeline.
//!
//! `start_all` binds each executive to its own OS thread and releases them
//! simultaneously. Executives run optimistically; when one receives work
//! from its virtual past, the coordinator quiesces the fleet at the
//! rollback barriers, rolls the affected executives back, and releases
//! everyone together. Termination is cooperative: each executive arrives at
//! the shared deadline and parks until the last one catches up.
//!
//! Executives placed under a coordinator must be configured with
//! `retain_past_events`, or any rollback against them will fail.

use crate::error::CoordError;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tw_core::{EventKey, SimTime, WaitOutcome};
use tw_exec::{EventRequest, ExecStatus, Executive};

/// How `synchronize` may bridge a clock gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPolicy {
    /// Roll the callee back if it is ahead and wait for the action to run.
    WaitForCallee,
    /// Refuse if the callee is ahead.
    FailFast,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The callee was at or behind the caller; the action ran immediately.
    Executed,
    /// The callee was rolled back; the caller waited for the action to run
    /// when the callee re-reached the caller's clock.
    Deferred,
}

/// An executive must reach one of these before its rollback may run.
fn parked(status: ExecStatus) -> bool {
    matches!(status, ExecStatus::AtRollbackGate | ExecStatus::AtExecGate | ExecStatus::Idle)
}

const QUIESCE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct CoExecutor {
    self_ref: Weak<CoExecutor>,
    execs: Vec<Arc<Executive>>,
    termination_at: SimTime,
    /// Serializes rollback initiation; the rollbacks themselves fan out.
    rollback_entry: Mutex<()>,
    arrivals: Mutex<Vec<bool>>,
}

impl CoExecutor {
    pub fn new(execs: Vec<Arc<Executive>>, termination_at: SimTime) -> Arc<Self> {
        let count = execs.len();
        Arc::new_cyclic(|self_ref| CoExecutor {
            self_ref: self_ref.clone(),
            execs,
            termination_at,
            rollback_entry: Mutex::new(()),
            arrivals: Mutex::new(vec![false; count]),
        })
    }

    pub fn executives(&self) -> &[Arc<Executive>] {
        &self.execs
    }

    pub fn termination_at(&self) -> SimTime {
        self.termination_at
    }

    /// Minimum clock across the fleet.
    pub fn earliest_now(&self) -> SimTime {
        self.execs.iter().map(|e| e.now()).min().unwrap_or(SimTime::EPOCH_MIN)
    }

    // ---------------------------------------------------------------
    // Launch and cotermination
    // ---------------------------------------------------------------

    /// Run every executive on its own thread until cotermination.
    ///
    /// All exec-time gates are held closed until every thread is spawned,
    /// then released together; completion is observed by joining the
    /// threads.
    pub fn start_all(&self) -> Result<(), CoordError> {
        *self.arrivals.lock() = vec![false; self.execs.len()];
        for exec in &self.execs {
            exec.exec_gate().close();
        }
        for (idx, exec) in self.execs.iter().enumerate() {
            self.arm_termination(idx, exec)?;
        }

        let mut handles = Vec::with_capacity(self.execs.len());
        for exec in &self.execs {
            let runner = Arc::clone(exec);
            let handle = std::thread::Builder::new()
                .name(runner.name().to_string())
                .spawn(move || runner.start())
                .map_err(|source| {
                    CoordError::Exec(tw_exec::ExecError::Spawn { what: "executive", source })
                })?;
            handles.push((exec.name().to_string(), handle));
        }

        tracing::info!(executives = self.execs.len(), "releasing all executives");
        for exec in &self.execs {
            exec.exec_gate().open();
        }

        let mut first_error = None;
        for (name, handle) in handles {
            match handle.join() {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    tracing::error!(exec = %name, error = %err, "executive run failed");
                    first_error.get_or_insert(CoordError::Exec(err));
                }
                Err(_) => {
                    tracing::error!(exec = %name, "executive thread panicked");
                    first_error.get_or_insert(CoordError::ExecPanicked { name: name.into() });
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Schedule the cotermination event on one executive.
    fn arm_termination(&self, idx: usize, exec: &Arc<Executive>) -> Result<(), CoordError> {
        let coord = self.self_ref.clone();
        exec.request(EventRequest::new(self.termination_at, move |ctx| {
            if let Some(coord) = coord.upgrade() {
                coord.arrive(idx, ctx.exec());
            }
            Ok(())
        }))?;
        Ok(())
    }

    /// An executive reached the termination time. The last arrival stops
    /// everyone; earlier arrivals park at their exec-time gate (a rollback
    /// below the deadline revokes the arrival and reopens the gate).
    fn arrive(&self, idx: usize, exec: &Arc<Executive>) {
        let all_arrived = {
            let mut arrivals = self.arrivals.lock();
            arrivals[idx] = true;
            arrivals.iter().all(|a| *a)
        };
        if all_arrived {
            tracing::info!(at = %self.termination_at, "cotermination reached; stopping all executives");
            for exec in &self.execs {
                exec.stop();
            }
            for exec in &self.execs {
                exec.exec_gate().open();
            }
        } else {
            tracing::debug!(exec = %exec.name(), "arrived at termination; parking");
            exec.exec_gate().close();
        }
    }

    // ---------------------------------------------------------------
    // Rollback coordination
    // ---------------------------------------------------------------

    /// Roll every executive whose clock is past `to` back to `to`.
    pub fn rollback(&self, to: SimTime) -> Result<(), CoordError> {
        self.rollback_with(to, None, || Ok(()))
    }

    /// Rollback plus an injection step that runs while the fleet is still
    /// quiesced, before the barriers reopen. `initiator` is the executive
    /// whose thread is driving this call (it cannot park itself).
    fn rollback_with<T>(
        &self,
        to: SimTime,
        initiator: Option<&Arc<Executive>>,
        inject: impl FnOnce() -> Result<T, CoordError>,
    ) -> Result<T, CoordError> {
        let _entry = self.rollback_entry.lock();
        let earliest = self.earliest_now();
        if to < earliest {
            return Err(CoordError::RollbackBelowHorizon { to, earliest });
        }
        for exec in &self.execs {
            exec.rollback_gate().close();
        }
        let result = self.coordinate(to, initiator, inject);
        for exec in &self.execs {
            exec.rollback_gate().open();
        }
        result
    }

    fn coordinate<T>(
        &self,
        to: SimTime,
        initiator: Option<&Arc<Executive>>,
        inject: impl FnOnce() -> Result<T, CoordError>,
    ) -> Result<T, CoordError> {
        let is_initiator =
            |exec: &Arc<Executive>| initiator.is_some_and(|i| Arc::ptr_eq(i, exec));

        // Phase 1: everyone off the loop spine (parked, mid-event, or idle).
        for exec in &self.execs {
            if is_initiator(exec) {
                continue;
            }
            if !exec.wait_status(|s| s != ExecStatus::InLoop, QUIESCE_TIMEOUT) {
                return Err(CoordError::QuiesceTimeout { name: exec.name().into() });
            }
        }

        // Phase 2: targets must actually park; kick their pending reads so
        // a caller blocked on a future value advances to the barrier.
        let targets: Vec<&Arc<Executive>> =
            self.execs.iter().filter(|&e| !is_initiator(e) && e.now() > to).collect();
        for exec in &targets {
            let deadline = Instant::now() + QUIESCE_TIMEOUT;
            while !parked(exec.status()) {
                exec.pending_read_gate().kick();
                exec.wait_status(parked, Duration::from_millis(10));
                if Instant::now() > deadline {
                    return Err(CoordError::QuiesceTimeout { name: exec.name().into() });
                }
            }
        }

        tracing::info!(to = %to, targets = targets.len(), "coordinated rollback");

        // Phase 3: roll the targets back in parallel; the initiator (whose
        // thread is ours) rolls back inline.
        std::thread::scope(|scope| {
            let mut handles = Vec::with_capacity(targets.len());
            for exec in &targets {
                handles.push((exec.name().to_string(), scope.spawn(move || exec.perform_rollback(to))));
            }
            for (name, handle) in handles {
                match handle.join() {
                    Ok(outcome) => outcome.map_err(CoordError::Exec)?,
                    Err(_) => return Err(CoordError::ExecPanicked { name: name.into() }),
                }
            }
            Ok(())
        })?;
        if let Some(initiator) = initiator {
            if initiator.now() > to {
                initiator.perform_rollback(to)?;
            }
        }

        // Phase 4: a rolled-back executive that had already arrived at the
        // deadline is no longer there; revoke the arrival and let it run.
        {
            let mut arrivals = self.arrivals.lock();
            for (idx, exec) in self.execs.iter().enumerate() {
                if arrivals[idx] && exec.now() < self.termination_at {
                    arrivals[idx] = false;
                    exec.exec_gate().open();
                }
            }
        }

        // Injection runs while every target is still at a barrier.
        let value = inject()?;

        // Phase 5: history below the fleet's horizon is dead.
        let horizon = self.earliest_now();
        for exec in &self.execs {
            exec.prune_past(horizon);
        }
        Ok(value)
    }

    // ---------------------------------------------------------------
    // Cross-executive calls
    // ---------------------------------------------------------------

    /// Schedule `request` on `callee` on behalf of `caller` (whose thread
    /// must be the one calling). A request into the callee's past first
    /// rolls the fleet back to the request time, so the injected record
    /// survives its own rollback.
    pub fn schedule_on(
        &self,
        caller: &Arc<Executive>,
        callee: &Arc<Executive>,
        request: EventRequest,
    ) -> Result<EventKey, CoordError> {
        let when = request.when();
        if when >= callee.now() {
            return Ok(callee.request(request)?);
        }
        self.rollback_with(when, Some(caller), || Ok(callee.request(request)?))
    }

    /// Run `action` against `callee` no earlier than the caller's clock.
    ///
    /// * callee at or behind: the action runs immediately (`Executed`).
    /// * callee ahead, `WaitForCallee`: the fleet rolls back to the
    ///   caller's clock, the action is scheduled there, and the caller
    ///   parks on its pending-read gate until it has run (`Deferred`).
    /// * callee ahead, `FailFast`: `SyncAborted`.
    pub fn synchronize(
        &self,
        caller: &Arc<Executive>,
        callee: &Arc<Executive>,
        policy: SyncPolicy,
        action: impl FnOnce(&Arc<Executive>) + Send + 'static,
    ) -> Result<SyncOutcome, CoordError> {
        let caller_now = caller.now();
        if callee.now() <= caller_now {
            action(callee);
            return Ok(SyncOutcome::Executed);
        }
        match policy {
            SyncPolicy::FailFast => {
                Err(CoordError::SyncAborted { callee: callee.name().into(), caller_now })
            }
            SyncPolicy::WaitForCallee => {
                let fulfilled = Arc::new(AtomicBool::new(false));
                let done = fulfilled.clone();
                let waiter = Arc::clone(caller);
                let action_cell = Mutex::new(Some(action));
                caller.pending_read_gate().close();
                let staged = self.rollback_with(caller_now, Some(caller), || {
                    callee.request(EventRequest::new(caller_now, move |ctx| {
                        if let Some(action) = action_cell.lock().take() {
                            action(ctx.exec());
                        }
                        done.store(true, Ordering::SeqCst);
                        waiter.pending_read_gate().open();
                        Ok(())
                    }))?;
                    Ok(())
                });
                if let Err(err) = staged {
                    caller.pending_read_gate().open();
                    return Err(err);
                }
                // Park until the callee re-reaches our clock and runs the
                // action; cooperate with any rollback coordinated meanwhile.
                while !fulfilled.load(Ordering::SeqCst) {
                    match caller.pending_read_gate().wait_kickable() {
                        WaitOutcome::Opened => {}
                        WaitOutcome::Kicked => caller.park_for_rollback(),
                    }
                }
                Ok(SyncOutcome::Deferred)
            }
        }
    }
}

impl std::fmt::Debug for CoExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoExecutor")
            .field("executives", &self.execs.len())
            .field("termination_at", &self.termination_at)
            .finish()
    }
}

#[cfg(test)]
#[path = "coexec_tests.rs"]
mod tests;
