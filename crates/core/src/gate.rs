// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Manual-reset, multi-waiter gate.
//!
//! The kernel's barriers (exec-time, rollback, pending-read) are all
//! instances of this: `open` releases every waiter atomically and lets
//! future waiters straight through; `close` re-arms it. `kick` wakes the
//! current waiters without opening, for callers that need to re-examine the
//! world while a coordinator works.

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The gate is (or became) open.
    Opened,
    /// The gate is still closed but a kick was observed.
    Kicked,
}

struct GateState {
    open: bool,
    kicks: u64,
}

pub struct Gate {
    state: Mutex<GateState>,
    cond: Condvar,
}

impl Gate {
    pub fn open_gate() -> Self {
        Gate { state: Mutex::new(GateState { open: true, kicks: 0 }), cond: Condvar::new() }
    }

    pub fn closed_gate() -> Self {
        Gate { state: Mutex::new(GateState { open: false, kicks: 0 }), cond: Condvar::new() }
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Release all waiters and let future waiters through.
    pub fn open(&self) {
        let mut state = self.state.lock();
        state.open = true;
        self.cond.notify_all();
    }

    /// Re-arm the gate for future waiters.
    pub fn close(&self) {
        self.state.lock().open = false;
    }

    /// Wake current waiters without opening the gate. Only observable
    /// through [`Gate::wait_kickable`].
    pub fn kick(&self) {
        let mut state = self.state.lock();
        state.kicks = state.kicks.wrapping_add(1);
        self.cond.notify_all();
    }

    /// Block until the gate is open. Kicks are ignored.
    pub fn wait(&self) {
        let mut state = self.state.lock();
        while !state.open {
            self.cond.wait(&mut state);
        }
    }

    /// Block until the gate opens or a kick arrives, whichever is first.
    pub fn wait_kickable(&self) -> WaitOutcome {
        let mut state = self.state.lock();
        let seen = state.kicks;
        loop {
            if state.open {
                return WaitOutcome::Opened;
            }
            if state.kicks != seen {
                return WaitOutcome::Kicked;
            }
            self.cond.wait(&mut state);
        }
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
