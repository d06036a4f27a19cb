// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transition-matrix state machine with follow-on chaining.
//!
//! A machine is a Boolean matrix over a finite ordinal state set plus a
//! follow-on state per state. A state is terminal iff its follow-on is
//! itself; reaching a non-terminal state chains automatically through its
//! follow-on, running the transition handler after each leg.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// A finite ordinal state set.
pub trait MachineState: Copy + Eq + fmt::Debug + Send + 'static {
    /// Every state, in ordinal order (`STATES[s.index()] == s`).
    const STATES: &'static [Self];

    fn index(self) -> usize;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError<S: MachineState> {
    #[error("transition {from:?} -> {to:?} is not permitted")]
    BadTransition { from: S, to: S },
    #[error("follow-on chain out of {state:?} does not terminate")]
    FollowOnCycle { state: S },
}

/// Callback run after each completed transition leg.
pub type TransitionHandler<S> = Arc<dyn Fn(S, S) + Send + Sync>;

pub struct StateMachine<S: MachineState> {
    current: S,
    allowed: Vec<bool>,
    follow_on: Vec<S>,
    on_transition: Option<TransitionHandler<S>>,
}

pub struct StateMachineBuilder<S: MachineState> {
    initial: S,
    allowed: Vec<bool>,
    follow_on: Vec<S>,
}

impl<S: MachineState> StateMachineBuilder<S> {
    pub fn new(initial: S) -> Self {
        let n = S::STATES.len();
        StateMachineBuilder {
            initial,
            allowed: vec![false; n * n],
            follow_on: S::STATES.to_vec(),
        }
    }

    /// Permit the transition `from -> to`.
    pub fn allow(mut self, from: S, to: S) -> Self {
        let n = S::STATES.len();
        self.allowed[from.index() * n + to.index()] = true;
        self
    }

    /// Chain automatically from `state` into `next` after `state` is
    /// reached. The chained leg must itself be allowed.
    pub fn follow_on(mut self, state: S, next: S) -> Self {
        self.follow_on[state.index()] = next;
        self
    }

    pub fn build(self) -> StateMachine<S> {
        StateMachine {
            current: self.initial,
            allowed: self.allowed,
            follow_on: self.follow_on,
            on_transition: None,
        }
    }
}

impl<S: MachineState> StateMachine<S> {
    pub fn current(&self) -> S {
        self.current
    }

    pub fn is_terminal(&self, state: S) -> bool {
        self.follow_on[state.index()] == state
    }

    pub fn set_transition_handler(&mut self, handler: TransitionHandler<S>) {
        self.on_transition = Some(handler);
    }

    fn permitted(&self, from: S, to: S) -> bool {
        self.allowed[from.index() * S::STATES.len() + to.index()]
    }

    fn step(&mut self, to: S) -> Result<(), TransitionError<S>> {
        let from = self.current;
        if !self.permitted(from, to) {
            return Err(TransitionError::BadTransition { from, to });
        }
        self.current = to;
        if let Some(handler) = &self.on_transition {
            handler(from, to);
        }
        Ok(())
    }

    /// Transition to `to`, then chain through follow-on states until a
    /// terminal state is reached. Returns the state the machine settled in.
    pub fn transition_to(&mut self, to: S) -> Result<S, TransitionError<S>> {
        self.step(to)?;
        let mut hops = 0;
        loop {
            let next = self.follow_on[self.current.index()];
            if next == self.current {
                return Ok(self.current);
            }
            hops += 1;
            if hops > S::STATES.len() {
                return Err(TransitionError::FollowOnCycle { state: self.current });
            }
            self.step(next)?;
        }
    }
}

#[cfg(test)]
#[path = "machine_tests.rs"]
mod tests;
