// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced by the executive and its fibers.

use smol_str::SmolStr;
use thiserror::Error;
use tw_core::{EventKey, SimTime};

/// Error escaping a user event handler. The loop logs and swallows these by
/// default; configuration can turn them into a run abort instead.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{exec}: event requested at {requested} is before the clock ({now})")]
    CausalityViolation { exec: SmolStr, requested: SimTime, now: SimTime },

    #[error("{exec}: executive is {state}; {operation} requires {required}")]
    BadState { exec: SmolStr, state: &'static str, operation: &'static str, required: &'static str },

    #[error("no pending or in-flight event with key {0}")]
    EventKeyUnknown(EventKey),

    #[error("{0} is only valid on a detachable fiber")]
    DetachableMisuse(&'static str),

    #[error("{exec}: rollback to {to} requires retained past events")]
    RollbackImpossible { exec: SmolStr, to: SimTime },

    #[error("fiber was aborted")]
    FiberAborted,

    #[error("executive is gone")]
    ExecutiveGone,

    #[error("handler for event {key} failed: {message}")]
    Handler { key: EventKey, message: String },

    #[error("metronome period must be positive")]
    InvalidPeriod,

    #[error("failed to spawn {what} thread")]
    Spawn {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },
}
