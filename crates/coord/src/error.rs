// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coordination errors.

use smol_str::SmolStr;
use thiserror::Error;
use tw_core::SimTime;
use tw_exec::ExecError;

#[derive(Debug, Error)]
pub enum CoordError {
    #[error("synchronize aborted: {callee} is ahead of the caller's clock {caller_now}")]
    SyncAborted { callee: SmolStr, caller_now: SimTime },

    #[error("rollback to {to} is below the earliest executive clock {earliest}")]
    RollbackBelowHorizon { to: SimTime, earliest: SimTime },

    #[error("executive {name} did not quiesce for rollback")]
    QuiesceTimeout { name: SmolStr },

    #[error("executive thread {name} panicked")]
    ExecPanicked { name: SmolStr },

    #[error(transparent)]
    Exec(#[from] ExecError),
}
