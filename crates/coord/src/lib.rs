// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tw-coord: coordination of parallel executives on one virtual timeline.
//!
//! A [`CoExecutor`] launches a fixed set of executives on their own OS
//! threads, terminates them cooperatively at a shared deadline, mediates
//! cross-executive calls, and coordinates optimistic time-warp rollbacks
//! when an executive receives work from its virtual past.

pub mod coexec;
pub mod error;

pub use coexec::{CoExecutor, SyncOutcome, SyncPolicy};
pub use error::CoordError;
