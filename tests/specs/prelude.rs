// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared helpers for the end-to-end specs.

use chrono::Duration;
use std::sync::Once;
pub use parking_lot::Mutex;
pub use std::sync::atomic::{AtomicUsize, Ordering};
pub use std::sync::Arc;
pub use tw_core::SimTime;

static INIT: Once = Once::new();

/// Route kernel tracing through the test harness when `RUST_LOG` is set.
pub fn init_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// The reference instant used across the scenarios.
pub fn epoch() -> SimTime {
    SimTime::from_ymd_hms(2016, 7, 15, 3, 51, 21).unwrap()
}

pub fn minutes(m: i64) -> Duration {
    Duration::minutes(m)
}

pub fn at(mins_after_epoch: i64) -> SimTime {
    epoch() + minutes(mins_after_epoch)
}

pub fn log() -> Arc<Mutex<Vec<String>>> {
    Default::default()
}
