// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon event accounting.

use super::prelude::*;
use tw_exec::{EventContext, Executive, HandlerError};

fn beat(ctx: &EventContext, beats: Arc<AtomicUsize>) -> Result<(), HandlerError> {
    beats.fetch_add(1, Ordering::SeqCst);
    let next = beats.clone();
    ctx.exec()
        .request_daemon_event(ctx.now() + minutes(7), move |ctx| beat(ctx, next.clone()))?;
    Ok(())
}

#[test]
fn self_rescheduling_daemon_never_outlives_the_last_real_event() {
    init_tracing();
    let exec = Executive::named("daemon");
    let beats = Arc::new(AtomicUsize::new(0));
    let sink = beats.clone();
    exec.request_daemon_event(at(7), move |ctx| beat(ctx, sink.clone())).unwrap();

    let finished = Arc::new(AtomicUsize::new(0));
    let sink = finished.clone();
    exec.request_event(at(100), move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();

    exec.start().unwrap();
    // The daemon beat at 7, 14, ..., 98; the run ended at the t+100 event.
    assert_eq!(beats.load(Ordering::SeqCst), 14);
    assert_eq!(finished.load(Ordering::SeqCst), 1);
    assert_eq!(exec.now(), at(100));
    // The rescheduled beat at t+105 is still pending but holds nothing open.
    assert_eq!(exec.non_daemon_pending(), 0);
}

#[test]
fn a_daemon_only_schedule_terminates_immediately() {
    init_tracing();
    let exec = Executive::named("daemon-only");
    let beats = Arc::new(AtomicUsize::new(0));
    let sink = beats.clone();
    exec.request_daemon_event(at(0), move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
    .unwrap();
    exec.start().unwrap();
    assert_eq!(beats.load(Ordering::SeqCst), 0);
    assert_eq!(exec.event_count(), 0);
}
