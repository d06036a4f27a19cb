// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parallel executives and time-warp rollback.

use super::prelude::*;
use tw_coord::CoExecutor;
use tw_exec::{EventRequest, ExecConfig, ExecSignal, ExecState, Executive};

fn parallel_exec(name: &str) -> Arc<Executive> {
    Executive::new(
        ExecConfig::named(name).retain_past_events(true).ignore_causality_violations(true),
    )
}

/// Scenario: two executives advance together; B injects into A an event in
/// A's virtual past. The coordinator quiesces both, rolls A back, A's
/// speculative future dies (revocation callbacks fire exactly once), its
/// fired history replays, and B proceeds unchanged.
#[test]
fn cross_executive_past_injection_triggers_rollback() {
    init_tracing();
    let a = parallel_exec("exec-a");
    let b = parallel_exec("exec-b");
    let output = log();
    let injected: Arc<Mutex<Option<SimTime>>> = Default::default();
    let revoked = Arc::new(AtomicUsize::new(0));
    let rolled_back: Arc<Mutex<Vec<SimTime>>> = Default::default();
    let b_rolled_back = Arc::new(AtomicUsize::new(0));

    // A walks forward; at t+20 it speculatively schedules work for t+40
    // with a revocation callback.
    let sink = output.clone();
    a.request_event(at(10), move |_| {
        sink.lock().push("a@10".to_string());
        Ok(())
    })
    .unwrap();
    let sink = output.clone();
    let revoked_sink = revoked.clone();
    a.request_event(at(20), move |ctx| {
        sink.lock().push("a@20".to_string());
        let revoked_sink = revoked_sink.clone();
        ctx.exec().request(
            EventRequest::new(ctx.now() + minutes(20), |_| Ok(())).on_revoked(move || {
                revoked_sink.fetch_add(1, Ordering::SeqCst);
            }),
        )?;
        Ok(())
    })
    .unwrap();

    let sink = rolled_back.clone();
    a.signals().subscribe(Arc::new(move |signal| {
        if let ExecSignal::RolledBack { to } = signal {
            sink.lock().push(*to);
        }
    }));
    let sink = b_rolled_back.clone();
    b.signals().subscribe(Arc::new(move |signal| {
        if matches!(signal, ExecSignal::RolledBack { .. }) {
            sink.fetch_add(1, Ordering::SeqCst);
        }
    }));

    let coord = CoExecutor::new(vec![a.clone(), b.clone()], at(120));

    // B's injection: once A is demonstrably past t+40 (so the speculative
    // event exists on A's timeline), schedule an event at t+15 on A.
    let co = Arc::downgrade(&coord);
    let target = a.clone();
    let seen = injected.clone();
    b.request_event(at(5), move |ctx| {
        while target.now() < at(40) {
            std::thread::yield_now();
        }
        let coord = co.upgrade().ok_or("coordinator gone")?;
        let seen = seen.clone();
        coord.schedule_on(
            ctx.exec(),
            &target,
            EventRequest::new(at(15), move |ctx| {
                *seen.lock() = Some(ctx.now());
                Ok(())
            }),
        )?;
        Ok(())
    })
    .unwrap();

    coord.start_all().unwrap();

    // The injection fired at its own (past) timestamp.
    assert_eq!(*injected.lock(), Some(at(15)));
    // Exactly one rollback on A, to the injection time; B never rolled back.
    assert_eq!(*rolled_back.lock(), vec![at(15)]);
    assert_eq!(b_rolled_back.load(Ordering::SeqCst), 0);
    // The speculative t+40 record was created at t+20 (>= t+15), so the
    // rollback revoked it exactly once. Its replayed twin fired normally.
    assert_eq!(revoked.load(Ordering::SeqCst), 1);
    // A's fired history at and after t+15 replayed: a@20 ran twice, a@10
    // once.
    assert_eq!(output.lock().iter().filter(|e| e.as_str() == "a@20").count(), 2);
    assert_eq!(output.lock().iter().filter(|e| e.as_str() == "a@10").count(), 1);
    // Both executives coterminate at the deadline.
    assert_eq!(a.state(), ExecState::Stopped);
    assert_eq!(b.state(), ExecState::Stopped);
    assert_eq!(a.now(), at(120));
    assert_eq!(b.now(), at(120));
}

/// Rollback idempotence at the fleet level: a second rollback to the same
/// instant is a no-op.
#[test]
fn repeated_rollback_to_the_same_instant_is_idempotent() {
    init_tracing();
    let a = parallel_exec("idem-a");
    a.request_event(at(10), |_| Ok(())).unwrap();
    a.request_event(at(30), |_| Ok(())).unwrap();
    a.start().unwrap();
    let coord = CoExecutor::new(vec![a.clone()], at(100));

    coord.rollback(at(20)).unwrap();
    let pending = a.pending_len();
    let now = a.now();
    coord.rollback(at(20)).unwrap();
    assert_eq!(a.pending_len(), pending);
    assert_eq!(a.now(), now);
    assert_eq!(now, at(20));
}
