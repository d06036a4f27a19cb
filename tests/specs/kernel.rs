// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequential executive scenarios.

use super::prelude::*;
use tw_exec::{EventRequest, ExecConfig, ExecSignal, ExecState, Executive};

#[test]
fn hello_world() {
    init_tracing();
    let exec = Executive::named("hello-world");
    let output = log();
    let states: Arc<Mutex<Vec<ExecState>>> = Default::default();

    let sink = output.clone();
    exec.request_event(epoch(), move |ctx| {
        assert_eq!(ctx.now(), epoch());
        sink.lock().push("Hello, world!".to_string());
        Ok(())
    })
    .unwrap();

    states.lock().push(exec.state());
    exec.start().unwrap();
    states.lock().push(exec.state());

    assert_eq!(*output.lock(), vec!["Hello, world!".to_string()]);
    assert_eq!(*states.lock(), vec![ExecState::Stopped, ExecState::Finished]);
    assert_eq!(exec.event_count(), 1);
    assert_eq!(exec.now(), epoch());
}

#[test]
fn priority_tiebreak_orders_hello_before_world() {
    init_tracing();
    let exec = Executive::named("tiebreak");
    let output = log();
    for (word, priority) in [("World", 0.0), ("Hello", 1.0)] {
        let sink = output.clone();
        exec.request(EventRequest::new(epoch(), move |_| {
            sink.lock().push(word.to_string());
            Ok(())
        })
        .priority(priority))
        .unwrap();
    }
    exec.start().unwrap();
    assert_eq!(*output.lock(), vec!["Hello".to_string(), "World".to_string()]);
}

#[test]
fn rescind_then_proceed() {
    init_tracing();
    let exec = Executive::named("rescind");
    let output = log();

    let sink = output.clone();
    let write_it = exec
        .request_event(at(5), move |_| {
            sink.lock().push("Hello".to_string());
            Ok(())
        })
        .unwrap();

    exec.request_event(at(0), move |ctx| {
        assert!(ctx.exec().rescind(write_it));
        Ok(())
    })
    .unwrap();

    exec.start().unwrap();
    assert!(output.lock().is_empty());
    assert_eq!(exec.event_count(), 1);
    assert_eq!(exec.state(), ExecState::Finished);
}

#[test]
fn pause_then_resume_preserves_order_and_finishes() {
    init_tracing();
    let exec = Executive::named("pause-resume");
    let output = log();

    let sink = output.clone();
    exec.request_event(at(0), move |ctx| {
        sink.lock().push("before".to_string());
        ctx.exec().pause()?;
        Ok(())
    })
    .unwrap();
    let sink = output.clone();
    exec.request_event(at(1), move |_| {
        sink.lock().push("after".to_string());
        Ok(())
    })
    .unwrap();

    let resumer = exec.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(30));
        assert_eq!(resumer.state(), ExecState::Paused);
        resumer.resume()
    });
    exec.start().unwrap();
    handle.join().unwrap().unwrap();

    assert_eq!(*output.lock(), vec!["before".to_string(), "after".to_string()]);
    assert_eq!(exec.state(), ExecState::Finished);
}

#[test]
fn reset_supports_a_second_run() {
    init_tracing();
    let exec = Executive::named("rerun");
    let count = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let sink = count.clone();
        exec.request_event(at(3), move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .unwrap();
        exec.start().unwrap();
        assert_eq!(exec.state(), ExecState::Finished);
        exec.reset().unwrap();
        assert_eq!(exec.now(), SimTime::EPOCH_MIN);
    }
    assert_eq!(count.load(Ordering::SeqCst), 2);
    assert_eq!(exec.run_number(), 2);
}

#[test]
fn past_time_requests_follow_the_causality_policy() {
    init_tracing();
    // Enforcing: the request is refused.
    let strict = Executive::named("strict");
    strict
        .request_event(at(10), |ctx| {
            assert!(ctx.exec().request_event(at(5), |_| Ok(())).is_err());
            Ok(())
        })
        .unwrap();
    strict.start().unwrap();
    assert_eq!(strict.event_count(), 1);

    // Ignoring: the request fires at `Now` without a clock change.
    let lenient =
        Executive::new(ExecConfig::named("lenient").ignore_causality_violations(true));
    let clock_changes = Arc::new(AtomicUsize::new(0));
    let sink = clock_changes.clone();
    lenient.signals().subscribe(Arc::new(move |signal| {
        if matches!(signal, ExecSignal::ClockAboutToChange { .. }) {
            sink.fetch_add(1, Ordering::SeqCst);
        }
    }));
    let fired_at: Arc<Mutex<Option<SimTime>>> = Default::default();
    let seen = fired_at.clone();
    lenient
        .request_event(at(10), move |ctx| {
            let seen = seen.clone();
            ctx.exec()
                .request_event(at(5), move |ctx| {
                    *seen.lock() = Some(ctx.now());
                    Ok(())
                })
                .map(|_| ())?;
            Ok(())
        })
        .unwrap();
    lenient.start().unwrap();
    assert_eq!(*fired_at.lock(), Some(at(10)));
    assert_eq!(lenient.event_count(), 2);
    assert_eq!(clock_changes.load(Ordering::SeqCst), 1);
}
