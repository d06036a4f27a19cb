// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::ExecError;
use parking_lot::Mutex as PlMutex;

fn t(mins: i64) -> SimTime {
    SimTime::from_ymd_hms(2020, 6, 1, 12, 0, 0).unwrap() + Duration::minutes(mins)
}

#[test]
fn ticks_cover_the_half_open_interval() {
    let exec = Executive::named("metronome");
    let metronome = Metronome::new(&exec, t(0), t(10), Duration::minutes(3)).unwrap();
    let times: Arc<PlMutex<Vec<i64>>> = Default::default();
    let sink = times.clone();
    metronome.subscribe(move |ctx| {
        sink.lock().push((ctx.now() - t(0)).num_minutes());
    });
    exec.start().unwrap();
    // Ticks at 0, 3, 6, 9; 12 would reach past `end`.
    assert_eq!(*times.lock(), vec![0, 3, 6, 9]);
    assert_eq!(exec.now(), t(9));
}

#[test]
fn all_subscribers_see_each_tick() {
    let exec = Executive::named("fanout");
    let metronome = Metronome::new(&exec, t(0), t(2), Duration::minutes(1)).unwrap();
    let counts: Arc<PlMutex<Vec<&'static str>>> = Default::default();
    for name in ["a", "b"] {
        let sink = counts.clone();
        metronome.subscribe(move |_| sink.lock().push(name));
    }
    exec.start().unwrap();
    assert_eq!(counts.lock().len(), 4);
}

#[test]
fn unsubscribe_stops_future_ticks_only() {
    let exec = Executive::named("unsub");
    let metronome = Metronome::new(&exec, t(0), t(10), Duration::minutes(2)).unwrap();
    let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let sink = count.clone();
    let token = metronome.subscribe(move |_| {
        sink.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    let unsub = Arc::downgrade(&metronome);
    exec.request_event(t(3), move |_| {
        if let Some(m) = unsub.upgrade() {
            assert!(m.unsubscribe(token));
            assert!(!m.unsubscribe(token));
        }
        Ok(())
    })
    .unwrap();
    exec.start().unwrap();
    // Ticks at 0 and 2 delivered; 4, 6, 8 still fire but deliver nowhere.
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(exec.now(), t(8));
}

#[test]
fn daemon_metronome_does_not_prolong_the_run() {
    let exec = Executive::named("daemon-ticks");
    let metronome = Metronome::daemon(&exec, t(0), t(100), Duration::minutes(3)).unwrap();
    let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let sink = count.clone();
    metronome.subscribe(move |_| {
        sink.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    exec.request_event(t(10), |_| Ok(())).unwrap();
    exec.start().unwrap();
    assert_eq!(exec.now(), t(10));
    // Ticks at 0, 3, 6, 9 ran before the last non-daemon event.
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 4);
}

#[test]
fn cancel_rescinds_scheduled_ticks() {
    let exec = Executive::named("cancel");
    let metronome = Metronome::new(&exec, t(0), t(100), Duration::minutes(5)).unwrap();
    let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let sink = count.clone();
    metronome.subscribe(move |_| {
        sink.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    let cancel = Arc::downgrade(&metronome);
    exec.request_event(t(7), move |_| {
        if let Some(m) = cancel.upgrade() {
            m.cancel();
        }
        Ok(())
    })
    .unwrap();
    exec.start().unwrap();
    // Ticks at 0 and 5 fired before cancellation at 7.
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
    assert_eq!(exec.now(), t(7));
}

#[test]
fn non_positive_period_is_rejected() {
    let exec = Executive::named("bad-period");
    assert!(matches!(
        Metronome::new(&exec, t(0), t(10), Duration::zero()),
        Err(ExecError::InvalidPeriod)
    ));
    assert!(matches!(
        Metronome::new(&exec, t(0), t(10), Duration::minutes(-1)),
        Err(ExecError::InvalidPeriod)
    ));
}

#[test]
fn empty_interval_schedules_nothing() {
    let exec = Executive::named("empty");
    let metronome = Metronome::new(&exec, t(10), t(10), Duration::minutes(1)).unwrap();
    let count = Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let sink = count.clone();
    metronome.subscribe(move |_| {
        sink.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    });
    exec.start().unwrap();
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 0);
}
