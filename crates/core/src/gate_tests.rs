// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn open_gate_does_not_block() {
    let gate = Gate::open_gate();
    gate.wait();
    assert!(gate.is_open());
}

#[test]
fn open_releases_every_waiter() {
    let gate = Arc::new(Gate::closed_gate());
    let released = Arc::new(AtomicUsize::new(0));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let gate = Arc::clone(&gate);
            let released = Arc::clone(&released);
            std::thread::spawn(move || {
                gate.wait();
                released.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();
    // Give the waiters time to park
    std::thread::sleep(Duration::from_millis(20));
    assert_eq!(released.load(Ordering::SeqCst), 0);
    gate.open();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(released.load(Ordering::SeqCst), 4);
}

#[test]
fn close_re_arms_for_future_waiters() {
    let gate = Gate::open_gate();
    gate.wait();
    gate.close();
    assert!(!gate.is_open());
    gate.open();
    gate.wait();
}

#[test]
fn kick_wakes_without_opening() {
    let gate = Arc::new(Gate::closed_gate());
    let waiter = {
        let gate = Arc::clone(&gate);
        std::thread::spawn(move || gate.wait_kickable())
    };
    std::thread::sleep(Duration::from_millis(20));
    gate.kick();
    assert_eq!(waiter.join().unwrap(), WaitOutcome::Kicked);
    assert!(!gate.is_open());
}

#[test]
fn wait_kickable_reports_open() {
    let gate = Arc::new(Gate::closed_gate());
    let waiter = {
        let gate = Arc::clone(&gate);
        std::thread::spawn(move || gate.wait_kickable())
    };
    std::thread::sleep(Duration::from_millis(20));
    gate.open();
    assert_eq!(waiter.join().unwrap(), WaitOutcome::Opened);
}
