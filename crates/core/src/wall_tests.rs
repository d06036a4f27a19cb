// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_moves_forward() {
    let clock = SystemClock;
    let t1 = clock.now();
    clock.sleep(Duration::from_millis(1));
    let t2 = clock.now();
    assert!(t2 > t1);
}

#[test]
fn fake_clock_sleep_advances_instead_of_blocking() {
    let clock = FakeClock::new();
    let t1 = clock.now();
    let wall_before = Instant::now();
    clock.sleep(Duration::from_secs(3600));
    assert!(wall_before.elapsed() < Duration::from_secs(1));
    assert_eq!(clock.now() - t1, Duration::from_secs(3600));
}

#[test]
fn fake_clock_clones_share_time() {
    let a = FakeClock::new();
    let b = a.clone();
    let t1 = a.now();
    b.advance(Duration::from_secs(30));
    assert_eq!(a.now() - t1, Duration::from_secs(30));
}
