// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use parking_lot::Mutex as PlMutex;

#[test]
fn subscribers_see_signals_in_emission_order() {
    let hub = SignalHub::new();
    let seen: Arc<PlMutex<Vec<&'static str>>> = Default::default();
    let sink = seen.clone();
    hub.subscribe(Arc::new(move |s| sink.lock().push(s.name())));
    hub.emit(&ExecSignal::Started { run_number: 1 });
    hub.emit(&ExecSignal::Finished);
    assert_eq!(*seen.lock(), vec!["started", "finished"]);
}

#[test]
fn unsubscribe_stops_delivery() {
    let hub = SignalHub::new();
    let count = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let sink = count.clone();
    let token = hub.subscribe(Arc::new(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    }));
    hub.emit(&ExecSignal::Paused);
    assert!(hub.unsubscribe(token));
    assert!(!hub.unsubscribe(token));
    hub.emit(&ExecSignal::Resumed);
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn subscriber_may_unsubscribe_itself_reentrantly() {
    let hub = Arc::new(SignalHub::new());
    let token_cell: Arc<PlMutex<Option<SignalToken>>> = Default::default();
    let hub2 = Arc::clone(&hub);
    let cell = token_cell.clone();
    let token = hub.subscribe(Arc::new(move |_| {
        if let Some(t) = cell.lock().take() {
            hub2.unsubscribe(t);
        }
    }));
    *token_cell.lock() = Some(token);
    hub.emit(&ExecSignal::Stopped);
    hub.emit(&ExecSignal::Stopped);
}

#[test]
fn notice_debug_reports_payload_presence_only() {
    let notice = EventNotice {
        key: EventKey::next(),
        when: SimTime::EPOCH_MIN,
        now: SimTime::EPOCH_MIN,
        priority: Priority::ZERO,
        kind: EventKind::Synchronous,
        daemon: false,
        user_data: Some(Arc::new(42u64) as UserData),
    };
    assert!(format!("{notice:?}").contains("user_data: true"));
}
