// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event record: one scheduled invocation of a handler.
//!
//! Records are immutable once enqueued. The executive is the only mutator:
//! it removes them on fire, on rescind, or on rollback. The record is
//! generic over the handler payload so this crate stays free of any
//! particular executive's callback signature.

use crate::key::{EventKey, HandlerTag, Priority};
use crate::time::SimTime;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// Opaque payload surfaced to the handler when the event fires.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Callback invoked exactly once if the record is discarded unfired
/// (rescinded, or revoked by a rollback).
pub type RevocationAction = Arc<dyn Fn() + Send + Sync>;

/// How the handler is driven when the record fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Runs to completion on the executive thread.
    Synchronous,
    /// Runs on a fiber that may suspend and resume cooperatively.
    Detachable,
    /// Runs on a detached worker thread; the loop does not wait for it.
    Asynchronous,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EventKind::Synchronous => "synchronous",
            EventKind::Detachable => "detachable",
            EventKind::Asynchronous => "asynchronous",
        })
    }
}

/// A scheduled invocation, keyed for rescission and ordered for firing.
#[derive(Clone)]
pub struct EventRecord<H> {
    pub key: EventKey,
    pub when: SimTime,
    pub priority: Priority,
    pub kind: EventKind,
    pub daemon: bool,
    /// Virtual time at which this record was enqueued. Rollback uses it to
    /// decide whether the record is causally downstream of the target.
    pub added_when: SimTime,
    pub tag: Option<HandlerTag>,
    pub handler: H,
    pub user_data: Option<UserData>,
    pub revocation: Option<RevocationAction>,
}

impl<H> EventRecord<H> {
    pub fn order_key(&self) -> OrderKey {
        OrderKey { when: self.when, priority: self.priority, key: self.key }
    }
}

impl<H> fmt::Debug for EventRecord<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventRecord")
            .field("key", &self.key)
            .field("when", &self.when)
            .field("priority", &self.priority)
            .field("kind", &self.kind)
            .field("daemon", &self.daemon)
            .field("added_when", &self.added_when)
            .field("tag", &self.tag)
            .field("user_data", &self.user_data.is_some())
            .finish()
    }
}

/// Firing order: ascending `when`, then descending `priority`, then
/// ascending `key`. Two distinct records never compare equal because keys
/// are globally unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderKey {
    pub when: SimTime,
    pub priority: Priority,
    pub key: EventKey,
}

impl Ord for OrderKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.when
            .cmp(&other.when)
            .then_with(|| other.priority.cmp(&self.priority))
            .then_with(|| self.key.cmp(&other.key))
    }
}

impl PartialOrd for OrderKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
#[path = "record_tests.rs"]
mod tests;
