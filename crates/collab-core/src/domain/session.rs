//! The active-session cell and the subscriber registry.
//!
//! Both types are shared between many inbound message handlers and the local
//! control task, so each hides its state behind a single `std::sync::Mutex`
//! and exposes only whole transitions.  No method here performs I/O, so a
//! lock is never held across a network call.
//!
//! # Why `std::sync::Mutex` rather than `tokio::sync::Mutex`?
//!
//! Every critical section is a handful of pointer moves with no `.await`
//! inside.  A blocking mutex is the right tool for that; an async mutex only
//! pays off when the guard must live across an await point.
//!
//! # Poisoning
//!
//! A panic while holding one of these locks cannot leave the protected value
//! half-written (each section is a single assignment or map operation), so a
//! poisoned lock is recovered with [`PoisonError::into_inner`].

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::collaboration::{CollaborationRequest, Subscriber};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── SessionCell ───────────────────────────────────────────────────────────────

/// Holds the one collaboration request currently occupying this node.
///
/// The cell is either empty (**Idle**) or holds a request (**Active**).
/// [`try_occupy`](Self::try_occupy) is the compare-and-set that moves Idle to
/// Active; two callers racing on an idle cell cannot both win.
#[derive(Debug, Default)]
pub struct SessionCell {
    active: Mutex<Option<CollaborationRequest>>,
}

impl SessionCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves Idle to Active with `request`.
    ///
    /// Returns `false` without touching the cell when it is already Active.
    pub fn try_occupy(&self, request: CollaborationRequest) -> bool {
        let mut active = lock(&self.active);
        if active.is_some() {
            return false;
        }
        *active = Some(request);
        true
    }

    /// Empties the cell and returns what it held.
    pub fn take(&self) -> Option<CollaborationRequest> {
        lock(&self.active).take()
    }

    /// Empties the cell only if it still holds `request`.
    ///
    /// Used to roll back an occupation whose follow-up send failed without
    /// clobbering a session that replaced it in the meantime.
    pub fn release(&self, request: &CollaborationRequest) -> bool {
        let mut active = lock(&self.active);
        if active.as_ref() == Some(request) {
            *active = None;
            true
        } else {
            false
        }
    }

    /// Empties the cell unconditionally.
    pub fn clear(&self) {
        *lock(&self.active) = None;
    }

    /// Snapshot of the active request.
    pub fn current(&self) -> Option<CollaborationRequest> {
        lock(&self.active).clone()
    }
}

// ── SubscriberRegistry ────────────────────────────────────────────────────────

/// Subscribers per session, owned by the node that announced the session.
///
/// Entries appear lazily on the first subscription.  Duplicates are kept: a
/// peer that subscribes twice is notified twice.
///
/// [`take`](Self::take) removes a whole entry in one step.  A subscription
/// that lands before the removal is part of the returned list; one that lands
/// after it starts a fresh entry that nobody will tear down.  That straggler
/// is accepted: it only means the late peer never hears a stop.
///
/// Straggler entries, and entries for filenames this node never announced,
/// stay until the next [`purge`](Self::purge).  The owner purges when it
/// claims a new session, so the map never outlives more than one session's
/// worth of stale subscriptions.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    entries: Mutex<HashMap<CollaborationRequest, Vec<Subscriber>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `subscriber` to the entry for `request`, creating it if absent.
    pub fn register(&self, request: CollaborationRequest, subscriber: Subscriber) {
        lock(&self.entries)
            .entry(request)
            .or_default()
            .push(subscriber);
    }

    /// Removes the entry for `request` and returns its subscribers.
    pub fn take(&self, request: &CollaborationRequest) -> Vec<Subscriber> {
        lock(&self.entries).remove(request).unwrap_or_default()
    }

    /// Number of subscribers currently registered for `request`.
    pub fn subscriber_count(&self, request: &CollaborationRequest) -> usize {
        lock(&self.entries).get(request).map_or(0, Vec::len)
    }

    /// Drops every entry and returns how many subscribers were discarded.
    pub fn purge(&self) -> usize {
        lock(&self.entries).drain().map(|(_, subscribers)| subscribers.len()).sum()
    }
}
