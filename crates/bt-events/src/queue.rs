//! `EventQueue` — the episode's clock and pending-event set.
//!
//! # Ordering
//!
//! Events are keyed by `(time, kind priority, insertion seq)`.  `seq` is a
//! monotonically increasing counter, so two events with identical time and
//! priority fire in the order they were scheduled.  The key is total, which
//! makes the dispatch order a pure function of the schedule calls.
//!
//! # Cancellation
//!
//! `BTreeMap` gives O(log n) insert, pop-first and remove-by-key.  A handle
//! *is* the key, so cancelling is a real removal: a cancelled event can
//! never be popped later.  Cancelling a handle whose event already fired (or
//! was already cancelled) is detected and reported, not ignored.

use std::collections::BTreeMap;

use bt_core::SimTime;

use crate::{EventKind, EventsError, EventsResult};

// ── Keys and handles ──────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
struct EventKey {
    time:     SimTime,
    priority: u8,
    seq:      u64,
}

/// Opaque reference to a queued event, returned by [`EventQueue::schedule`].
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct EventHandle(EventKey);

impl EventHandle {
    /// When the referenced event was scheduled to fire.
    pub fn time(&self) -> SimTime {
        self.0.time
    }
}

/// A popped event.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Event {
    pub time: SimTime,
    pub kind: EventKind,
}

// ── EventQueue ────────────────────────────────────────────────────────────────

/// Priority queue of future events plus the current simulation time.
#[derive(Default)]
pub struct EventQueue {
    inner:    BTreeMap<EventKey, EventKind>,
    now:      SimTime,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current simulation time: the timestamp of the last popped event.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Insert `kind` to fire at `at`.
    ///
    /// Scheduling at exactly `now()` is allowed; anything earlier is an
    /// [`EventsError::InPast`].
    pub fn schedule(&mut self, at: SimTime, kind: EventKind) -> EventsResult<EventHandle> {
        if at < self.now {
            return Err(EventsError::InPast { at, now: self.now });
        }
        let key = EventKey { time: at, priority: kind.priority(), seq: self.next_seq };
        self.next_seq += 1;
        self.inner.insert(key, kind);
        Ok(EventHandle(key))
    }

    /// Remove and return the earliest event, advancing `now()` to its time.
    pub fn pop_next(&mut self) -> Option<Event> {
        let (key, kind) = self.inner.pop_first()?;
        self.now = key.time;
        Some(Event { time: key.time, kind })
    }

    /// Timestamp of the earliest pending event without removing it.
    pub fn peek_time(&self) -> Option<SimTime> {
        self.inner.keys().next().map(|k| k.time)
    }

    /// Remove a pending event.  Returns `false` if it already fired or was
    /// already cancelled.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.inner.remove(&handle.0).is_some()
    }

    /// Cancel `handle` and schedule the same event kind at `at`.
    ///
    /// `kind` replaces the payload, letting callers bump generation counters
    /// in the same step.
    pub fn reschedule(
        &mut self,
        handle: EventHandle,
        at:     SimTime,
        kind:   EventKind,
    ) -> EventsResult<EventHandle> {
        if at < self.now {
            return Err(EventsError::InPast { at, now: self.now });
        }
        if !self.cancel(handle) {
            return Err(EventsError::StaleHandle(handle));
        }
        self.schedule(at, kind)
    }

    /// Whether `handle` still refers to a pending event.
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.inner.contains_key(&handle.0)
    }

    /// Drop every pending event (episode truncation).  `now()` is unchanged.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Advance the clock without an event, e.g. to the horizon at episode end.
    ///
    /// Never moves time backwards.
    pub fn advance_to(&mut self, t: SimTime) {
        if t > self.now {
            self.now = t;
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
