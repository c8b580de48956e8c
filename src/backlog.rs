//! Offline event backlog
//!
//! Events drained while no server session exists are parked here and
//! replayed in arrival order once the session comes up. The backlog is
//! bounded; when full, the oldest entry is dropped to make room.

use heapless::Deque;

use crate::config::MAX_EVENT_NO_CONN;
use crate::events::EventInfo;

/// Event parked while disconnected
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingEvent {
    /// Descriptor as reported
    pub info: &'static EventInfo,
    /// Monotonic time the supervisor first saw it, in microseconds
    pub timestamp_us: u64,
}

/// Bounded FIFO of [`PendingEvent`]s
#[derive(Debug, Default)]
pub struct PendingEventBacklog {
    entries: Deque<PendingEvent, MAX_EVENT_NO_CONN>,
    dropped: u32,
}

impl PendingEventBacklog {
    /// Empty backlog
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Deque::new(),
            dropped: 0,
        }
    }

    /// Append an event
    ///
    /// Returns `true` if the backlog was full and its oldest entry was
    /// dropped to make room.
    pub fn push(&mut self, info: &'static EventInfo, timestamp_us: u64) -> bool {
        let overflowed = if self.entries.is_full() {
            self.entries.pop_front();
            self.dropped = self.dropped.saturating_add(1);
            true
        } else {
            false
        };
        // A slot is free at this point.
        let _ = self.entries.push_back(PendingEvent { info, timestamp_us });
        overflowed
    }

    /// Remove and return the oldest entry
    pub fn pop(&mut self) -> Option<PendingEvent> {
        self.entries.pop_front()
    }

    /// Entries, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &PendingEvent> {
        self.entries.iter()
    }

    /// Number of parked events
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if nothing is parked
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Events dropped to overflow since boot
    #[must_use]
    pub const fn dropped(&self) -> u32 {
        self.dropped
    }
}
