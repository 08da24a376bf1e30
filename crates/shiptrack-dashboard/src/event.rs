//! Dashboard events and the ring buffer that retains the recent ones.

use std::time::Duration;

use serde::Serialize;
use shiptrack_core::generator::TimeRange;
use shiptrack_core::id::OrderId;
use shiptrack_milestones::Milestone;

/// Default number of events kept by a dashboard.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Something observable that happened during a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum DashboardEvent {
    Mounted,
    Disposed,
    OrderGenerated {
        id: OrderId,
        warehouse: String,
        value: f64,
    },
    OrderRevealed {
        id: OrderId,
        cursor: usize,
    },
    ModeChanged {
        mode: TimeRange,
        backlog: usize,
    },
    ReplayStarted,
    ReplayPaused,
    ReplayFinished,
    Scrubbed {
        cursor: usize,
    },
    SpeedChanged {
        speed: f64,
    },
    CapacityChanged {
        capacity: usize,
        evicted: usize,
    },
    VisibilityChanged {
        visible: bool,
    },
    MuteChanged {
        muted: bool,
    },
    FilterChanged,
    MilestoneReached(Milestone),
    GoalCompleted {
        target: u64,
    },
}

/// An event stamped with dashboard time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedEvent {
    pub at: Duration,
    /// Position in the session's event sequence, starting at 0.
    pub seq: u64,
    pub event: DashboardEvent,
}

// ---------------------------------------------------------------------------
// Ring buffer
// ---------------------------------------------------------------------------

/// A fixed-capacity ring of [`TimedEvent`]s. When full, the oldest event is
/// overwritten.
#[derive(Debug)]
pub struct EventLog {
    slots: Vec<Option<TimedEvent>>,
    /// Next write position.
    head: usize,
    len: usize,
    total_written: u64,
}

impl EventLog {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
            total_written: 0,
        }
    }

    /// Stamp and store an event, returning its sequence number.
    pub fn push(&mut self, at: Duration, event: DashboardEvent) -> u64 {
        let seq = self.total_written;
        let capacity = self.capacity();
        self.slots[self.head] = Some(TimedEvent { at, seq, event });
        self.head = (self.head + 1) % capacity;
        if self.len < capacity {
            self.len += 1;
        }
        self.total_written += 1;
        seq
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Events written since creation, including overwritten ones.
    pub fn total_written(&self) -> u64 {
        self.total_written
    }

    pub fn dropped_count(&self) -> u64 {
        self.total_written.saturating_sub(self.capacity() as u64)
    }

    /// Oldest to newest.
    pub fn iter(&self) -> EventLogIter<'_> {
        let start = if self.len < self.capacity() { 0 } else { self.head };
        EventLogIter {
            log: self,
            index: start,
            remaining: self.len,
        }
    }

    /// The last `n` events, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &TimedEvent> + '_ {
        self.iter().skip(self.len.saturating_sub(n))
    }

    /// Retained events with `seq >= from`, oldest first.
    pub fn since(&self, from: u64) -> impl Iterator<Item = &TimedEvent> + '_ {
        self.iter().filter(move |e| e.seq >= from)
    }

    pub fn latest(&self) -> Option<&TimedEvent> {
        self.iter().last()
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = None;
        }
        self.head = 0;
        self.len = 0;
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

pub struct EventLogIter<'a> {
    log: &'a EventLog,
    index: usize,
    remaining: usize,
}

impl<'a> Iterator for EventLogIter<'a> {
    type Item = &'a TimedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let event = self.log.slots[self.index].as_ref();
        self.index = (self.index + 1) % self.log.capacity();
        self.remaining -= 1;
        event
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for EventLogIter<'_> {}
