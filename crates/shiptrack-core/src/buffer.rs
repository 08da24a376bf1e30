//! Order containers.
//!
//! Each container holds [`SharedOrder`] handles and applies its own eviction
//! policy; an order has no back-reference to any of them.
//!
//! - [`LiveWindow`]: orders eligible for rendering in live mode. Bounded by a
//!   viewport-dependent capacity and by a per-entry lifetime.
//! - [`HistoryLog`]: the most recent orders, retained for statistics.
//! - [`ReplayTimeline`]: a cursor over a time-sorted historical backlog that
//!   exposes a sliding window and the revealed prefix as slices.

use std::collections::{VecDeque, vec_deque};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::order::SharedOrder;

/// Default history cap.
pub const DEFAULT_HISTORY_CAPACITY: usize = 500;

/// Upper bound on the replay window regardless of viewport.
pub const DEFAULT_REPLAY_WINDOW_CAP: usize = 50;

// ---------------------------------------------------------------------------
// Capacity policy
// ---------------------------------------------------------------------------

/// Step function from viewport width (px) to live-window capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityPolicy {
    /// Widths strictly below this use `small`.
    pub small_breakpoint: u32,
    /// Widths strictly below this (and at or above `small_breakpoint`) use `medium`.
    pub medium_breakpoint: u32,
    pub small: usize,
    pub medium: usize,
    pub large: usize,
}

impl Default for CapacityPolicy {
    fn default() -> Self {
        Self {
            small_breakpoint: 640,
            medium_breakpoint: 1024,
            small: 30,
            medium: 50,
            large: 75,
        }
    }
}

impl CapacityPolicy {
    pub fn max_active(&self, viewport_width: u32) -> usize {
        if viewport_width < self.small_breakpoint {
            self.small
        } else if viewport_width < self.medium_breakpoint {
            self.medium
        } else {
            self.large
        }
    }
}

// ---------------------------------------------------------------------------
// Live window
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct LiveEntry {
    order: SharedOrder,
    /// Scheduler time at which the entry leaves the window.
    expires_at: Duration,
}

/// Orders currently eligible for rendering in live mode.
///
/// Appends go to the back. When the window exceeds its capacity the oldest
/// appended entries are evicted from the front. Independently, every entry
/// expires `lifetime` after it was appended.
#[derive(Debug, Clone)]
pub struct LiveWindow {
    entries: VecDeque<LiveEntry>,
    capacity: usize,
    lifetime: Duration,
    evicted_total: u64,
    expired_total: u64,
}

impl LiveWindow {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize, lifetime: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
            lifetime,
            evicted_total: 0,
            expired_total: 0,
        }
    }

    /// Append `order` at scheduler time `now`. Returns how many entries were
    /// evicted to get back under capacity.
    pub fn push(&mut self, order: SharedOrder, now: Duration) -> usize {
        self.entries.push_back(LiveEntry {
            order,
            expires_at: now + self.lifetime,
        });
        self.trim()
    }

    /// Remove every entry whose lifetime has elapsed at `now`. Returns the
    /// number removed; an empty window is a no-op.
    pub fn expire(&mut self, now: Duration) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.expires_at > now);
        let removed = before - self.entries.len();
        self.expired_total += removed as u64;
        removed
    }

    /// Change the capacity, evicting immediately if the window is now over it.
    /// A capacity of 0 is clamped to 1.
    pub fn set_capacity(&mut self, capacity: usize) -> usize {
        self.capacity = capacity.max(1);
        self.trim()
    }

    fn trim(&mut self) -> usize {
        let mut evicted = 0;
        while self.entries.len() > self.capacity {
            if self.entries.pop_front().is_none() {
                break;
            }
            evicted += 1;
        }
        self.evicted_total += evicted as u64;
        evicted
    }

    /// Earliest pending expiry, if any.
    pub fn next_expiry(&self) -> Option<Duration> {
        self.entries.iter().map(|e| e.expires_at).min()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SharedOrder> + '_ {
        self.entries.iter().map(|e| &e.order)
    }

    /// Snapshot of the current contents, oldest first.
    pub fn to_vec(&self) -> Vec<SharedOrder> {
        self.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Entries dropped for capacity since creation.
    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    /// Entries dropped for age since creation.
    pub fn expired_total(&self) -> u64 {
        self.expired_total
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

// ---------------------------------------------------------------------------
// History log
// ---------------------------------------------------------------------------

/// Capped log of the most recent orders. Oldest first.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    orders: VecDeque<SharedOrder>,
    capacity: usize,
    total_pushed: u64,
}

impl HistoryLog {
    /// A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            orders: VecDeque::with_capacity(capacity),
            capacity,
            total_pushed: 0,
        }
    }

    /// Append an order, returning the oldest one if it fell off the end.
    pub fn push(&mut self, order: SharedOrder) -> Option<SharedOrder> {
        self.total_pushed += 1;
        let dropped = if self.orders.len() == self.capacity {
            self.orders.pop_front()
        } else {
            None
        };
        self.orders.push_back(order);
        dropped
    }

    pub fn extend<I: IntoIterator<Item = SharedOrder>>(&mut self, orders: I) {
        for order in orders {
            self.push(order);
        }
    }

    /// The last `n` orders (or all of them if fewer), oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &SharedOrder> + '_ {
        let skip = self.orders.len().saturating_sub(n);
        self.orders.iter().skip(skip)
    }

    /// Oldest first. Cloneable and exact-size, so callers can make two passes.
    pub fn iter(&self) -> vec_deque::Iter<'_, SharedOrder> {
        self.orders.iter()
    }

    pub fn latest(&self) -> Option<&SharedOrder> {
        self.orders.back()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Orders pushed since creation, including those since dropped.
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    pub fn clear(&mut self) {
        self.orders.clear();
    }
}

impl Default for HistoryLog {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Replay timeline
// ---------------------------------------------------------------------------

/// A cursor over a time-sorted backlog.
///
/// The cursor `c` counts revealed orders. The visible window is
/// `backlog[c.saturating_sub(w)..c]` and the revealed prefix is
/// `backlog[..c]`; both are borrowed slices, so scrubbing costs nothing
/// beyond what the caller copies out.
#[derive(Debug, Clone, Default)]
pub struct ReplayTimeline {
    backlog: Vec<SharedOrder>,
    cursor: usize,
    window_size: usize,
}

impl ReplayTimeline {
    /// `backlog` must already be sorted ascending by timestamp.
    pub fn new(backlog: Vec<SharedOrder>, window_size: usize) -> Self {
        debug_assert!(
            backlog.windows(2).all(|w| w[0].created_at <= w[1].created_at),
            "replay backlog must be sorted by timestamp"
        );
        Self {
            backlog,
            cursor: 0,
            window_size,
        }
    }

    /// Reveal the next order. Returns it, or `None` when the backlog is exhausted.
    pub fn advance(&mut self) -> Option<&SharedOrder> {
        if self.cursor >= self.backlog.len() {
            return None;
        }
        self.cursor += 1;
        self.backlog.get(self.cursor - 1)
    }

    /// Move the cursor to `cursor`, clamped to the backlog length.
    pub fn seek(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.backlog.len());
    }

    /// Move the cursor to `floor(pct / 100 * len)`. `pct` is clamped to
    /// `[0, 100]`; NaN is treated as 0. Returns the new cursor.
    pub fn seek_progress(&mut self, pct: f64) -> usize {
        let pct = if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) };
        let target = (pct / 100.0 * self.backlog.len() as f64).floor() as usize;
        self.seek(target);
        self.cursor
    }

    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// The trailing `window_size` revealed orders.
    pub fn window(&self) -> &[SharedOrder] {
        let start = self.cursor.saturating_sub(self.window_size);
        &self.backlog[start..self.cursor]
    }

    /// Every revealed order.
    pub fn revealed(&self) -> &[SharedOrder] {
        &self.backlog[..self.cursor]
    }

    pub fn backlog(&self) -> &[SharedOrder] {
        &self.backlog
    }

    /// Percentage of the backlog revealed, in `[0, 100]`. An empty backlog
    /// reports 0.
    pub fn progress(&self) -> f64 {
        if self.backlog.is_empty() {
            0.0
        } else {
            self.cursor as f64 / self.backlog.len() as f64 * 100.0
        }
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.backlog.len()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.backlog.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backlog.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    pub fn set_window_size(&mut self, window_size: usize) {
        self.window_size = window_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{make_order, make_orders_at};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    // -- CapacityPolicy --

    #[test]
    fn capacity_steps_at_breakpoints() {
        let policy = CapacityPolicy::default();
        assert_eq!(policy.max_active(300), 30);
        assert_eq!(policy.max_active(639), 30);
        assert_eq!(policy.max_active(640), 50);
        assert_eq!(policy.max_active(800), 50);
        assert_eq!(policy.max_active(1023), 50);
        assert_eq!(policy.max_active(1024), 75);
        assert_eq!(policy.max_active(1400), 75);
    }

    // -- LiveWindow --

    #[test]
    fn live_window_evicts_oldest_over_capacity() {
        let mut window = LiveWindow::new(3, ms(3000));
        let orders: Vec<_> = (0..5).map(|i| make_order(i)).collect();
        let mut evicted = 0;
        for o in &orders {
            evicted += window.push(o.clone(), ms(0));
        }
        assert_eq!(evicted, 2);
        assert_eq!(window.len(), 3);
        let ids: Vec<_> = window.iter().map(|o| o.id).collect();
        assert_eq!(ids, orders[2..].iter().map(|o| o.id).collect::<Vec<_>>());
        assert_eq!(window.evicted_total(), 2);
    }

    #[test]
    fn live_window_expires_after_lifetime() {
        let mut window = LiveWindow::new(10, ms(3000));
        window.push(make_order(0), ms(0));
        window.push(make_order(1), ms(1500));

        assert_eq!(window.expire(ms(2999)), 0);
        assert_eq!(window.expire(ms(3000)), 1);
        assert_eq!(window.len(), 1);
        assert_eq!(window.next_expiry(), Some(ms(4500)));
        assert_eq!(window.expire(ms(4500)), 1);
        assert!(window.is_empty());
        assert_eq!(window.expired_total(), 2);
    }

    #[test]
    fn expire_on_empty_window_is_noop() {
        let mut window = LiveWindow::new(5, ms(3000));
        assert_eq!(window.expire(ms(10_000)), 0);
        assert_eq!(window.set_capacity(1), 0);
        assert!(window.is_empty());
    }

    #[test]
    fn shrinking_capacity_trims_immediately() {
        let mut window = LiveWindow::new(75, ms(3000));
        for i in 0..60 {
            window.push(make_order(i), ms(0));
        }
        assert_eq!(window.set_capacity(30), 30);
        assert_eq!(window.len(), 30);
        assert_eq!(window.capacity(), 30);
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let mut window = LiveWindow::new(0, ms(3000));
        window.push(make_order(0), ms(0));
        window.push(make_order(1), ms(0));
        assert_eq!(window.len(), 1);
    }

    // -- HistoryLog --

    #[test]
    fn history_caps_and_reports_dropped() {
        let mut log = HistoryLog::new(3);
        let orders: Vec<_> = (0..4).map(|i| make_order(i)).collect();
        assert!(log.push(orders[0].clone()).is_none());
        log.push(orders[1].clone());
        log.push(orders[2].clone());
        let dropped = log.push(orders[3].clone()).unwrap();
        assert_eq!(dropped.id, orders[0].id);
        assert_eq!(log.len(), 3);
        assert_eq!(log.total_pushed(), 4);
        assert_eq!(log.latest().unwrap().id, orders[3].id);
    }

    #[test]
    fn history_recent_takes_tail() {
        let mut log = HistoryLog::default();
        let orders: Vec<_> = (0..10).map(|i| make_order(i)).collect();
        log.extend(orders.iter().cloned());
        let recent: Vec<_> = log.recent(3).map(|o| o.id).collect();
        assert_eq!(recent, orders[7..].iter().map(|o| o.id).collect::<Vec<_>>());
        assert_eq!(log.recent(50).count(), 10);
        assert_eq!(log.capacity(), DEFAULT_HISTORY_CAPACITY);
    }

    // -- ReplayTimeline --

    #[test]
    fn replay_window_slides_with_cursor() {
        let backlog = make_orders_at(10);
        let mut timeline = ReplayTimeline::new(backlog.clone(), 3);
        assert!(timeline.window().is_empty());

        for _ in 0..2 {
            timeline.advance();
        }
        assert_eq!(timeline.window().len(), 2);

        for _ in 0..3 {
            timeline.advance();
        }
        let ids: Vec<_> = timeline.window().iter().map(|o| o.id).collect();
        assert_eq!(ids, backlog[2..5].iter().map(|o| o.id).collect::<Vec<_>>());
        assert_eq!(timeline.revealed().len(), 5);
        assert_eq!(timeline.progress(), 50.0);
    }

    #[test]
    fn replay_advance_stops_at_end() {
        let mut timeline = ReplayTimeline::new(make_orders_at(2), 50);
        assert!(timeline.advance().is_some());
        assert!(timeline.advance().is_some());
        assert!(timeline.is_finished());
        assert!(timeline.advance().is_none());
        assert_eq!(timeline.cursor(), 2);
    }

    #[test]
    fn seek_progress_floors_and_clamps() {
        let mut timeline = ReplayTimeline::new(make_orders_at(7), 50);
        assert_eq!(timeline.seek_progress(50.0), 3);
        assert_eq!(timeline.seek_progress(150.0), 7);
        assert!(timeline.is_finished());
        assert_eq!(timeline.seek_progress(-10.0), 0);
        assert_eq!(timeline.seek_progress(f64::NAN), 0);
    }

    #[test]
    fn seek_is_idempotent() {
        let mut timeline = ReplayTimeline::new(make_orders_at(40), 10);
        timeline.seek_progress(62.5);
        let first: Vec<_> = timeline.window().iter().map(|o| o.id).collect();
        timeline.seek_progress(62.5);
        let second: Vec<_> = timeline.window().iter().map(|o| o.id).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn reset_rewinds() {
        let mut timeline = ReplayTimeline::new(make_orders_at(5), 50);
        timeline.seek(4);
        timeline.reset();
        assert_eq!(timeline.cursor(), 0);
        assert!(timeline.revealed().is_empty());
    }

    #[test]
    fn empty_timeline() {
        let mut timeline = ReplayTimeline::new(Vec::new(), 50);
        assert!(timeline.is_finished());
        assert!(timeline.advance().is_none());
        assert_eq!(timeline.progress(), 0.0);
        assert!(timeline.window().is_empty());
    }

    #[test]
    fn shrinking_window_size_applies_on_next_read() {
        let mut timeline = ReplayTimeline::new(make_orders_at(20), 10);
        timeline.seek(20);
        assert_eq!(timeline.window().len(), 10);
        timeline.set_window_size(4);
        assert_eq!(timeline.window().len(), 4);
    }
}
