//! Explicit tick scheduler.
//!
//! The dashboard owns one [`Scheduler`] and one clock: a [`Duration`] since
//! mount. Three named timers ([`TimerKind`]) each carry their own period and
//! next due time. Timers are independent and not phase-aligned; the caller
//! advances time with [`Scheduler::pop_due`], which yields every due tick in
//! chronological order, breaking ties by [`TimerKind`] order.
//!
//! Rescheduling is fixed-rate: a fired timer's next due time is its previous
//! due time plus its period, so late dispatch never causes drift.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Shortest period a timer may have.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// The named timers, in same-instant dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimerKind {
    Generation,
    ReplayAdvance,
    Aggregation,
}

impl TimerKind {
    pub const ALL: [TimerKind; 3] = [
        TimerKind::Generation,
        TimerKind::ReplayAdvance,
        TimerKind::Aggregation,
    ];

    fn index(self) -> usize {
        match self {
            TimerKind::Generation => 0,
            TimerKind::ReplayAdvance => 1,
            TimerKind::Aggregation => 2,
        }
    }
}

/// A tick popped from the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledTick {
    pub kind: TimerKind,
    /// Scheduler time the tick was due.
    pub at: Duration,
}

#[derive(Debug, Clone, Copy, Default)]
struct Timer {
    period: Duration,
    next_due: Option<Duration>,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    now: Duration,
    timers: [Timer; 3],
    fired: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scheduler time.
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Ticks dispatched since creation.
    pub fn fired(&self) -> u64 {
        self.fired
    }

    /// Arm `kind` to fire every `period`, first at `now + period`. Re-arming
    /// an armed timer restarts its phase. Periods below [`MIN_PERIOD`] are
    /// clamped.
    pub fn arm(&mut self, kind: TimerKind, period: Duration) {
        let period = period.max(MIN_PERIOD);
        self.timers[kind.index()] = Timer {
            period,
            next_due: Some(self.now + period),
        };
    }

    pub fn disarm(&mut self, kind: TimerKind) {
        self.timers[kind.index()].next_due = None;
    }

    pub fn disarm_all(&mut self) {
        for timer in &mut self.timers {
            timer.next_due = None;
        }
    }

    /// Change the period. An armed timer restarts from now with the new period.
    pub fn set_period(&mut self, kind: TimerKind, period: Duration) {
        if self.is_armed(kind) {
            self.arm(kind, period);
        } else {
            self.timers[kind.index()].period = period.max(MIN_PERIOD);
        }
    }

    pub fn is_armed(&self, kind: TimerKind) -> bool {
        self.timers[kind.index()].next_due.is_some()
    }

    pub fn period(&self, kind: TimerKind) -> Duration {
        self.timers[kind.index()].period
    }

    pub fn next_due(&self, kind: TimerKind) -> Option<Duration> {
        self.timers[kind.index()].next_due
    }

    /// Earliest due time over all armed timers.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.timers.iter().filter_map(|t| t.next_due).min()
    }

    /// Pop the earliest tick due at or before `until`, moving the clock to
    /// its due time and rescheduling the timer. Returns `None` when nothing
    /// is due; the clock is then left unchanged (see [`settle`](Self::settle)).
    pub fn pop_due(&mut self, until: Duration) -> Option<ScheduledTick> {
        let mut best: Option<(usize, Duration)> = None;
        for (i, timer) in self.timers.iter().enumerate() {
            let Some(due) = timer.next_due else { continue };
            if due <= until && best.is_none_or(|(_, b)| due < b) {
                best = Some((i, due));
            }
        }
        let (index, at) = best?;
        let timer = &mut self.timers[index];
        timer.next_due = Some(at + timer.period);
        self.now = self.now.max(at);
        self.fired += 1;
        Some(ScheduledTick {
            kind: TimerKind::ALL[index],
            at,
        })
    }

    /// Move the clock forward to `until` once every due tick has been popped.
    pub fn settle(&mut self, until: Duration) {
        self.now = self.now.max(until);
    }
}

// ---------------------------------------------------------------------------
// Timing configuration
// ---------------------------------------------------------------------------

/// Timer periods and the live-order lifetime, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub generation_ms: u64,
    pub order_lifetime_ms: u64,
    pub aggregation_ms: u64,
    /// Replay interval at 1x speed.
    pub replay_base_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            generation_ms: 1500,
            order_lifetime_ms: 3000,
            aggregation_ms: 2000,
            replay_base_ms: 50,
        }
    }
}

impl TimingConfig {
    pub fn generation_period(&self) -> Duration {
        Duration::from_millis(self.generation_ms)
    }

    pub fn order_lifetime(&self) -> Duration {
        Duration::from_millis(self.order_lifetime_ms)
    }

    pub fn aggregation_period(&self) -> Duration {
        Duration::from_millis(self.aggregation_ms)
    }

    /// `replay_base / speed`, never shorter than [`MIN_PERIOD`]. Speed must
    /// be finite and positive; the caller validates it.
    pub fn replay_period(&self, speed: f64) -> Duration {
        let base = Duration::from_millis(self.replay_base_ms);
        if !(speed.is_finite() && speed > 0.0) {
            return base.max(MIN_PERIOD);
        }
        let nanos = (base.as_nanos() as f64 / speed).round() as u64;
        Duration::from_nanos(nanos).max(MIN_PERIOD)
    }
}
