//! Time-prorated goals.
//!
//! Progress is compared with how much of the period has elapsed. The
//! elapsed fraction is always recomputed at call time.

use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

/// Width of the on-track band either side of the expected percentage.
pub const TREND_TOLERANCE_PCT: f64 = 5.0;

// ---------------------------------------------------------------------------
// Trend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Ahead,
    Behind,
    OnTrack,
}

impl Trend {
    /// `Ahead` above `expected + 5`, `Behind` below `expected - 5`.
    pub fn classify(percentage: f64, expected: f64) -> Self {
        if percentage > expected + TREND_TOLERANCE_PCT {
            Trend::Ahead
        } else if percentage < expected - TREND_TOLERANCE_PCT {
            Trend::Behind
        } else {
            Trend::OnTrack
        }
    }
}

// ---------------------------------------------------------------------------
// Daily goal
// ---------------------------------------------------------------------------

/// Progress toward the daily order target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyGoal {
    pub target: u64,
    pub current: u64,
    /// `min(current / target * 100, 100)`.
    pub percentage: f64,
    /// `current / target`, not capped.
    pub ratio: f64,
    pub is_complete: bool,
    pub trend: Trend,
}

/// Fraction of the day elapsed at `time`, at minute resolution.
pub fn day_elapsed_fraction(time: NaiveTime) -> f64 {
    (time.hour() as f64 + time.minute() as f64 / 60.0) / 24.0
}

/// Daily goal against the local wall clock, read at call time.
pub fn calculate_daily_goal(current: u64, target: u64) -> DailyGoal {
    calculate_daily_goal_at(current, target, Local::now().time())
}

/// Daily goal as of `time_of_day`.
///
/// A zero target counts as complete at 100%.
pub fn calculate_daily_goal_at(current: u64, target: u64, time_of_day: NaiveTime) -> DailyGoal {
    let progress = progress(
        current as f64,
        target as f64,
        day_elapsed_fraction(time_of_day),
    );
    DailyGoal {
        target,
        current,
        percentage: progress.percentage,
        ratio: progress.ratio,
        is_complete: current >= target,
        trend: progress.trend,
    }
}

// ---------------------------------------------------------------------------
// Period goals
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalPeriod {
    Day,
    /// Monday through Sunday.
    Week,
    Month,
}

/// Fraction of `period` elapsed at `now`, in `[0, 1)`.
pub fn period_elapsed_fraction(period: GoalPeriod, now: NaiveDateTime) -> f64 {
    let day = day_elapsed_fraction(now.time());
    match period {
        GoalPeriod::Day => day,
        GoalPeriod::Week => (now.weekday().num_days_from_monday() as f64 + day) / 7.0,
        GoalPeriod::Month => {
            let days = days_in_month(now.date()) as f64;
            (now.day0() as f64 + day) / days
        }
    }
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (year, month) = (date.year(), date.month());
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        _ => 30,
    }
}

/// Progress toward any target (orders, revenue, units).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub period: GoalPeriod,
    pub target: f64,
    pub current: f64,
    pub percentage: f64,
    pub ratio: f64,
    pub is_complete: bool,
    /// Percentage of the period already elapsed.
    pub expected: f64,
    pub trend: Trend,
}

/// Progress toward `target` within `period` as of `now`.
pub fn calculate_goal(current: f64, target: f64, period: GoalPeriod, now: NaiveDateTime) -> GoalProgress {
    let elapsed = period_elapsed_fraction(period, now);
    let p = progress(current, target, elapsed);
    GoalProgress {
        period,
        target,
        current,
        percentage: p.percentage,
        ratio: p.ratio,
        is_complete: current >= target,
        expected: elapsed * 100.0,
        trend: p.trend,
    }
}

struct Progress {
    percentage: f64,
    ratio: f64,
    trend: Trend,
}

fn progress(current: f64, target: f64, elapsed_fraction: f64) -> Progress {
    let ratio = if target > 0.0 { current / target } else { 1.0 };
    let percentage = (ratio * 100.0).min(100.0);
    Progress {
        percentage,
        ratio,
        trend: Trend::classify(percentage, elapsed_fraction * 100.0),
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// User-adjustable goal targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalSettings {
    pub daily_orders: u64,
    pub weekly_orders: u64,
    pub monthly_orders: u64,
    pub monthly_revenue: f64,
    pub monthly_units: u64,
    /// Whether reached milestones trigger celebration cues.
    pub celebrations_enabled: bool,
}

impl Default for GoalSettings {
    fn default() -> Self {
        Self {
            daily_orders: 500,
            weekly_orders: 3500,
            monthly_orders: 15000,
            monthly_revenue: 50000.0,
            monthly_units: 10000,
            celebrations_enabled: true,
        }
    }
}

/// Weekly and monthly progress for one set of totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PeriodGoals {
    pub weekly_orders: GoalProgress,
    pub monthly_orders: GoalProgress,
    pub monthly_revenue: GoalProgress,
    pub monthly_units: GoalProgress,
}

impl GoalSettings {
    pub fn period_goals(&self, orders: u64, units: u64, revenue: f64, now: NaiveDateTime) -> PeriodGoals {
        PeriodGoals {
            weekly_orders: calculate_goal(orders as f64, self.weekly_orders as f64, GoalPeriod::Week, now),
            monthly_orders: calculate_goal(orders as f64, self.monthly_orders as f64, GoalPeriod::Month, now),
            monthly_revenue: calculate_goal(revenue, self.monthly_revenue, GoalPeriod::Month, now),
            monthly_units: calculate_goal(units as f64, self.monthly_units as f64, GoalPeriod::Month, now),
        }
    }
}
