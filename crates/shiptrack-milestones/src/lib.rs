//! Milestone and goal tracking for the shipment dashboard.
//!
//! # Milestones
//!
//! A [`MilestoneDef`] is a fixed threshold on one cumulative metric. Each
//! `(metric, threshold)` pair is either not reached or reached; the
//! transition happens once and is terminal. [`detect_new_milestone`] scans
//! the table in order and returns only the *first* newly crossed entry, so
//! several thresholds crossed at once are discovered over successive calls
//! (one celebration per aggregation pass).
//!
//! # Goals
//!
//! [`calculate_daily_goal`] compares progress toward a daily target with the
//! fraction of the day already gone, classifying the result as a [`Trend`].
//! [`calculate_goal`] generalises this to weekly and monthly [`GoalPeriod`]s.

pub mod goal;

pub use goal::{
    DailyGoal, GoalPeriod, GoalProgress, GoalSettings, PeriodGoals, Trend, calculate_daily_goal,
    calculate_daily_goal_at, calculate_goal, day_elapsed_fraction, period_elapsed_fraction,
};

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shiptrack_stats::Stats;

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

/// Which cumulative stat a milestone watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneMetric {
    Orders,
    Units,
    Value,
}

impl MilestoneMetric {
    /// Current value of this metric in `stats`.
    pub fn read(self, stats: &Stats) -> f64 {
        match self {
            MilestoneMetric::Orders => stats.total_orders as f64,
            MilestoneMetric::Units => stats.total_units as f64,
            MilestoneMetric::Value => stats.total_value,
        }
    }
}

impl fmt::Display for MilestoneMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MilestoneMetric::Orders => "orders",
            MilestoneMetric::Units => "units",
            MilestoneMetric::Value => "value",
        })
    }
}

/// Identity of a milestone. Two definitions with the same key are the same
/// milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MilestoneKey {
    pub metric: MilestoneMetric,
    pub threshold: u64,
}

impl fmt::Display for MilestoneKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.metric, self.threshold)
    }
}

/// An immutable threshold definition with display metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneDef {
    pub metric: MilestoneMetric,
    pub threshold: u64,
    pub emoji: String,
    pub title: String,
    pub description: String,
}

impl MilestoneDef {
    pub fn new(
        metric: MilestoneMetric,
        threshold: u64,
        emoji: &str,
        title: &str,
        description: &str,
    ) -> Self {
        Self {
            metric,
            threshold,
            emoji: emoji.into(),
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn key(&self) -> MilestoneKey {
        MilestoneKey {
            metric: self.metric,
            threshold: self.threshold,
        }
    }

    pub fn is_crossed(&self, stats: &Stats) -> bool {
        self.metric.read(stats) >= self.threshold as f64
    }
}

/// A milestone that has been reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    #[serde(flatten)]
    pub def: MilestoneDef,
    pub reached_at: DateTime<Utc>,
}

impl Milestone {
    pub fn key(&self) -> MilestoneKey {
        self.def.key()
    }
}

/// The built-in table, in detection order.
pub fn default_table() -> Vec<MilestoneDef> {
    use MilestoneMetric::*;
    vec![
        MilestoneDef::new(Orders, 50, "🎯", "50 Orders!", "First milestone reached!"),
        MilestoneDef::new(Orders, 100, "🔥", "100 Orders!", "Shipping is on fire!"),
        MilestoneDef::new(Orders, 250, "🚀", "250 Orders!", "We're launching!"),
        MilestoneDef::new(Orders, 500, "⭐", "500 Orders!", "Half a thousand!"),
        MilestoneDef::new(Orders, 1000, "💎", "1,000 Orders!", "Diamond milestone!"),
        MilestoneDef::new(Units, 500, "📦", "500 Units!", "Boxes are moving!"),
        MilestoneDef::new(Units, 1000, "📦📦", "1K Units!", "Thousand units shipped!"),
        MilestoneDef::new(Units, 5000, "🏭", "5K Units!", "Factory mode!"),
        MilestoneDef::new(Value, 5000, "💵", "$5K Revenue!", "Money is flowing!"),
        MilestoneDef::new(Value, 10000, "💰", "$10K Revenue!", "Ten thousand dollars!"),
        MilestoneDef::new(Value, 25000, "💎", "$25K Revenue!", "Quarter of $100K!"),
        MilestoneDef::new(Value, 50000, "🏆", "$50K Revenue!", "Halfway to $100K!"),
    ]
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Problems with a milestone table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MilestoneError {
    #[error("milestone {key} is defined more than once")]
    Duplicate { key: MilestoneKey },

    #[error("milestone on {metric} has a zero threshold")]
    ZeroThreshold { metric: MilestoneMetric },
}

/// Check a table for duplicate keys and zero thresholds.
pub fn validate_table(table: &[MilestoneDef]) -> Result<(), MilestoneError> {
    let mut seen = HashSet::new();
    for def in table {
        if def.threshold == 0 {
            return Err(MilestoneError::ZeroThreshold { metric: def.metric });
        }
        if !seen.insert(def.key()) {
            return Err(MilestoneError::Duplicate { key: def.key() });
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

/// The first definition, in table order, that `stats` has crossed and whose
/// key is not in `reached`. At most one per call.
pub fn detect_new_milestone<'a>(
    table: &'a [MilestoneDef],
    stats: &Stats,
    reached: &HashSet<MilestoneKey>,
) -> Option<&'a MilestoneDef> {
    table
        .iter()
        .find(|def| !reached.contains(&def.key()) && def.is_crossed(stats))
}

/// Owns the reached set for one session and records each crossing once.
#[derive(Debug, Clone)]
pub struct MilestoneTracker {
    table: Vec<MilestoneDef>,
    reached: HashSet<MilestoneKey>,
    history: Vec<Milestone>,
}

impl MilestoneTracker {
    pub fn new(table: Vec<MilestoneDef>) -> Result<Self, MilestoneError> {
        validate_table(&table)?;
        Ok(Self {
            table,
            reached: HashSet::new(),
            history: Vec::new(),
        })
    }

    /// Detect and record at most one newly crossed milestone.
    pub fn check(&mut self, stats: &Stats, at: DateTime<Utc>) -> Option<Milestone> {
        let def = detect_new_milestone(&self.table, stats, &self.reached)?.clone();
        self.reached.insert(def.key());
        let milestone = Milestone { def, reached_at: at };
        tracing::info!(key = %milestone.key(), title = %milestone.def.title, "milestone reached");
        self.history.push(milestone.clone());
        Some(milestone)
    }

    pub fn is_reached(&self, key: MilestoneKey) -> bool {
        self.reached.contains(&key)
    }

    /// Reached milestones in the order they fired.
    pub fn reached(&self) -> &[Milestone] {
        &self.history
    }

    pub fn reached_keys(&self) -> &HashSet<MilestoneKey> {
        &self.reached
    }

    pub fn table(&self) -> &[MilestoneDef] {
        &self.table
    }

    /// Definitions not yet reached, in table order.
    pub fn pending(&self) -> impl Iterator<Item = &MilestoneDef> + '_ {
        self.table.iter().filter(|d| !self.reached.contains(&d.key()))
    }
}

impl Default for MilestoneTracker {
    fn default() -> Self {
        Self {
            table: default_table(),
            reached: HashSet::new(),
            history: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiptrack_core::test_utils::noon;

    fn stats(orders: u64, units: u64, value: f64) -> Stats {
        Stats {
            total_orders: orders,
            total_units: units,
            total_value: value,
            ..Stats::default()
        }
    }

    #[test]
    fn default_table_is_valid_and_ordered() {
        let table = default_table();
        assert_eq!(table.len(), 12);
        assert!(validate_table(&table).is_ok());
        assert_eq!(table[0].key(), MilestoneKey { metric: MilestoneMetric::Orders, threshold: 50 });
        assert_eq!(table[11].key(), MilestoneKey { metric: MilestoneMetric::Value, threshold: 50000 });
    }

    #[test]
    fn nothing_crossed_on_empty_stats() {
        let table = default_table();
        assert!(detect_new_milestone(&table, &Stats::default(), &HashSet::new()).is_none());
    }

    #[test]
    fn five_hundred_orders_fires_exactly_once() {
        let table: Vec<_> = default_table()
            .into_iter()
            .filter(|d| d.key() == MilestoneKey { metric: MilestoneMetric::Orders, threshold: 500 })
            .collect();
        let snapshot = stats(500, 0, 0.0);
        let mut reached = HashSet::new();

        let hit = detect_new_milestone(&table, &snapshot, &reached).unwrap();
        assert_eq!(hit.threshold, 500);
        reached.insert(hit.key());

        assert!(detect_new_milestone(&table, &snapshot, &reached).is_none());
    }

    #[test]
    fn first_unreached_in_table_order_wins() {
        let table = default_table();
        let snapshot = stats(500, 0, 0.0);
        let hit = detect_new_milestone(&table, &snapshot, &HashSet::new()).unwrap();
        assert_eq!(hit.threshold, 50);
    }

    #[test]
    fn simultaneous_crossings_surface_progressively() {
        let mut tracker = MilestoneTracker::default();
        let snapshot = stats(120, 600, 100.0);

        let fired: Vec<_> = std::iter::from_fn(|| tracker.check(&snapshot, noon()))
            .map(|m| m.key().to_string())
            .collect();
        assert_eq!(fired, vec!["orders-50", "orders-100", "units-500"]);
        assert_eq!(tracker.reached().len(), 3);
        assert!(tracker.check(&snapshot, noon()).is_none());
    }

    #[test]
    fn reached_never_reverts() {
        let mut tracker = MilestoneTracker::default();
        tracker.check(&stats(60, 0, 0.0), noon()).unwrap();
        // Stats fall back below the threshold (e.g. history eviction).
        assert!(tracker.check(&stats(10, 0, 0.0), noon()).is_none());
        assert!(tracker.is_reached(MilestoneKey { metric: MilestoneMetric::Orders, threshold: 50 }));
        // And crossing again does not re-fire.
        assert!(tracker.check(&stats(60, 0, 0.0), noon()).is_none());
    }

    #[test]
    fn value_metric_uses_fractional_total() {
        let table = default_table();
        let just_under = stats(0, 0, 4999.99);
        assert!(detect_new_milestone(&table, &just_under, &HashSet::new()).is_none());
        let at = stats(0, 0, 5000.0);
        assert_eq!(
            detect_new_milestone(&table, &at, &HashSet::new()).unwrap().title,
            "$5K Revenue!"
        );
    }

    #[test]
    fn pending_shrinks_as_milestones_fire() {
        let mut tracker = MilestoneTracker::default();
        tracker.check(&stats(50, 0, 0.0), noon());
        assert_eq!(tracker.pending().count(), 11);
    }

    #[test]
    fn invalid_tables_rejected() {
        let dup = vec![
            MilestoneDef::new(MilestoneMetric::Units, 10, "", "a", ""),
            MilestoneDef::new(MilestoneMetric::Units, 10, "", "b", ""),
        ];
        assert!(matches!(
            MilestoneTracker::new(dup),
            Err(MilestoneError::Duplicate { .. })
        ));

        let zero = vec![MilestoneDef::new(MilestoneMetric::Orders, 0, "", "z", "")];
        assert_eq!(
            validate_table(&zero).unwrap_err(),
            MilestoneError::ZeroThreshold { metric: MilestoneMetric::Orders }
        );
    }

    #[test]
    fn milestone_serializes_flat() {
        let milestone = Milestone {
            def: default_table().remove(0),
            reached_at: noon(),
        };
        let json = serde_json::to_value(&milestone).unwrap();
        assert_eq!(json["metric"], "orders");
        assert_eq!(json["threshold"], 50);
        assert!(json["reached_at"].is_string());
    }
}
