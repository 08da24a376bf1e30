//! The read-only view a renderer consumes.

use std::sync::Arc;
use std::time::Duration;

use shiptrack_core::catalog::Warehouse;
use shiptrack_core::filter::OrderFilter;
use shiptrack_core::generator::TimeRange;
use shiptrack_core::order::SharedOrder;
use shiptrack_milestones::{DailyGoal, Milestone};
use shiptrack_stats::Stats;

/// Replay transport state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReplayStatus {
    pub playing: bool,
    pub speed: f64,
    pub cursor: usize,
    pub total: usize,
    /// `cursor / total * 100`; 0 for an empty backlog.
    pub progress: f64,
    pub finished: bool,
}

/// A snapshot of everything the UI draws.
///
/// Orders and warehouses are shared handles, so building a frame copies at
/// most one window of pointers.
#[derive(Debug, Clone)]
pub struct Frame {
    pub mode: TimeRange,
    /// Time since mount.
    pub elapsed: Duration,
    pub visible: bool,
    pub muted: bool,
    /// Orders to draw as arcs, after the filter.
    pub active_orders: Vec<SharedOrder>,
    /// Size of the active window before filtering.
    pub active_unfiltered: usize,
    pub capacity: usize,
    pub stats: Stats,
    pub warehouses: Arc<[Warehouse]>,
    pub daily_goal: DailyGoal,
    /// Order totals from recent aggregation passes, oldest first.
    pub order_trend: Vec<u64>,
    /// `None` in live mode.
    pub replay: Option<ReplayStatus>,
    pub filter: OrderFilter,
    pub latest_milestone: Option<Milestone>,
}

impl Frame {
    pub fn is_live(&self) -> bool {
        self.mode.is_live()
    }

    pub fn hottest_warehouse(&self) -> Option<&Warehouse> {
        self.warehouses
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
    }
}
