//! Longer-horizon reports over a set of orders.
//!
//! These back the reports panel, the per-warehouse drill-down, the
//! destination heatmap and the operational metrics panel. All are pure
//! functions of the orders passed in and an explicit `now`. Day and hour
//! boundaries are UTC.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, Timelike, Utc};
use serde::{Deserialize, Serialize};
use shiptrack_core::catalog::Category;
use shiptrack_core::order::Order;

use crate::{FrequencyTable, RegionCount, percentage_of};

/// Regions listed in a report breakdown.
pub const REPORT_TOP_REGIONS: usize = 10;

/// Nominal per-warehouse capacity used for utilization warnings.
pub const NOMINAL_WAREHOUSE_CAPACITY: u64 = 200;

/// Utilization (percent) above which a warehouse is flagged.
pub const CAPACITY_WARNING_PCT: f64 = 80.0;

// ---------------------------------------------------------------------------
// Report range
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReportRange {
    #[serde(rename = "7d")]
    Last7Days,
    #[default]
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "90d")]
    Last90Days,
    #[serde(rename = "all")]
    AllTime,
}

impl ReportRange {
    pub const ALL: [ReportRange; 4] = [
        ReportRange::Last7Days,
        ReportRange::Last30Days,
        ReportRange::Last90Days,
        ReportRange::AllTime,
    ];

    /// Number of days covered; `None` for all time.
    pub fn days(self) -> Option<i64> {
        match self {
            ReportRange::Last7Days => Some(7),
            ReportRange::Last30Days => Some(30),
            ReportRange::Last90Days => Some(90),
            ReportRange::AllTime => None,
        }
    }

    /// Days used for the growth comparison. All-time compares 30-day blocks.
    pub fn comparison_days(self) -> i64 {
        self.days().unwrap_or(30)
    }

    pub fn token(self) -> &'static str {
        match self {
            ReportRange::Last7Days => "7d",
            ReportRange::Last30Days => "30d",
            ReportRange::Last90Days => "90d",
            ReportRange::AllTime => "all",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReportRange::Last7Days => "Last 7 Days",
            ReportRange::Last30Days => "Last 30 Days",
            ReportRange::Last90Days => "Last 90 Days",
            ReportRange::AllTime => "All Time",
        }
    }

    /// Whether `at` falls in the range ending at `now`: from the start of the
    /// day `days` ago through the end of today.
    pub fn contains(self, at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self.days() {
            None => true,
            Some(days) => {
                let start = start_of_day(now - TimeDelta::days(days));
                let end = start_of_day(now) + TimeDelta::days(1);
                at >= start && at < end
            }
        }
    }
}

impl fmt::Display for ReportRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for ReportRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReportRange::ALL
            .into_iter()
            .find(|r| r.token() == s)
            .ok_or_else(|| format!("unknown report range '{s}'"))
    }
}

fn start_of_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_orders: u64,
    pub total_revenue: f64,
    pub total_units: u64,
    pub average_order_value: f64,
    /// Percent change in order count against the previous equal period;
    /// 0 when the previous period is empty.
    pub growth_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyVolume {
    pub date: NaiveDate,
    pub orders: u64,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: Category,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WarehouseCount {
    pub warehouse: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub range: ReportRange,
    pub generated_at: DateTime<Utc>,
    pub summary: ReportSummary,
    /// Ascending by date; days with no orders are omitted.
    pub daily_volume: Vec<DailyVolume>,
    pub by_category: Vec<CategoryCount>,
    pub by_warehouse: Vec<WarehouseCount>,
    pub top_regions: Vec<RegionCount>,
}

/// Build a report over the orders inside `range` ending at `now`.
pub fn build_report<'a, I, O>(orders: I, range: ReportRange, now: DateTime<Utc>) -> Report
where
    I: IntoIterator<Item = &'a O>,
    O: AsRef<Order> + 'a,
{
    let all: Vec<&Order> = orders.into_iter().map(AsRef::as_ref).collect();
    let in_range: Vec<&Order> = all
        .iter()
        .copied()
        .filter(|o| range.contains(o.created_at, now))
        .collect();

    let total_orders = in_range.len() as u64;
    let total_revenue: f64 = in_range.iter().map(|o| o.value).sum();
    let total_units: u64 = in_range.iter().map(|o| o.units as u64).sum();
    let average_order_value = if total_orders > 0 {
        total_revenue / total_orders as f64
    } else {
        0.0
    };

    let period = TimeDelta::days(range.comparison_days());
    let previous_start = now - period * 2;
    let previous_end = now - period;
    let previous = all
        .iter()
        .filter(|o| o.created_at >= previous_start && o.created_at <= previous_end)
        .count() as f64;
    let growth_rate = if previous > 0.0 {
        (total_orders as f64 - previous) / previous * 100.0
    } else {
        0.0
    };

    let mut days: BTreeMap<NaiveDate, (u64, f64)> = BTreeMap::new();
    let mut categories: FrequencyTable<Category> = FrequencyTable::new();
    let mut warehouses: FrequencyTable<String> = FrequencyTable::new();
    let mut regions: FrequencyTable<String> = FrequencyTable::new();
    for order in &in_range {
        let day = days.entry(order.created_at.date_naive()).or_default();
        day.0 += 1;
        day.1 += order.value;
        categories.add(&order.category);
        warehouses.add(order.origin.name.as_str());
        regions.add(order.region());
    }

    tracing::debug!(range = %range, orders = total_orders, "built report");

    Report {
        range,
        generated_at: now,
        summary: ReportSummary {
            total_orders,
            total_revenue,
            total_units,
            average_order_value,
            growth_rate,
        },
        daily_volume: days
            .into_iter()
            .map(|(date, (orders, revenue))| DailyVolume {
                date,
                orders,
                revenue,
            })
            .collect(),
        by_category: categories
            .top(usize::MAX)
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect(),
        by_warehouse: warehouses
            .top(usize::MAX)
            .into_iter()
            .map(|(warehouse, count)| WarehouseCount { warehouse, count })
            .collect(),
        top_regions: regions
            .top(REPORT_TOP_REGIONS)
            .into_iter()
            .map(|(region, count)| RegionCount { region, count })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Warehouse drill-down
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarehouseDetail {
    pub warehouse: String,
    pub total: u64,
    /// Orders on the same UTC day as `now`.
    pub today: u64,
    pub last_7_days: u64,
    pub last_30_days: u64,
    pub total_units: u64,
    pub total_value: f64,
    /// `min(40 + total * 2, 98)`.
    pub utilization_pct: u32,
    pub top_destinations: Vec<RegionCount>,
    pub top_categories: Vec<crate::CategoryShare>,
    /// The 7 days ending today, oldest first, zero-filled.
    pub daily_volume: Vec<(NaiveDate, u64)>,
    /// Orders by UTC hour of day.
    pub hourly_distribution: [u64; 24],
}

/// Drill-down for the warehouse named `name`. Unknown names yield a detail
/// with all counts zero.
pub fn warehouse_detail<'a, I, O>(orders: I, name: &str, now: DateTime<Utc>) -> WarehouseDetail
where
    I: IntoIterator<Item = &'a O>,
    O: AsRef<Order> + 'a,
{
    let mine: Vec<&Order> = orders
        .into_iter()
        .map(AsRef::as_ref)
        .filter(|o| o.origin.name == name)
        .collect();

    let today = now.date_naive();
    let week_ago = now - TimeDelta::days(7);
    let month_ago = now - TimeDelta::days(30);

    let mut destinations: FrequencyTable<String> = FrequencyTable::new();
    let mut categories: FrequencyTable<Category> = FrequencyTable::new();
    let mut per_day: HashMap<NaiveDate, u64> = HashMap::new();
    let mut hourly = [0u64; 24];
    for order in &mine {
        destinations.add(order.region());
        categories.add(&order.category);
        *per_day.entry(order.created_at.date_naive()).or_default() += 1;
        hourly[order.created_at.hour() as usize] += 1;
    }

    let total = mine.len() as u64;
    let daily_volume = (0..7)
        .rev()
        .map(|back| {
            let date = today - TimeDelta::days(back);
            (date, per_day.get(&date).copied().unwrap_or(0))
        })
        .collect();

    WarehouseDetail {
        warehouse: name.to_string(),
        total,
        today: mine.iter().filter(|o| o.created_at.date_naive() == today).count() as u64,
        last_7_days: mine.iter().filter(|o| o.created_at >= week_ago).count() as u64,
        last_30_days: mine.iter().filter(|o| o.created_at >= month_ago).count() as u64,
        total_units: mine.iter().map(|o| o.units as u64).sum(),
        total_value: mine.iter().map(|o| o.value).sum(),
        utilization_pct: (40 + total.saturating_mul(2)).min(98) as u32,
        top_destinations: destinations
            .top(5)
            .into_iter()
            .map(|(region, count)| RegionCount { region, count })
            .collect(),
        top_categories: categories
            .top(5)
            .into_iter()
            .map(|(category, count)| crate::CategoryShare {
                category,
                count,
                percentage: percentage_of(count, total.max(1)),
            })
            .collect(),
        daily_volume,
        hourly_distribution: hourly,
    }
}

// ---------------------------------------------------------------------------
// Destination heatmap
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatCell {
    pub lat: f64,
    pub lng: f64,
    pub count: u64,
    /// `count / max count`, in `(0, 1]`.
    pub intensity: f64,
}

/// Group destinations into cells by rounding coordinates to the nearest
/// 0.5 degree. Cells appear in first-seen order.
pub fn hex_bins<'a, I, O>(orders: I) -> Vec<HeatCell>
where
    I: IntoIterator<Item = &'a O>,
    O: AsRef<Order> + 'a,
{
    // Keys are half-degree steps so they hash exactly.
    let mut cells: FrequencyTable<(i64, i64)> = FrequencyTable::new();
    for order in orders {
        let d = &order.as_ref().destination;
        cells.add(&((d.lat * 2.0).round() as i64, (d.lng * 2.0).round() as i64));
    }
    let max = cells.max_count().max(1) as f64;
    cells
        .into_entries()
        .into_iter()
        .map(|((lat2, lng2), count)| HeatCell {
            lat: lat2 as f64 / 2.0,
            lng: lng2 as f64 / 2.0,
            count,
            intensity: count as f64 / max,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Operational metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityWarning {
    pub warehouse: String,
    pub orders: u64,
    pub utilization_pct: f64,
}

impl fmt::Display for CapacityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {:.0}% capacity", self.warehouse, self.utilization_pct)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationalMetrics {
    pub throughput_per_hour: f64,
    /// Busiest UTC hour against the flat 24-hour average, in percent.
    pub peak_hour_utilization: f64,
    pub capacity_warnings: Vec<CapacityWarning>,
}

/// Orders per hour since the oldest order. 0 for no orders or no elapsed time.
pub fn throughput_per_hour<'a, I, O>(orders: I, now: DateTime<Utc>) -> f64
where
    I: IntoIterator<Item = &'a O>,
    O: AsRef<Order> + 'a,
{
    let mut count = 0u64;
    let mut oldest: Option<DateTime<Utc>> = None;
    for order in orders {
        let at = order.as_ref().created_at;
        count += 1;
        oldest = Some(oldest.map_or(at, |o| o.min(at)));
    }
    let Some(oldest) = oldest else { return 0.0 };
    let hours = (now - oldest).num_milliseconds() as f64 / 3_600_000.0;
    if hours > 0.0 { count as f64 / hours } else { 0.0 }
}

/// Warehouses whose order count exceeds `threshold_pct` of `capacity`.
pub fn capacity_warnings<'a, I, O>(orders: I, capacity: u64, threshold_pct: f64) -> Vec<CapacityWarning>
where
    I: IntoIterator<Item = &'a O>,
    O: AsRef<Order> + 'a,
{
    let capacity = capacity.max(1) as f64;
    let mut per_warehouse: FrequencyTable<String> = FrequencyTable::new();
    for order in orders {
        per_warehouse.add(order.as_ref().origin.name.as_str());
    }
    per_warehouse
        .into_entries()
        .into_iter()
        .filter_map(|(warehouse, orders)| {
            let utilization_pct = orders as f64 / capacity * 100.0;
            (utilization_pct > threshold_pct).then_some(CapacityWarning {
                warehouse,
                orders,
                utilization_pct,
            })
        })
        .collect()
}

/// Throughput, peak-hour load and capacity warnings with the default
/// nominal capacity and threshold.
pub fn operational_metrics<'a, I, O>(orders: I, now: DateTime<Utc>) -> OperationalMetrics
where
    I: IntoIterator<Item = &'a O>,
    O: AsRef<Order> + 'a,
{
    let all: Vec<&Order> = orders.into_iter().map(AsRef::as_ref).collect();

    let mut hourly = [0u64; 24];
    for order in &all {
        hourly[order.created_at.hour() as usize] += 1;
    }
    let peak = hourly.iter().copied().max().unwrap_or(0) as f64;
    let average = all.len() as f64 / 24.0;
    let peak_hour_utilization = if average > 0.0 { peak / average * 100.0 } else { 0.0 };

    OperationalMetrics {
        throughput_per_hour: throughput_per_hour(all.iter().copied(), now),
        peak_hour_utilization,
        capacity_warnings: capacity_warnings(
            all.iter().copied(),
            NOMINAL_WAREHOUSE_CAPACITY,
            CAPACITY_WARNING_PCT,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shiptrack_core::catalog::Category::*;
    use shiptrack_core::order::SharedOrder;
    use shiptrack_core::test_utils::*;

    fn at(category: Category, origin: &str, days_ago: i64, value: f64) -> SharedOrder {
        order(
            category,
            warehouse(origin),
            us_destination("Testville", "CA"),
            value,
            2,
            noon() - TimeDelta::days(days_ago),
        )
        .into_shared()
    }

    #[test]
    fn report_range_tokens() {
        for r in ReportRange::ALL {
            assert_eq!(r.token().parse::<ReportRange>().unwrap(), r);
        }
        assert!("1y".parse::<ReportRange>().is_err());
        assert_eq!(ReportRange::default(), ReportRange::Last30Days);
    }

    #[test]
    fn range_includes_whole_first_day() {
        let now = noon();
        let first_day_early = start_of_day(now - TimeDelta::days(7)) + TimeDelta::minutes(1);
        assert!(ReportRange::Last7Days.contains(first_day_early, now));
        assert!(!ReportRange::Last7Days.contains(now - TimeDelta::days(8), now));
        assert!(ReportRange::Last7Days.contains(now + TimeDelta::hours(6), now));
        assert!(ReportRange::AllTime.contains(now - TimeDelta::days(900), now));
    }

    #[test]
    fn report_summary_and_breakdowns() {
        let orders = vec![
            at(Electronics, "Reno, NV", 0, 100.0),
            at(Electronics, "Reno, NV", 1, 200.0),
            at(Apparel, "Houston, TX", 1, 300.0),
            // Outside 7 days, inside the previous period.
            at(Apparel, "Houston, TX", 10, 50.0),
        ];
        let report = build_report(&orders, ReportRange::Last7Days, noon());

        assert_eq!(report.summary.total_orders, 3);
        assert_eq!(report.summary.total_revenue, 600.0);
        assert_eq!(report.summary.total_units, 6);
        assert_eq!(report.summary.average_order_value, 200.0);
        // 3 now vs 1 before.
        assert_eq!(report.summary.growth_rate, 200.0);

        assert_eq!(report.daily_volume.len(), 2);
        assert!(report.daily_volume[0].date < report.daily_volume[1].date);
        assert_eq!(report.daily_volume[0].orders, 2);
        assert_eq!(report.daily_volume[0].revenue, 500.0);

        assert_eq!(
            report.by_category,
            vec![
                CategoryCount { category: Electronics, count: 2 },
                CategoryCount { category: Apparel, count: 1 },
            ]
        );
        assert_eq!(report.by_warehouse[0].warehouse, "Reno, NV");
        assert_eq!(report.top_regions[0].count, 3);
    }

    #[test]
    fn empty_report_has_zero_summary() {
        let none: Vec<SharedOrder> = Vec::new();
        let report = build_report(&none, ReportRange::AllTime, noon());
        assert_eq!(report.summary, ReportSummary::default());
        assert!(report.daily_volume.is_empty());
    }

    #[test]
    fn warehouse_detail_counts_windows() {
        let orders = vec![
            at(Electronics, "Reno, NV", 0, 10.0),
            at(Electronics, "Reno, NV", 3, 10.0),
            at(Apparel, "Reno, NV", 20, 10.0),
            at(Apparel, "Houston, TX", 0, 10.0),
        ];
        let detail = warehouse_detail(&orders, "Reno, NV", noon());
        assert_eq!(detail.total, 3);
        assert_eq!(detail.today, 1);
        assert_eq!(detail.last_7_days, 2);
        assert_eq!(detail.last_30_days, 3);
        assert_eq!(detail.total_units, 6);
        assert_eq!(detail.utilization_pct, 46);
        assert_eq!(detail.top_categories[0].percentage, 67);
        assert_eq!(detail.daily_volume.len(), 7);
        assert_eq!(detail.daily_volume[6], (noon().date_naive(), 1));
        assert_eq!(detail.daily_volume[3].1, 1);
        assert_eq!(detail.hourly_distribution[12], 3);
    }

    #[test]
    fn warehouse_detail_unknown_name_is_empty() {
        let orders = vec![at(Electronics, "Reno, NV", 0, 10.0)];
        let detail = warehouse_detail(&orders, "Atlantis", noon());
        assert_eq!(detail.total, 0);
        assert!(detail.top_categories.is_empty());
        assert_eq!(detail.utilization_pct, 40);
    }

    #[test]
    fn hex_bins_round_to_half_degree() {
        let mut near = us_destination("A", "CA");
        near.lat = 34.1;
        near.lng = -118.2;
        let mut also_near = near.clone();
        also_near.lat = 33.9;
        let mut far = near.clone();
        far.lat = 40.7;
        far.lng = -74.0;

        let mk = |d| order(Apparel, warehouse("W"), d, 1.0, 1, noon());
        let orders = vec![mk(near), mk(also_near), mk(far)];
        let cells = hex_bins(&orders);

        assert_eq!(cells.len(), 2);
        assert_eq!((cells[0].lat, cells[0].lng), (34.0, -118.0));
        assert_eq!(cells[0].count, 2);
        assert_eq!(cells[0].intensity, 1.0);
        assert_eq!((cells[1].lat, cells[1].lng), (40.5, -74.0));
        assert_eq!(cells[1].intensity, 0.5);
    }

    #[test]
    fn throughput_uses_oldest_order() {
        let orders = vec![at(Apparel, "W", 1, 1.0), at(Apparel, "W", 0, 1.0)];
        // 2 orders over 24 hours.
        let rate = throughput_per_hour(&orders, noon());
        assert!((rate - 2.0 / 24.0).abs() < 1e-12);

        let none: Vec<SharedOrder> = Vec::new();
        assert_eq!(throughput_per_hour(&none, noon()), 0.0);
    }

    #[test]
    fn capacity_warnings_flag_busy_warehouses() {
        let mut orders: Vec<SharedOrder> = (0..170).map(|_| at(Apparel, "Busy", 0, 1.0)).collect();
        orders.extend((0..160).map(|_| at(Apparel, "Edge", 0, 1.0)));
        let warnings = capacity_warnings(&orders, NOMINAL_WAREHOUSE_CAPACITY, CAPACITY_WARNING_PCT);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].warehouse, "Busy");
        assert_eq!(warnings[0].to_string(), "Busy at 85% capacity");
    }

    #[test]
    fn operational_metrics_peak_hour() {
        // 24 orders all at noon: peak 24 vs average 1.
        let orders: Vec<SharedOrder> = (0..24).map(|_| at(Apparel, "W", 0, 1.0)).collect();
        let metrics = operational_metrics(&orders, noon() + TimeDelta::hours(2));
        assert_eq!(metrics.peak_hour_utilization, 2400.0);
        assert!((metrics.throughput_per_hour - 12.0).abs() < 1e-12);
        assert!(metrics.capacity_warnings.is_empty());
    }
}
