//! Order statistics for the shipment dashboard.
//!
//! Every snapshot is recomputed from scratch over the orders it is given:
//! the history log in live mode, or the revealed replay prefix in replay
//! mode. Nothing is maintained incrementally, so percentages are relative to
//! the *current* total and are not stable across snapshots.
//!
//! # Usage
//!
//! ```ignore
//! let mut aggregator = StatsAggregator::new(StatsConfig::default());
//! let snapshot = aggregator.aggregate(history.iter(), catalog.warehouses());
//! println!("{} orders", snapshot.stats.total_orders);
//! ```

pub mod report;

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shiptrack_core::catalog::{Category, Warehouse};
use shiptrack_core::order::Order;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for the statistics aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Length of the destination breakdown.
    pub top_regions: usize,
    /// Length of the category breakdown.
    pub top_categories: usize,
    /// How many of the most recent orders feed warehouse intensity.
    pub intensity_sample: usize,
    /// Lowest intensity a warehouse can have.
    pub intensity_floor: f64,
    /// Number of past order totals kept for trend display.
    pub trend_capacity: usize,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_regions: 5,
            top_categories: 5,
            intensity_sample: 50,
            intensity_floor: 0.3,
            trend_capacity: 60,
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionCount {
    /// State when known, otherwise country.
    pub region: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: Category,
    pub count: u64,
    /// `round(count / total * 100)`.
    pub percentage: u32,
}

/// A recomputed-from-scratch statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_orders: u64,
    pub total_units: u64,
    pub total_value: f64,
    pub top_regions: Vec<RegionCount>,
    pub top_categories: Vec<CategoryShare>,
}

impl Stats {
    pub fn is_empty(&self) -> bool {
        self.total_orders == 0
    }
}

// ---------------------------------------------------------------------------
// Frequency counting
// ---------------------------------------------------------------------------

/// Counts keyed values, remembering the order in which keys first appeared.
///
/// Sorting the result is stable, so equal counts keep first-seen order.
#[derive(Debug)]
pub(crate) struct FrequencyTable<K> {
    index: HashMap<K, usize>,
    entries: Vec<(K, u64)>,
}

impl<K: Eq + Hash> FrequencyTable<K> {
    pub(crate) fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Count one occurrence of `key`. Only unseen keys are copied.
    pub(crate) fn add<Q>(&mut self, key: &Q)
    where
        K: Borrow<Q> + Clone,
        Q: ToOwned<Owned = K> + Hash + Eq + ?Sized,
    {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                let owned = key.to_owned();
                self.index.insert(owned.clone(), self.entries.len());
                self.entries.push((owned, 1));
            }
        }
    }

    pub(crate) fn get<Q>(&self, key: &Q) -> u64
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.get(key).map_or(0, |&i| self.entries[i].1)
    }

    /// Descending by count, first-seen order among ties, truncated to `n`.
    pub(crate) fn top(mut self, n: usize) -> Vec<(K, u64)> {
        self.entries.sort_by(|a, b| b.1.cmp(&a.1));
        self.entries.truncate(n);
        self.entries
    }

    /// Entries in first-seen order.
    pub(crate) fn into_entries(self) -> Vec<(K, u64)> {
        self.entries
    }

    pub(crate) fn max_count(&self) -> u64 {
        self.entries.iter().map(|(_, c)| *c).max().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// [`calculate_stats_with`] using the default top-5 / top-5 breakdowns.
pub fn calculate_stats<'a, I, O>(orders: I) -> Stats
where
    I: IntoIterator<Item = &'a O>,
    O: AsRef<Order> + 'a,
{
    calculate_stats_with(orders, &StatsConfig::default())
}

/// Single pass over `orders` accumulating totals and both breakdowns.
///
/// An empty input yields zero totals and empty breakdowns.
pub fn calculate_stats_with<'a, I, O>(orders: I, config: &StatsConfig) -> Stats
where
    I: IntoIterator<Item = &'a O>,
    O: AsRef<Order> + 'a,
{
    let mut total_orders = 0u64;
    let mut total_units = 0u64;
    let mut total_value = 0.0f64;
    let mut regions: FrequencyTable<String> = FrequencyTable::new();
    let mut categories: FrequencyTable<Category> = FrequencyTable::new();

    for order in orders {
        let order = order.as_ref();
        total_orders += 1;
        total_units += order.units as u64;
        total_value += order.value;
        regions.add(order.region());
        categories.add(&order.category);
    }

    let top_regions = regions
        .top(config.top_regions)
        .into_iter()
        .map(|(region, count)| RegionCount { region, count })
        .collect();

    let top_categories = categories
        .top(config.top_categories)
        .into_iter()
        .map(|(category, count)| CategoryShare {
            category,
            count,
            percentage: percentage_of(count, total_orders),
        })
        .collect();

    Stats {
        total_orders,
        total_units,
        total_value,
        top_regions,
        top_categories,
    }
}

/// `round(count / total * 100)`, 0 when `total` is 0.
pub fn percentage_of(count: u64, total: u64) -> u32 {
    if total == 0 {
        return 0;
    }
    (count as f64 / total as f64 * 100.0).round() as u32
}

/// Recompute warehouse intensity from `recent` orders.
///
/// Each warehouse's origin count is normalised by the busiest warehouse
/// (at least 1) and mapped into `[floor, 1]`, so an idle warehouse never
/// drops below `floor`. Returns a fresh array; the input is untouched.
pub fn update_warehouse_intensity<'a, I, O>(
    warehouses: &[Warehouse],
    recent: I,
    floor: f64,
) -> Arc<[Warehouse]>
where
    I: IntoIterator<Item = &'a O>,
    O: AsRef<Order> + 'a,
{
    let mut counts: FrequencyTable<&str> = FrequencyTable::new();
    for order in recent {
        counts.add(&order.as_ref().origin.name.as_str());
    }
    let max = counts.max_count().max(1) as f64;
    let floor = floor.clamp(0.0, 1.0);

    warehouses
        .iter()
        .map(|w| {
            let count = counts.get(&w.name.as_str()) as f64;
            Warehouse {
                intensity: (floor + count / max * (1.0 - floor)).min(1.0),
                ..w.clone()
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// RingBuffer — fixed-capacity history for trend display
// ---------------------------------------------------------------------------

/// A fixed-capacity ring buffer. When full, the oldest entry is overwritten.
/// Iterates oldest-to-newest.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    head: usize,
    len: usize,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Create a new ring buffer. A capacity of 0 is clamped to 1.
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![T::default(); capacity.max(1)],
            head: 0,
            len: 0,
        }
    }

    /// Push a value, overwriting the oldest entry if at capacity.
    pub fn push(&mut self, value: T) {
        self.data[self.head] = value;
        self.head = (self.head + 1) % self.capacity();
        if self.len < self.capacity() {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The most recently pushed value, if any.
    pub fn latest(&self) -> Option<T> {
        self.nth_back(0)
    }

    /// The value pushed `n` pushes before the latest.
    pub fn nth_back(&self, n: usize) -> Option<T> {
        if n >= self.len {
            return None;
        }
        let cap = self.capacity();
        let idx = (self.head + cap - 1 - n) % cap;
        Some(self.data[idx])
    }

    /// Iterate values from oldest to newest.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = T> + '_ {
        let cap = self.capacity();
        let start = if self.len < cap { 0 } else { self.head };
        (0..self.len).map(move |i| self.data[(start + i) % cap])
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    pub fn clear(&mut self) {
        self.data.fill(T::default());
        self.head = 0;
        self.len = 0;
    }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

/// Output of one aggregation pass.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub stats: Stats,
    /// New warehouse array with recomputed intensity.
    pub warehouses: Arc<[Warehouse]>,
}

/// Runs aggregation passes and keeps a short trend of order totals.
#[derive(Debug, Clone)]
pub struct StatsAggregator {
    config: StatsConfig,
    totals: RingBuffer<u64>,
    passes: u64,
}

impl StatsAggregator {
    pub fn new(config: StatsConfig) -> Self {
        let totals = RingBuffer::new(config.trend_capacity);
        Self {
            config,
            totals,
            passes: 0,
        }
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Recompute stats over all of `orders` and intensity over the last
    /// `intensity_sample` of them.
    pub fn aggregate<'a, I, O>(&mut self, orders: I, warehouses: &[Warehouse]) -> Snapshot
    where
        I: IntoIterator<Item = &'a O>,
        I::IntoIter: Clone + ExactSizeIterator,
        O: AsRef<Order> + 'a,
    {
        let iter = orders.into_iter();
        let stats = calculate_stats_with(iter.clone(), &self.config);
        let skip = iter.len().saturating_sub(self.config.intensity_sample);
        let warehouses =
            update_warehouse_intensity(warehouses, iter.skip(skip), self.config.intensity_floor);

        self.totals.push(stats.total_orders);
        self.passes += 1;
        tracing::debug!(
            pass = self.passes,
            orders = stats.total_orders,
            units = stats.total_units,
            value = stats.total_value,
            "aggregated stats"
        );

        Snapshot { stats, warehouses }
    }

    /// Order totals from past passes, oldest first.
    pub fn trend(&self) -> Vec<u64> {
        self.totals.to_vec()
    }

    /// Change in order total between the last two passes.
    pub fn last_delta(&self) -> Option<i64> {
        let latest = self.totals.latest()?;
        let previous = self.totals.nth_back(1)?;
        Some(latest as i64 - previous as i64)
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }

    /// Forget the trend, e.g. when the data source switches.
    pub fn reset_trend(&mut self) {
        self.totals.clear();
    }
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new(StatsConfig::default())
    }
}
