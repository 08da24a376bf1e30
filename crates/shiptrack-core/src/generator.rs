//! Synthetic order generation.
//!
//! [`OrderGenerator`] produces orders from a [`Catalog`] using an injected
//! [`RandomSource`] and [`Clock`]. Generation cannot fail: the catalog is
//! validated up front and every draw lands inside its configured range.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, Category};
use crate::clock::Clock;
use crate::id::OrderId;
use crate::order::Order;
use crate::rng::RandomSource;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

// ---------------------------------------------------------------------------
// Generator configuration
// ---------------------------------------------------------------------------

/// Value and unit ranges for generated orders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Inclusive lower bound on order value.
    pub value_min: f64,
    /// Exclusive upper bound on order value.
    pub value_max: f64,
    /// Inclusive unit bounds.
    pub units_min: u32,
    pub units_max: u32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            value_min: 25.0,
            value_max: 750.0,
            units_min: 1,
            units_max: 12,
        }
    }
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Produces synthetic orders.
pub struct OrderGenerator {
    catalog: Arc<Catalog>,
    config: GeneratorConfig,
    rng: Box<dyn RandomSource>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for OrderGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderGenerator")
            .field("warehouses", &self.catalog.warehouses().len())
            .field("destinations", &self.catalog.destinations().len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OrderGenerator {
    pub fn new(
        catalog: Arc<Catalog>,
        config: GeneratorConfig,
        rng: Box<dyn RandomSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            catalog,
            config,
            rng,
            clock,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// One order stamped with the current clock time.
    pub fn generate_order(&mut self) -> Order {
        let now = self.clock.now();
        self.generate_order_at(now)
    }

    /// One order stamped with `at`.
    pub fn generate_order_at(&mut self, at: DateTime<Utc>) -> Order {
        let rng = self.rng.as_mut();

        let warehouses = self.catalog.warehouses();
        let origin = warehouses[rng.index(warehouses.len())].clone();
        // The catalog guarantees a positive total weight.
        let destination = match self.catalog.destinations().pick(rng) {
            Some(d) => d.clone(),
            None => self.catalog.destinations().destinations()[0].clone(),
        };
        let value = rng.range_f64(self.config.value_min, self.config.value_max);
        let units = rng.range_u32_inclusive(self.config.units_min, self.config.units_max);
        let category = Category::ALL[rng.index(Category::ALL.len())];
        let id = OrderId::random(rng);

        tracing::trace!(%id, origin = %origin.name, region = destination.region(), value, "generated order");

        Order {
            id,
            origin,
            destination,
            created_at: at,
            value,
            units,
            category,
        }
    }

    /// `count` orders stamped with the current clock time.
    pub fn generate_batch(&mut self, count: usize) -> Vec<Order> {
        let now = self.clock.now();
        (0..count).map(|_| self.generate_order_at(now)).collect()
    }

    /// `floor(hours * rate_per_hour)` orders with timestamps uniform in
    /// `[start, end)`, sorted ascending by timestamp.
    ///
    /// An empty or inverted window, or a non-positive rate, yields nothing.
    pub fn generate_historical_backlog(
        &mut self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        rate_per_hour: f64,
    ) -> Vec<Order> {
        let span_ms = (end - start).num_milliseconds();
        if span_ms <= 0 || !(rate_per_hour > 0.0) || !rate_per_hour.is_finite() {
            return Vec::new();
        }
        let hours = span_ms as f64 / MILLIS_PER_HOUR;
        let count = (hours * rate_per_hour).floor() as usize;

        let mut orders = Vec::with_capacity(count);
        for _ in 0..count {
            // next_f64 < 1, so the offset stays strictly below span_ms.
            let offset = (self.rng.next_f64() * span_ms as f64) as i64;
            let at = start + TimeDelta::milliseconds(offset.min(span_ms - 1));
            orders.push(self.generate_order_at(at));
        }
        orders.sort_by_key(|o| o.created_at);

        tracing::debug!(count, hours, rate_per_hour, "generated historical backlog");
        orders
    }
}

// ---------------------------------------------------------------------------
// Time range selector
// ---------------------------------------------------------------------------

/// The dashboard's time-range selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    #[default]
    #[serde(rename = "live")]
    Live,
    #[serde(rename = "1h")]
    LastHour,
    #[serde(rename = "24h")]
    Last24Hours,
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
}

impl TimeRange {
    pub const ALL: [TimeRange; 5] = [
        TimeRange::Live,
        TimeRange::LastHour,
        TimeRange::Last24Hours,
        TimeRange::Last7Days,
        TimeRange::Last30Days,
    ];

    pub fn is_live(self) -> bool {
        self == TimeRange::Live
    }

    /// The short token used by the selector.
    pub fn token(self) -> &'static str {
        match self {
            TimeRange::Live => "live",
            TimeRange::LastHour => "1h",
            TimeRange::Last24Hours => "24h",
            TimeRange::Last7Days => "7d",
            TimeRange::Last30Days => "30d",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TimeRange::Live => "Live",
            TimeRange::LastHour => "Last Hour",
            TimeRange::Last24Hours => "Last 24 Hours",
            TimeRange::Last7Days => "Last 7 Days",
            TimeRange::Last30Days => "Last 30 Days",
        }
    }

    /// Length of the historical window. `None` for live.
    pub fn duration(self) -> Option<TimeDelta> {
        match self {
            TimeRange::Live => None,
            TimeRange::LastHour => Some(TimeDelta::hours(1)),
            TimeRange::Last24Hours => Some(TimeDelta::hours(24)),
            TimeRange::Last7Days => Some(TimeDelta::days(7)),
            TimeRange::Last30Days => Some(TimeDelta::days(30)),
        }
    }

    /// `(start, end)` of the window ending at `now`. `None` for live.
    pub fn window_ending(self, now: DateTime<Utc>) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.duration().map(|d| (now - d, now))
    }

    /// Backlog density. Shorter ranges replay denser.
    pub fn orders_per_hour(self) -> f64 {
        match self {
            TimeRange::Live => 60.0,
            TimeRange::LastHour => 120.0,
            TimeRange::Last24Hours => 60.0,
            TimeRange::Last7Days => 30.0,
            TimeRange::Last30Days => 15.0,
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Returned when a string is not one of `live`, `1h`, `24h`, `7d`, `30d`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown time range '{input}' (expected live, 1h, 24h, 7d or 30d)")]
pub struct ParseTimeRangeError {
    pub input: String,
}

impl FromStr for TimeRange {
    type Err = ParseTimeRangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeRange::ALL
            .into_iter()
            .find(|r| r.token() == s)
            .ok_or_else(|| ParseTimeRangeError { input: s.to_string() })
    }
}
