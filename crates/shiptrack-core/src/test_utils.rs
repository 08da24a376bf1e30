//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};

use crate::catalog::{Catalog, Category, Destination, Warehouse};
use crate::clock::{Clock, ManualClock};
use crate::generator::{GeneratorConfig, OrderGenerator};
use crate::id::OrderId;
use crate::order::{Order, SharedOrder};
use crate::rng::SimRng;

// ===========================================================================
// Time
// ===========================================================================

/// 2024-06-01 12:00:00 UTC, exactly half-way through the day.
pub fn noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// A manual clock pinned at [`noon`].
pub fn manual_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(noon()))
}

/// [`manual_clock`] as a trait object.
pub fn fixed_clock() -> Arc<dyn Clock> {
    manual_clock()
}

// ===========================================================================
// Reference data
// ===========================================================================

pub fn warehouse(name: &str) -> Warehouse {
    Warehouse::new(name, 0.0, 0.0, 0.5)
}

pub fn us_destination(city: &str, state: &str) -> Destination {
    Destination {
        city: city.into(),
        state: Some(state.into()),
        country: "USA".into(),
        lat: 0.0,
        lng: 0.0,
    }
}

pub fn intl_destination(city: &str, country: &str) -> Destination {
    Destination {
        city: city.into(),
        state: None,
        country: country.into(),
        lat: 0.0,
        lng: 0.0,
    }
}

// ===========================================================================
// Orders
// ===========================================================================

/// Build an order by hand. The id is derived from the remaining fields so
/// repeated calls with the same arguments compare equal.
pub fn order(
    category: Category,
    origin: Warehouse,
    destination: Destination,
    value: f64,
    units: u32,
    created_at: DateTime<Utc>,
) -> Order {
    let seed = value.to_bits() ^ (units as u64) << 32 ^ created_at.timestamp_millis() as u64;
    Order {
        id: OrderId::random(&mut SimRng::new(seed)),
        origin,
        destination,
        created_at,
        value,
        units,
        category,
    }
}

/// A domestic order from `warehouse_name` to a city in `state`, at noon.
pub fn make_order_with(
    category: Category,
    warehouse_name: &str,
    state: &str,
    value: f64,
    units: u32,
) -> Order {
    order(
        category,
        warehouse(warehouse_name),
        us_destination("Testville", state),
        value,
        units,
        noon(),
    )
}

/// A distinct shared order; `n` selects the id, value and timestamp.
pub fn make_order(n: u64) -> SharedOrder {
    let category = Category::ALL[(n as usize) % Category::ALL.len()];
    order(
        category,
        warehouse("Reno, NV"),
        us_destination("Testville", "CA"),
        100.0 + n as f64,
        1,
        noon() + TimeDelta::seconds(n as i64),
    )
    .into_shared()
}

/// `count` shared orders one second apart, ascending.
pub fn make_orders_at(count: u64) -> Vec<SharedOrder> {
    (0..count).map(make_order).collect()
}

// ===========================================================================
// Generators
// ===========================================================================

/// Built-in catalog, default ranges, seeded rng, clock pinned at [`noon`].
pub fn seeded_generator(seed: u64) -> OrderGenerator {
    OrderGenerator::new(
        Arc::new(Catalog::builtin()),
        GeneratorConfig::default(),
        Box::new(SimRng::new(seed)),
        fixed_clock(),
    )
}

/// `count` orders from a seeded generator, shared.
pub fn generated_orders(seed: u64, count: usize) -> Vec<SharedOrder> {
    seeded_generator(seed)
        .generate_batch(count)
        .into_iter()
        .map(Order::into_shared)
        .collect()
}
