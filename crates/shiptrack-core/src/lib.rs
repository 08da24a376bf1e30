//! Shiptrack Core -- the synthetic order simulation behind the shipment globe.
//!
//! This crate provides the data model (warehouses, destinations, orders),
//! the seedable random source, the order generator, the buffers that hold
//! orders for rendering and statistics, and the scheduler that drives them.
//!
//! # Tick Model
//!
//! A single [`sim::Scheduler`] owns the dashboard clock. Three named timers
//! fire independently of each other:
//!
//! 1. **Generation** -- one synthetic order per period (live mode only).
//! 2. **ReplayAdvance** -- reveal the next historical order (replay mode, playing).
//! 3. **Aggregation** -- recompute statistics (always, while mounted).
//!
//! When two timers are due at the same instant they are dispatched in the
//! order above.
//!
//! # Key Types
//!
//! - [`order::Order`] -- an immutable synthetic order, shared as [`order::SharedOrder`].
//! - [`catalog::Catalog`] -- warehouses plus the weighted destination pool.
//! - [`generator::OrderGenerator`] -- live orders and historical backlogs.
//! - [`buffer::LiveWindow`] -- capacity- and age-bounded orders for rendering.
//! - [`buffer::HistoryLog`] -- capped log of recent orders for statistics.
//! - [`buffer::ReplayTimeline`] -- sliding window over a historical backlog.
//! - [`rng::RandomSource`] -- injectable randomness; [`rng::SimRng`] is seedable.
//! - [`clock::Clock`] -- injectable wall clock.

pub mod buffer;
pub mod catalog;
pub mod clock;
pub mod filter;
pub mod generator;
pub mod id;
pub mod order;
pub mod rng;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
