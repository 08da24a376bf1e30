//! Serde structs for the on-disk tracker configuration.
//!
//! Every struct uses `#[serde(default)]`, so a file only needs the keys it
//! overrides. [`TrackerConfig::validate`] is the single place that rejects
//! values the runtime cannot work with.

use serde::{Deserialize, Serialize};
use shiptrack_core::buffer::{
    CapacityPolicy, DEFAULT_HISTORY_CAPACITY, DEFAULT_REPLAY_WINDOW_CAP,
};
use shiptrack_core::catalog::{
    Catalog, CatalogError, DOMESTIC_COUNTRY, DOMESTIC_WEIGHT, Destination, DestinationPool,
    INTERNATIONAL_WEIGHT, Warehouse,
};
use shiptrack_core::generator::GeneratorConfig;
use shiptrack_core::sim::TimingConfig;
use shiptrack_milestones::{GoalSettings, MilestoneDef, MilestoneError, default_table, validate_table};
use shiptrack_stats::StatsConfig;

/// Orders seeded into the live window at mount.
pub const DEFAULT_INITIAL_BATCH: usize = 20;

// ===========================================================================
// Errors
// ===========================================================================

/// A configuration value the runtime cannot accept.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("{field} range is inverted or non-finite: {min} .. {max}")]
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
    },

    #[error("capacity breakpoints out of order: small {small} >= medium {medium}")]
    Breakpoints { small: u32, medium: u32 },

    #[error("stats.intensity_floor must be within [0, 1], got {0}")]
    IntensityFloor(f64),

    #[error("invalid network: {0}")]
    Network(#[from] CatalogError),

    #[error("invalid milestone table: {0}")]
    Milestones(#[from] MilestoneError),
}

// ===========================================================================
// Logging
// ===========================================================================

/// Output format for the tracing subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `"info"` or
    /// `"shiptrack_dashboard=debug"`.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Pretty,
        }
    }
}

// ===========================================================================
// Network
// ===========================================================================

/// A destination row. `weight` falls back to the domestic/international
/// split when omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationData {
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
}

/// A replacement for the built-in warehouse and destination network.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub warehouses: Vec<Warehouse>,
    pub destinations: Vec<DestinationData>,
    pub domestic_country: String,
    pub domestic_weight: u32,
    pub international_weight: u32,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            warehouses: Vec::new(),
            destinations: Vec::new(),
            domestic_country: DOMESTIC_COUNTRY.into(),
            domestic_weight: DOMESTIC_WEIGHT,
            international_weight: INTERNATIONAL_WEIGHT,
        }
    }
}

impl NetworkConfig {
    fn weight_for(&self, row: &DestinationData) -> u32 {
        row.weight.unwrap_or(if row.country == self.domestic_country {
            self.domestic_weight
        } else {
            self.international_weight
        })
    }

    /// Validate and build the generator's catalog.
    pub fn to_catalog(&self) -> Result<Catalog, CatalogError> {
        let entries = self
            .destinations
            .iter()
            .map(|row| {
                let destination = Destination {
                    city: row.city.clone(),
                    state: row.state.clone(),
                    country: row.country.clone(),
                    lat: row.lat,
                    lng: row.lng,
                };
                (destination, self.weight_for(row))
            })
            .collect();
        Catalog::new(self.warehouses.clone(), DestinationPool::new(entries))
    }
}

// ===========================================================================
// Tracker configuration
// ===========================================================================

/// Everything a dashboard session reads at mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub timing: TimingConfig,
    pub capacity: CapacityPolicy,
    pub history_capacity: usize,
    pub replay_window_cap: usize,
    pub initial_batch: usize,
    pub generator: GeneratorConfig,
    pub stats: StatsConfig,
    pub goals: GoalSettings,
    /// Replaces the built-in milestone table when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub milestones: Option<Vec<MilestoneDef>>,
    /// Replaces the built-in network when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<NetworkConfig>,
    /// Fixed RNG seed; entropy when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub logging: LoggingConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig::default(),
            capacity: CapacityPolicy::default(),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            replay_window_cap: DEFAULT_REPLAY_WINDOW_CAP,
            initial_batch: DEFAULT_INITIAL_BATCH,
            generator: GeneratorConfig::default(),
            stats: StatsConfig::default(),
            goals: GoalSettings::default(),
            milestones: None,
            network: None,
            seed: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl TrackerConfig {
    /// The configured network, or the built-in one.
    pub fn catalog(&self) -> Result<Catalog, ConfigError> {
        match &self.network {
            Some(network) => Ok(network.to_catalog()?),
            None => Ok(Catalog::builtin()),
        }
    }

    /// The configured milestone table, or the default twelve.
    pub fn milestone_table(&self) -> Vec<MilestoneDef> {
        self.milestones.clone().unwrap_or_else(default_table)
    }

    /// Reject values that would stall timers, empty the buffers or make
    /// generation impossible.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        nonzero("timing.generation_ms", t.generation_ms)?;
        nonzero("timing.order_lifetime_ms", t.order_lifetime_ms)?;
        nonzero("timing.aggregation_ms", t.aggregation_ms)?;
        nonzero("timing.replay_base_ms", t.replay_base_ms)?;

        let c = &self.capacity;
        nonzero("capacity.small", c.small as u64)?;
        nonzero("capacity.medium", c.medium as u64)?;
        nonzero("capacity.large", c.large as u64)?;
        if c.small_breakpoint >= c.medium_breakpoint {
            return Err(ConfigError::Breakpoints {
                small: c.small_breakpoint,
                medium: c.medium_breakpoint,
            });
        }

        nonzero("history_capacity", self.history_capacity as u64)?;
        nonzero("replay_window_cap", self.replay_window_cap as u64)?;

        let g = &self.generator;
        if !(g.value_min.is_finite() && g.value_max.is_finite())
            || g.value_min < 0.0
            || g.value_min >= g.value_max
        {
            return Err(ConfigError::InvalidRange {
                field: "generator.value",
                min: g.value_min,
                max: g.value_max,
            });
        }
        if g.units_min == 0 || g.units_min > g.units_max {
            return Err(ConfigError::InvalidRange {
                field: "generator.units",
                min: g.units_min as f64,
                max: g.units_max as f64,
            });
        }

        let s = &self.stats;
        if !(0.0..=1.0).contains(&s.intensity_floor) {
            return Err(ConfigError::IntensityFloor(s.intensity_floor));
        }
        nonzero("stats.intensity_sample", s.intensity_sample as u64)?;
        nonzero("stats.trend_capacity", s.trend_capacity as u64)?;

        if self.goals.daily_orders == 0 {
            return Err(ConfigError::Zero {
                field: "goals.daily_orders",
            });
        }

        if let Some(table) = &self.milestones {
            validate_table(table)?;
        }
        self.catalog().map(|_| ())
    }
}

fn nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        Err(ConfigError::Zero { field })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use shiptrack_core::test_utils::{intl_destination, us_destination, warehouse};
    use shiptrack_milestones::MilestoneMetric;

    fn row(dest: Destination, weight: Option<u32>) -> DestinationData {
        DestinationData {
            city: dest.city,
            state: dest.state,
            country: dest.country,
            lat: dest.lat,
            lng: dest.lng,
            weight,
        }
    }

    fn small_network() -> NetworkConfig {
        NetworkConfig {
            warehouses: vec![warehouse("Reno, NV"), warehouse("Austin, TX")],
            destinations: vec![
                row(us_destination("Denver", "CO"), None),
                row(intl_destination("Tokyo", "Japan"), None),
                row(intl_destination("Paris", "France"), Some(7)),
            ],
            ..NetworkConfig::default()
        }
    }

    #[test]
    fn defaults_validate() {
        assert_eq!(TrackerConfig::default().validate(), Ok(()));
    }

    #[test]
    fn default_catalog_is_builtin() {
        let catalog = TrackerConfig::default().catalog().unwrap();
        assert_eq!(catalog.warehouses().len(), 10);
        assert_eq!(TrackerConfig::default().milestone_table().len(), 12);
    }

    #[test]
    fn network_weights_fall_back_to_country_split() {
        let catalog = small_network().to_catalog().unwrap();
        let pool = catalog.destinations();
        assert_eq!(pool.weight_of(0), DOMESTIC_WEIGHT as u64);
        assert_eq!(pool.weight_of(1), INTERNATIONAL_WEIGHT as u64);
        assert_eq!(pool.weight_of(2), 7);
    }

    #[test]
    fn empty_network_is_rejected() {
        let config = TrackerConfig {
            network: Some(NetworkConfig::default()),
            ..TrackerConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::Network(CatalogError::NoWarehouses))
        );
    }

    #[test]
    fn duplicate_warehouse_is_rejected() {
        let mut network = small_network();
        network.warehouses.push(warehouse("Reno, NV"));
        let config = TrackerConfig {
            network: Some(network),
            ..TrackerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Network(CatalogError::DuplicateWarehouse { .. }))
        ));
    }

    #[test]
    fn zero_interval_is_rejected() {
        let mut config = TrackerConfig::default();
        config.timing.aggregation_ms = 0;
        assert_eq!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "timing.aggregation_ms"
            })
        );
    }

    #[test]
    fn inverted_value_range_is_rejected() {
        let mut config = TrackerConfig::default();
        config.generator.value_min = 800.0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange { field: "generator.value", .. })
        ));
    }

    #[test]
    fn zero_units_is_rejected() {
        let mut config = TrackerConfig::default();
        config.generator.units_min = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRange { field: "generator.units", .. })
        ));
    }

    #[test]
    fn zero_daily_target_is_rejected() {
        let mut config = TrackerConfig::default();
        config.goals.daily_orders = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Zero { .. })));
    }

    #[test]
    fn breakpoints_must_ascend() {
        let mut config = TrackerConfig::default();
        config.capacity.small_breakpoint = 2000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Breakpoints { small: 2000, medium: 1024 })
        ));
    }

    #[test]
    fn milestone_override_is_validated() {
        let def = MilestoneDef::new(MilestoneMetric::Orders, 5, "*", "Five", "Five orders");
        let config = TrackerConfig {
            milestones: Some(vec![def.clone(), def]),
            ..TrackerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Milestones(MilestoneError::Duplicate { .. }))
        ));
    }

    #[test]
    fn floor_outside_unit_interval_is_rejected() {
        let mut config = TrackerConfig::default();
        config.stats.intensity_floor = 1.5;
        assert_eq!(config.validate(), Err(ConfigError::IntensityFloor(1.5)));
    }
}
