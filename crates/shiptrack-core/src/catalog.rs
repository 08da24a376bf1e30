//! Reference data: fulfilment warehouses, customer destinations and product
//! categories.
//!
//! Warehouses are the origin of every order. Destinations are drawn from a
//! weighted pool so domestic cities dominate. Both are validated once, when
//! the [`Catalog`] is built, and are read-only afterwards (warehouse
//! intensity is replaced wholesale by the aggregator, never edited in place).

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::rng::RandomSource;

// ---------------------------------------------------------------------------
// Warehouse
// ---------------------------------------------------------------------------

/// A fulfilment centre that orders ship from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    /// Unique display name, e.g. "Reno, NV".
    pub name: String,
    pub lat: f64,
    pub lng: f64,
    /// Relative recent order volume in `[0, 1]`, recomputed by the aggregator.
    #[serde(default)]
    pub intensity: f64,
}

impl Warehouse {
    pub fn new(name: impl Into<String>, lat: f64, lng: f64, intensity: f64) -> Self {
        Self {
            name: name.into(),
            lat,
            lng,
            intensity,
        }
    }
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// A customer location an order ships to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Destination {
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub country: String,
    pub lat: f64,
    pub lng: f64,
}

impl Destination {
    /// The grouping key used for breakdowns: the state when known,
    /// otherwise the country.
    pub fn region(&self) -> &str {
        self.state.as_deref().unwrap_or(&self.country)
    }
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Product category of an order. A fixed enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    Electronics,
    Apparel,
    #[serde(rename = "Home & Garden")]
    HomeAndGarden,
    #[serde(rename = "Health & Beauty")]
    HealthAndBeauty,
    #[serde(rename = "Sports & Outdoors")]
    SportsAndOutdoors,
    #[serde(rename = "Toys & Games")]
    ToysAndGames,
    #[serde(rename = "Food & Beverage")]
    FoodAndBeverage,
    #[serde(rename = "Office Supplies")]
    OfficeSupplies,
    #[serde(rename = "Pet Supplies")]
    PetSupplies,
    Automotive,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 10] = [
        Category::Electronics,
        Category::Apparel,
        Category::HomeAndGarden,
        Category::HealthAndBeauty,
        Category::SportsAndOutdoors,
        Category::ToysAndGames,
        Category::FoodAndBeverage,
        Category::OfficeSupplies,
        Category::PetSupplies,
        Category::Automotive,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Category::Electronics => "Electronics",
            Category::Apparel => "Apparel",
            Category::HomeAndGarden => "Home & Garden",
            Category::HealthAndBeauty => "Health & Beauty",
            Category::SportsAndOutdoors => "Sports & Outdoors",
            Category::ToysAndGames => "Toys & Games",
            Category::FoodAndBeverage => "Food & Beverage",
            Category::OfficeSupplies => "Office Supplies",
            Category::PetSupplies => "Pet Supplies",
            Category::Automotive => "Automotive",
        }
    }

    /// Look up a category by its display label.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// Weighted destination pool
// ---------------------------------------------------------------------------

/// Destinations with integer selection weights.
///
/// Selection draws a point in `[0, total_weight)` and binary-searches the
/// cumulative weight table.
#[derive(Debug, Clone)]
pub struct DestinationPool {
    destinations: Vec<Destination>,
    /// `cumulative[i]` is the sum of weights `0..=i`.
    cumulative: Vec<u64>,
}

impl DestinationPool {
    /// Build a pool. Entries with weight 0 can never be drawn.
    pub fn new(entries: Vec<(Destination, u32)>) -> Self {
        let mut destinations = Vec::with_capacity(entries.len());
        let mut cumulative = Vec::with_capacity(entries.len());
        let mut running = 0u64;
        for (destination, weight) in entries {
            running += weight as u64;
            destinations.push(destination);
            cumulative.push(running);
        }
        Self {
            destinations,
            cumulative,
        }
    }

    /// Weight domestic destinations (matching `domestic_country`) against
    /// everything else.
    pub fn weighted_by_country(
        destinations: Vec<Destination>,
        domestic_country: &str,
        domestic_weight: u32,
        international_weight: u32,
    ) -> Self {
        let entries = destinations
            .into_iter()
            .map(|d| {
                let w = if d.country == domestic_country {
                    domestic_weight
                } else {
                    international_weight
                };
                (d, w)
            })
            .collect();
        Self::new(entries)
    }

    pub fn total_weight(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// All destinations, in insertion order.
    pub fn destinations(&self) -> &[Destination] {
        &self.destinations
    }

    /// Weight of the destination at `index`.
    pub fn weight_of(&self, index: usize) -> u64 {
        let upper = self.cumulative.get(index).copied().unwrap_or(0);
        let lower = if index == 0 {
            0
        } else {
            self.cumulative.get(index - 1).copied().unwrap_or(upper)
        };
        upper - lower
    }

    /// Draw a destination. Returns `None` only for a pool with zero total weight.
    pub fn pick(&self, rng: &mut dyn RandomSource) -> Option<&Destination> {
        let total = self.total_weight();
        if total == 0 {
            return None;
        }
        let point = ((rng.next_u64() as u128 * total as u128) >> 64) as u64;
        let idx = self.cumulative.partition_point(|&c| c <= point);
        self.destinations.get(idx)
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Errors raised while assembling a [`Catalog`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    #[error("catalog has no warehouses")]
    NoWarehouses,

    #[error("destination pool is empty or has zero total weight")]
    NoDestinations,

    #[error("duplicate warehouse name '{name}'")]
    DuplicateWarehouse { name: String },
}

/// Validated reference data for the generator.
#[derive(Debug, Clone)]
pub struct Catalog {
    warehouses: Vec<Warehouse>,
    destinations: DestinationPool,
}

impl Catalog {
    pub fn new(warehouses: Vec<Warehouse>, destinations: DestinationPool) -> Result<Self, CatalogError> {
        if warehouses.is_empty() {
            return Err(CatalogError::NoWarehouses);
        }
        if destinations.total_weight() == 0 {
            return Err(CatalogError::NoDestinations);
        }
        let mut seen = HashSet::new();
        for w in &warehouses {
            if !seen.insert(w.name.as_str()) {
                return Err(CatalogError::DuplicateWarehouse {
                    name: w.name.clone(),
                });
            }
        }
        Ok(Self {
            warehouses,
            destinations,
        })
    }

    /// The built-in network: 10 US fulfilment centres, 30 US cities weighted
    /// 3:1 over 8 international cities.
    pub fn builtin() -> Self {
        Self {
            warehouses: builtin_warehouses(),
            destinations: DestinationPool::weighted_by_country(
                builtin_destinations(),
                DOMESTIC_COUNTRY,
                DOMESTIC_WEIGHT,
                INTERNATIONAL_WEIGHT,
            ),
        }
    }

    /// Warehouses with their seed intensities.
    pub fn warehouses(&self) -> &[Warehouse] {
        &self.warehouses
    }

    pub fn destinations(&self) -> &DestinationPool {
        &self.destinations
    }

    pub fn warehouse(&self, name: &str) -> Option<&Warehouse> {
        self.warehouses.iter().find(|w| w.name == name)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

// ---------------------------------------------------------------------------
// Built-in network
// ---------------------------------------------------------------------------

pub const DOMESTIC_COUNTRY: &str = "USA";
pub const DOMESTIC_WEIGHT: u32 = 3;
pub const INTERNATIONAL_WEIGHT: u32 = 1;

/// (name, lat, lng, seed intensity)
const WAREHOUSES: &[(&str, f64, f64, f64)] = &[
    ("Anaheim, CA", 33.8366, -117.9143, 0.8),
    ("Reno, NV", 39.5296, -119.8138, 0.6),
    ("Las Vegas, NV", 36.1699, -115.1398, 0.7),
    ("Salt Lake City, UT", 40.7608, -111.8910, 0.5),
    ("Houston, TX", 29.7604, -95.3698, 0.75),
    ("Chicago, IL", 41.8781, -87.6298, 0.85),
    ("Atlanta, GA", 33.7490, -84.3880, 0.7),
    ("West Hazleton, PA", 40.9584, -75.9946, 0.65),
    ("Scranton, PA", 41.4090, -75.6624, 0.55),
    ("Olean, NY", 42.0784, -78.4297, 0.5),
];

/// (city, state, lat, lng)
const US_CITIES: &[(&str, &str, f64, f64)] = &[
    ("Los Angeles", "CA", 34.0522, -118.2437),
    ("San Francisco", "CA", 37.7749, -122.4194),
    ("San Diego", "CA", 32.7157, -117.1611),
    ("Seattle", "WA", 47.6062, -122.3321),
    ("Portland", "OR", 45.5152, -122.6784),
    ("Phoenix", "AZ", 33.4484, -112.0740),
    ("Denver", "CO", 39.7392, -104.9903),
    ("Miami", "FL", 25.7617, -80.1918),
    ("Orlando", "FL", 28.5383, -81.3792),
    ("Tampa", "FL", 27.9506, -82.4572),
    ("Dallas", "TX", 32.7767, -96.7970),
    ("Austin", "TX", 30.2672, -97.7431),
    ("San Antonio", "TX", 29.4241, -98.4936),
    ("New Orleans", "LA", 29.9511, -90.0715),
    ("Nashville", "TN", 36.1627, -86.7816),
    ("Charlotte", "NC", 35.2271, -80.8431),
    ("New York", "NY", 40.7128, -74.0060),
    ("Boston", "MA", 42.3601, -71.0589),
    ("Philadelphia", "PA", 39.9526, -75.1652),
    ("Washington", "DC", 38.9072, -77.0369),
    ("Baltimore", "MD", 39.2904, -76.6122),
    ("Pittsburgh", "PA", 40.4406, -79.9959),
    ("Detroit", "MI", 42.3314, -83.0458),
    ("Minneapolis", "MN", 44.9778, -93.2650),
    ("St. Louis", "MO", 38.6270, -90.1994),
    ("Indianapolis", "IN", 39.7684, -86.1581),
    ("Columbus", "OH", 39.9612, -82.9988),
    ("Cleveland", "OH", 41.4993, -81.6944),
    ("Kansas City", "MO", 39.0997, -94.5786),
    ("Milwaukee", "WI", 43.0389, -87.9065),
];

/// (city, country, lat, lng)
const INTERNATIONAL_CITIES: &[(&str, &str, f64, f64)] = &[
    ("Toronto", "Canada", 43.6532, -79.3832),
    ("Vancouver", "Canada", 49.2827, -123.1207),
    ("Montreal", "Canada", 45.5017, -73.5673),
    ("Mexico City", "Mexico", 19.4326, -99.1332),
    ("London", "UK", 51.5074, -0.1278),
    ("Paris", "France", 48.8566, 2.3522),
    ("Tokyo", "Japan", 35.6762, 139.6503),
    ("Sydney", "Australia", -33.8688, 151.2093),
];

pub fn builtin_warehouses() -> Vec<Warehouse> {
    WAREHOUSES
        .iter()
        .map(|&(name, lat, lng, intensity)| Warehouse::new(name, lat, lng, intensity))
        .collect()
}

pub fn builtin_destinations() -> Vec<Destination> {
    let domestic = US_CITIES.iter().map(|&(city, state, lat, lng)| Destination {
        city: city.into(),
        state: Some(state.into()),
        country: DOMESTIC_COUNTRY.into(),
        lat,
        lng,
    });
    let international = INTERNATIONAL_CITIES
        .iter()
        .map(|&(city, country, lat, lng)| Destination {
            city: city.into(),
            state: None,
            country: country.into(),
            lat,
            lng,
        });
    domestic.chain(international).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SimRng;

    fn city(name: &str, state: Option<&str>, country: &str) -> Destination {
        Destination {
            city: name.into(),
            state: state.map(Into::into),
            country: country.into(),
            lat: 0.0,
            lng: 0.0,
        }
    }

    #[test]
    fn region_prefers_state() {
        assert_eq!(city("Austin", Some("TX"), "USA").region(), "TX");
        assert_eq!(city("Tokyo", None, "Japan").region(), "Japan");
    }

    #[test]
    fn category_labels_round_trip() {
        for c in Category::ALL {
            assert_eq!(Category::from_label(c.label()), Some(c));
        }
        assert_eq!(Category::from_label("Garden Gnomes"), None);
    }

    #[test]
    fn category_serializes_as_label() {
        let json = serde_json::to_string(&Category::HomeAndGarden).unwrap();
        assert_eq!(json, "\"Home & Garden\"");
    }

    #[test]
    fn builtin_network_shape() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.warehouses().len(), 10);
        assert_eq!(catalog.destinations().len(), 38);
        // 30 domestic * 3 + 8 international * 1
        assert_eq!(catalog.destinations().total_weight(), 98);
    }

    #[test]
    fn pool_weights_by_country() {
        let pool = DestinationPool::weighted_by_country(
            vec![city("A", Some("CA"), "USA"), city("B", None, "France")],
            "USA",
            3,
            1,
        );
        assert_eq!(pool.weight_of(0), 3);
        assert_eq!(pool.weight_of(1), 1);
        assert_eq!(pool.total_weight(), 4);
    }

    #[test]
    fn pick_follows_weights() {
        let pool = DestinationPool::weighted_by_country(
            vec![city("A", Some("CA"), "USA"), city("B", None, "France")],
            "USA",
            3,
            1,
        );
        let mut rng = SimRng::new(77);
        let mut domestic = 0u32;
        let trials = 20_000;
        for _ in 0..trials {
            if pool.pick(&mut rng).unwrap().city == "A" {
                domestic += 1;
            }
        }
        // Expect ~15000; generous tolerance.
        assert!((14_000..=16_000).contains(&domestic), "domestic picks {domestic}");
    }

    #[test]
    fn zero_weight_entries_never_drawn() {
        let pool = DestinationPool::new(vec![
            (city("Never", None, "X"), 0),
            (city("Always", None, "Y"), 5),
        ]);
        let mut rng = SimRng::new(1);
        for _ in 0..1000 {
            assert_eq!(pool.pick(&mut rng).unwrap().city, "Always");
        }
    }

    #[test]
    fn empty_pool_picks_nothing() {
        let pool = DestinationPool::new(Vec::new());
        let mut rng = SimRng::new(1);
        assert!(pool.pick(&mut rng).is_none());
    }

    #[test]
    fn catalog_rejects_empty_warehouses() {
        let pool = DestinationPool::new(vec![(city("A", None, "X"), 1)]);
        assert_eq!(
            Catalog::new(Vec::new(), pool).unwrap_err(),
            CatalogError::NoWarehouses
        );
    }

    #[test]
    fn catalog_rejects_zero_weight_pool() {
        let pool = DestinationPool::new(vec![(city("A", None, "X"), 0)]);
        let err = Catalog::new(builtin_warehouses(), pool).unwrap_err();
        assert_eq!(err, CatalogError::NoDestinations);
    }

    #[test]
    fn catalog_rejects_duplicate_warehouse() {
        let pool = DestinationPool::new(vec![(city("A", None, "X"), 1)]);
        let warehouses = vec![
            Warehouse::new("Reno, NV", 0.0, 0.0, 0.5),
            Warehouse::new("Reno, NV", 1.0, 1.0, 0.5),
        ];
        assert_eq!(
            Catalog::new(warehouses, pool).unwrap_err(),
            CatalogError::DuplicateWarehouse {
                name: "Reno, NV".into()
            }
        );
    }

    #[test]
    fn catalog_looks_up_warehouse_by_name() {
        let catalog = Catalog::builtin();
        let chicago = catalog.warehouse("Chicago, IL").unwrap();
        assert_eq!(chicago.intensity, 0.85);
        assert!(catalog.warehouse("Nowhere").is_none());
    }
}
