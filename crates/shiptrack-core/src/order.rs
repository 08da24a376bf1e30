use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::catalog::{Category, Destination, Warehouse};
use crate::id::OrderId;

/// A synthetic order. Immutable once generated.
///
/// The origin warehouse is copied by value so later intensity updates never
/// alias into orders already in flight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub origin: Warehouse,
    pub destination: Destination,
    pub created_at: DateTime<Utc>,
    pub value: f64,
    pub units: u32,
    pub category: Category,
}

/// Orders are shared between the live window, the history log and the
/// replay backlog without copying.
pub type SharedOrder = Arc<Order>;

impl Order {
    /// Grouping key for destination breakdowns.
    pub fn region(&self) -> &str {
        self.destination.region()
    }

    pub fn into_shared(self) -> SharedOrder {
        Arc::new(self)
    }
}

impl AsRef<Order> for Order {
    fn as_ref(&self) -> &Order {
        self
    }
}
