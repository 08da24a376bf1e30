use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::Category;
use crate::order::Order;

/// Restricts which orders are rendered. Statistics always see every order.
///
/// An empty set means "any" for that dimension.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFilter {
    pub categories: BTreeSet<Category>,
    /// Warehouse names.
    pub warehouses: BTreeSet<String>,
}

impl OrderFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.insert(category);
        self
    }

    pub fn with_warehouse(mut self, name: impl Into<String>) -> Self {
        self.warehouses.insert(name.into());
        self
    }

    /// True when the filter lets everything through.
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty() && self.warehouses.is_empty()
    }

    pub fn matches(&self, order: &Order) -> bool {
        (self.categories.is_empty() || self.categories.contains(&order.category))
            && (self.warehouses.is_empty() || self.warehouses.contains(&order.origin.name))
    }

    /// Keep the matching items, preserving order.
    pub fn apply<'a, I, O>(&self, orders: I) -> Vec<O>
    where
        I: IntoIterator<Item = &'a O>,
        O: AsRef<Order> + Clone + 'a,
    {
        orders
            .into_iter()
            .filter(|o| self.matches(o.as_ref()))
            .cloned()
            .collect()
    }
}
