use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::rng::RandomSource;

/// Identifies a synthetic order. Cheap to copy and compare.
///
/// Built from the generator's [`RandomSource`] rather than the OS, so a
/// seeded generator produces the same ids on every run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OrderId(pub Uuid);

impl OrderId {
    /// Draw 128 random bits and stamp them with the v4 version/variant.
    pub fn random(rng: &mut dyn RandomSource) -> Self {
        let mut bytes = [0u8; 16];
        bytes[..8].copy_from_slice(&rng.next_u64().to_le_bytes());
        bytes[8..].copy_from_slice(&rng.next_u64().to_le_bytes());
        Self(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "order-{}", self.0.simple())
    }
}
