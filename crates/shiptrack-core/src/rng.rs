//! Injectable randomness for order generation.
//!
//! The generator never touches a global RNG. It draws from a
//! [`RandomSource`], so tests can substitute a seeded [`SimRng`] and get a
//! reproducible order stream.
//!
//! [`SimRng`] uses the SplitMix64 algorithm: fast, 8 bytes of state, good
//! statistical properties, and trivially serializable.

/// A source of uniformly distributed random bits.
///
/// Only [`next_u64`](Self::next_u64) is required; the range helpers are
/// derived from it.
pub trait RandomSource: Send {
    /// Generate the next `u64` in the sequence.
    fn next_u64(&mut self) -> u64;

    /// Uniform `f64` in `[0, 1)` built from the top 53 bits.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform `f64` in `[min, max)`. Returns `min` when the range is empty.
    fn range_f64(&mut self, min: f64, max: f64) -> f64 {
        if max <= min {
            return min;
        }
        let v = min + self.next_f64() * (max - min);
        // Rounding can land exactly on `max` for very wide ranges.
        if v >= max { min } else { v }
    }

    /// Uniform `u32` in `[min, max]`. Returns `min` when `max < min`.
    fn range_u32_inclusive(&mut self, min: u32, max: u32) -> u32 {
        if max <= min {
            return min;
        }
        let span = (max - min) as usize + 1;
        min + self.index(span) as u32
    }

    /// Uniform index in `[0, len)`. Returns 0 for `len == 0`.
    fn index(&mut self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        // Multiply-high maps the full u64 range onto [0, len).
        ((self.next_u64() as u128 * len as u128) >> 64) as usize
    }
}

/// SplitMix64 pseudo-random number generator.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SimRng {
    state: u64,
}

impl SimRng {
    /// Create a new RNG with the given seed.
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Create an RNG seeded from the operating system's entropy.
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// Get the internal state.
    pub fn state(&self) -> u64 {
        self.state
    }
}

impl RandomSource for SimRng {
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}
