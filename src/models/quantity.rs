//! Quantity sampling grid.
//!
//! Node quantities are drawn from a `[min, step, max]` triplet. The achievable
//! values are `min + step * k` for `k` in `0..=(max - min) / step`; sampling is
//! uniform over that grid, so `max` itself is only reachable when `max - min`
//! is a multiple of `step`.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A `[min, step, max]` quantity triplet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityRange {
    /// Smallest quantity.
    pub min: u32,
    /// Grid step (must be positive).
    pub step: u32,
    /// Upper bound (inclusive, if on the grid).
    pub max: u32,
}

impl QuantityRange {
    /// Creates a quantity range.
    ///
    /// # Panics
    /// Panics if `step == 0` or `max < min`. Ranges decoded from
    /// configuration are checked with [`QuantityRange::is_valid`] first.
    pub fn new(min: u32, step: u32, max: u32) -> Self {
        let range = Self { min, step, max };
        assert!(range.is_valid(), "invalid quantity range {min}/{step}/{max}");
        range
    }

    /// A range that always yields `quantity`.
    pub fn fixed(quantity: u32) -> Self {
        Self::new(quantity, 1, quantity)
    }

    /// Whether `step > 0` and `max >= min`.
    pub fn is_valid(&self) -> bool {
        self.step > 0 && self.max >= self.min
    }

    /// Number of grid steps above `min` (`(max - min) / step`).
    pub fn steps(&self) -> u32 {
        (self.max - self.min) / self.step
    }

    /// Samples a quantity uniformly from the grid.
    pub fn sample<R: Rng>(&self, rng: &mut R) -> u32 {
        self.min + rng.random_range(0..=self.steps()) * self.step
    }

    /// Whether `quantity` lies on the achievable grid.
    pub fn contains(&self, quantity: u32) -> bool {
        quantity >= self.min
            && (quantity - self.min) % self.step == 0
            && (quantity - self.min) / self.step <= self.steps()
    }
}

impl Default for QuantityRange {
    fn default() -> Self {
        Self::fixed(1)
    }
}
