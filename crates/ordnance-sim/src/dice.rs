//! Random rolls that feed simulation state.
//!
//! All peers must draw the same numbers in the same order, so simulation
//! randomness is seeded from config and kept apart from anything cosmetic.

/// Source of uniform rolls.
pub trait HitDice {
    /// Uniform value in `0..bound`. Returns 0 when `bound` is 0.
    fn roll(&mut self, bound: u32) -> u32;

    /// Rolls a percentage and checks it against `chance`.
    fn hits(&mut self, chance: u32) -> bool {
        self.roll(100) < chance
    }
}

/// Seeded dice backed by `fastrand`.
#[derive(Debug, Clone)]
pub struct SeededDice {
    rng: fastrand::Rng,
}

impl SeededDice {
    /// Creates dice from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self { rng: fastrand::Rng::with_seed(seed) }
    }
}

impl HitDice for SeededDice {
    fn roll(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            0
        } else {
            self.rng.u32(0..bound)
        }
    }
}

/// Dice that always return the same value, clamped below the bound.
///
/// `FixedDice::new(0)` makes every nonzero chance hit.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedDice {
    value: u32,
}

impl FixedDice {
    /// Creates dice that always roll `value`.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self { value }
    }
}

impl HitDice for FixedDice {
    fn roll(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            0
        } else {
            self.value.min(bound - 1)
        }
    }
}
