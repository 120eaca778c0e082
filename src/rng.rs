//! Seeded random stream shared by every system.
//!
//! All draws come from one ChaCha8 stream in a fixed call order, so a seed
//! reproduces a run exactly. Running agents in parallel would reorder draws and
//! is not supported.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::params::HeightBand;

pub struct SimRng {
    inner: ChaCha8Rng,
}

impl SimRng {
    pub fn new(seed: u64) -> Self {
        Self {
            inner: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RngCore for SimRng {
    fn next_u32(&mut self) -> u32 {
        self.inner.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.inner.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.inner.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.inner.try_fill_bytes(dest)
    }
}

/// Helpers for the draws the model makes over and over.
pub trait RngExt {
    /// Uniform value in `[min, max)`; returns `min` for a degenerate range.
    fn uniform(&mut self, min: f64, max: f64) -> f64;
    fn uniform_in(&mut self, band: HeightBand) -> f64;
    /// Bernoulli gate: true when a unit draw falls strictly below `probability`.
    fn chance(&mut self, probability: f64) -> bool;
}

impl<R: Rng> RngExt for R {
    fn uniform(&mut self, min: f64, max: f64) -> f64 {
        self.gen::<f64>() * (max - min) + min
    }

    fn uniform_in(&mut self, band: HeightBand) -> f64 {
        self.uniform(band.min, band.max)
    }

    fn chance(&mut self, probability: f64) -> bool {
        self.gen::<f64>() < probability
    }
}
