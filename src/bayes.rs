//! Beta-binomial estimate of the per-exposure collision probability.
//!
//! The posterior is rebuilt from the fixed Beta prior and the whole tracking
//! table on every step; evidence is not carried over between steps. Whether a
//! tracked exposure counts as a collision is itself drawn with the previous
//! step's probability.

use rand::Rng;

use crate::landscape::{TrackingRecord, Turbine};
use crate::params::SimulationParams;
use crate::rng::RngExt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Posterior {
    pub alpha: f64,
    pub beta: f64,
    pub exposures: u64,
    pub collisions: u64,
}

impl Posterior {
    pub fn mean(&self) -> f64 {
        let total = self.alpha + self.beta;
        if total <= 0.0 {
            return 0.0;
        }
        (self.alpha / total).clamp(0.0, 1.0)
    }
}

pub fn posterior_collision_probability<R: Rng>(
    params: &SimulationParams,
    current: f64,
    tracking: &[TrackingRecord],
    turbines: &[Turbine],
    rng: &mut R,
) -> Posterior {
    let mut exposures = 0u64;
    let mut collisions = 0u64;
    for record in tracking {
        if !params.bsa_height.contains(record.alt) {
            continue;
        }
        let pos = record.position();
        for turbine in turbines {
            if turbine.in_collision_zone(pos) {
                exposures += 1;
                if rng.chance(current) {
                    collisions += 1;
                }
            }
        }
    }
    Posterior {
        alpha: params.prior_alpha + collisions as f64,
        beta: params.prior_beta + (exposures - collisions) as f64,
        exposures,
        collisions,
    }
}
