use anyhow::Result;
use tracing::trace;

use crate::{
    bayes::posterior_collision_probability,
    engine::{StepContext, System},
    rng::SimRng,
    world::World,
};

/// Clears the monthly counters and re-estimates the collision probability
/// that every agent will use for this step.
pub struct RiskSystem;

impl RiskSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RiskSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for RiskSystem {
    fn name(&self) -> &str {
        "risk"
    }

    fn run(&mut self, ctx: &StepContext<'_>, world: &mut World, rng: &mut SimRng) -> Result<()> {
        world.fatalities = 0;
        world.fledglings = 0;

        let posterior = posterior_collision_probability(
            ctx.params(),
            world.collision_probability,
            &ctx.landscape.tracking,
            &ctx.landscape.turbines,
            rng,
        );
        world.collision_probability = posterior.mean();
        trace!(
            exposures = posterior.exposures,
            collisions = posterior.collisions,
            probability = world.collision_probability,
            "posterior updated"
        );
        Ok(())
    }
}
