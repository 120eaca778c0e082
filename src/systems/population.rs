use anyhow::Result;
use tracing::debug;

use crate::{
    agent::Agent,
    engine::{StepContext, System},
    rng::SimRng,
    world::{ReplacementPolicy, World},
};

/// Drops this step's dead and replaces them from the fledgling pool.
pub struct PopulationSystem;

impl PopulationSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PopulationSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for PopulationSystem {
    fn name(&self) -> &str {
        "population"
    }

    fn run(&mut self, ctx: &StepContext<'_>, world: &mut World, rng: &mut SimRng) -> Result<()> {
        let dead = world.remove_dead();
        let params = ctx.params();
        let nests = &ctx.landscape.nests;
        let bounds = ctx.settings.bounds;

        match ctx.settings.policy {
            ReplacementPolicy::Immediate => {
                let mut spawned = 0;
                for departed in &dead {
                    if world.fledglings == 0 {
                        break;
                    }
                    let position = bounds.sample(rng);
                    let recruit =
                        Agent::spawn(departed.id, position, departed.breeding, params, nests, rng);
                    world.add_agent(recruit);
                    world.fledglings -= 1;
                    spawned += 1;
                }
                if !dead.is_empty() {
                    debug!(dead = dead.len(), spawned, "immediate replacement");
                }
            }
            ReplacementPolicy::Seasonal => {
                let take = (dead.len() as u32).min(world.fledglings);
                world.pending_recruits += take;
                world.fledglings -= take;

                let entering_breeding = !params.is_breeding_month(ctx.previous_month)
                    && params.is_breeding_month(ctx.month);
                if entering_breeding && world.pending_recruits > 0 {
                    let recruits = world.pending_recruits;
                    for _ in 0..recruits {
                        let position = bounds.sample(rng);
                        let id = world.next_recruit_id();
                        let recruit = Agent::spawn(id, position, true, params, nests, rng);
                        world.add_agent(recruit);
                    }
                    world.pending_recruits = 0;
                    debug!(recruits, month = ctx.month, "seasonal recruitment");
                }
            }
        }
        Ok(())
    }
}
