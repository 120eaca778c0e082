use anyhow::Result;
use rand::seq::SliceRandom;
use tracing::trace;

use crate::{
    agent::{breed, check_collision, move_agent},
    engine::{StepContext, System},
    rng::SimRng,
    world::World,
};

/// Moves every living agent once, in a fresh random order, resolving
/// collisions and breeding as it goes.
pub struct FlightSystem;

impl FlightSystem {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FlightSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl System for FlightSystem {
    fn name(&self) -> &str {
        "flight"
    }

    fn run(&mut self, ctx: &StepContext<'_>, world: &mut World, rng: &mut SimRng) -> Result<()> {
        let flight = ctx.flight(world.collision_probability);
        let mut order: Vec<usize> = world
            .agents
            .iter()
            .enumerate()
            .filter(|(_, agent)| agent.alive)
            .map(|(idx, _)| idx)
            .collect();
        order.shuffle(rng);

        for idx in order {
            let agent = &mut world.agents[idx];
            move_agent(agent, &flight, rng);
            if check_collision(agent, &flight, rng) {
                world.fatalities += 1;
                if let Some(turbine) = ctx.landscape.nearest_turbine(agent.position) {
                    world.curtailment.record(turbine, ctx.month, ctx.step);
                }
                trace!(
                    agent = agent.id.raw(),
                    x = agent.position.x,
                    y = agent.position.y,
                    month = ctx.month,
                    "collision fatality"
                );
            }
            world.fledglings += breed(agent, &flight, rng);
        }
        Ok(())
    }
}
