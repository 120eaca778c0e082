use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    agent::{Agent, AgentId, AgentSeed, FlightContext},
    landscape::Landscape,
    metrics::{MetricsRecorder, ModelMetrics},
    params::SimulationParams,
    rng::SimRng,
    systems::{FlightSystem, PopulationSystem, RiskSystem},
    wake::WakeModel,
    world::{ReplacementPolicy, SpawnBounds, World},
};

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub scenario_name: String,
    pub seed: u64,
    pub policy: ReplacementPolicy,
    pub wake: WakeModel,
    pub params: SimulationParams,
    pub bounds: SpawnBounds,
}

impl EngineSettings {
    pub fn new(scenario_name: impl Into<String>, seed: u64) -> Self {
        Self {
            scenario_name: scenario_name.into(),
            seed,
            policy: ReplacementPolicy::default(),
            wake: WakeModel::default(),
            params: SimulationParams::default(),
            bounds: SpawnBounds::default(),
        }
    }
}

pub struct EngineBuilder {
    settings: EngineSettings,
    landscape: Landscape,
    systems: Vec<Box<dyn System>>,
}

impl EngineBuilder {
    pub fn new(settings: EngineSettings, landscape: Landscape) -> Self {
        Self {
            settings,
            landscape,
            systems: Vec::new(),
        }
    }

    pub fn with_system(mut self, system: impl System + 'static) -> Self {
        self.systems.push(Box::new(system));
        self
    }

    /// Risk update, agent sweep, then cleanup and replacement.
    pub fn with_standard_systems(self) -> Self {
        self.with_system(RiskSystem::new())
            .with_system(FlightSystem::new())
            .with_system(PopulationSystem::new())
    }

    pub fn build(self) -> Engine {
        Engine {
            rng: SimRng::new(self.settings.seed),
            systems: self.systems,
            landscape: self.landscape,
            settings: self.settings,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub steps_completed: u64,
    pub cancelled: bool,
}

pub struct Engine {
    rng: SimRng,
    systems: Vec<Box<dyn System>>,
    landscape: Landscape,
    settings: EngineSettings,
}

impl Engine {
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn landscape(&self) -> &Landscape {
        &self.landscape
    }

    /// Adds the initial population, drawing heights and nests from the run's
    /// stream. Call once, before the first step.
    pub fn populate(&mut self, world: &mut World, seeds: &[AgentSeed]) {
        for seed in seeds {
            let agent = Agent::spawn(
                AgentId(seed.id),
                seed.position,
                seed.breeding,
                &self.settings.params,
                &self.landscape.nests,
                &mut self.rng,
            );
            world.add_agent(agent);
        }
        info!(
            agents = seeds.len(),
            breeders = seeds.iter().filter(|s| s.breeding).count(),
            "population seeded"
        );
    }

    pub fn step<M>(&mut self, world: &mut World, recorder: &mut M) -> Result<ModelMetrics>
    where
        M: MetricsRecorder + ?Sized,
    {
        world.advance_month();
        let ctx = StepContext {
            step: world.steps(),
            month: world.month(),
            previous_month: world.last_month(),
            landscape: &self.landscape,
            settings: &self.settings,
        };
        for system in &mut self.systems {
            system
                .run(&ctx, world, &mut self.rng)
                .with_context(|| format!("system '{}' failed in step {}", system.name(), ctx.step))?;
        }
        world.finish_step();

        let metrics = world.model_metrics();
        recorder.record(&metrics, &world.agent_metrics());
        debug!(
            step = metrics.step,
            month = metrics.month,
            population = metrics.population,
            fatalities = metrics.fatalities,
            fledglings = metrics.fledglings,
            collision_probability = metrics.collision_probability,
            "step complete"
        );
        Ok(metrics)
    }

    pub fn run<M>(&mut self, world: &mut World, steps: u64, recorder: &mut M) -> Result<RunSummary>
    where
        M: MetricsRecorder + ?Sized,
    {
        let never = AtomicBool::new(false);
        self.run_until_cancelled(world, steps, recorder, &never)
    }

    /// Runs up to `steps` steps, checking `cancel` before each one.
    pub fn run_until_cancelled<M>(
        &mut self,
        world: &mut World,
        steps: u64,
        recorder: &mut M,
        cancel: &AtomicBool,
    ) -> Result<RunSummary>
    where
        M: MetricsRecorder + ?Sized,
    {
        let mut completed = 0;
        for _ in 0..steps {
            if cancel.load(Ordering::Relaxed) {
                info!(completed, requested = steps, "run cancelled");
                return Ok(RunSummary {
                    steps_completed: completed,
                    cancelled: true,
                });
            }
            self.step(world, recorder)?;
            completed += 1;
        }
        info!(
            scenario = %self.settings.scenario_name,
            steps = completed,
            population = world.population(),
            curtailed_turbines = world.curtailment().turbines().count(),
            "run finished"
        );
        Ok(RunSummary {
            steps_completed: completed,
            cancelled: false,
        })
    }
}

/// Per-step view handed to every system.
pub struct StepContext<'a> {
    /// Steps completed before this one.
    pub step: u64,
    pub month: u32,
    pub previous_month: u32,
    pub landscape: &'a Landscape,
    pub settings: &'a EngineSettings,
}

impl<'a> StepContext<'a> {
    pub fn params(&self) -> &'a SimulationParams {
        &self.settings.params
    }

    pub fn flight(&self, collision_probability: f64) -> FlightContext<'a> {
        FlightContext {
            landscape: self.landscape,
            params: &self.settings.params,
            wake: &self.settings.wake,
            month: self.month,
            collision_probability,
        }
    }
}

pub trait System {
    fn name(&self) -> &str;
    fn run(&mut self, ctx: &StepContext<'_>, world: &mut World, rng: &mut SimRng) -> Result<()>;
}
