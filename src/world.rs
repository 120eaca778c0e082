use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::agent::{Agent, AgentId};
use crate::curtailment::CurtailmentSchedule;
use crate::metrics::{AgentMetrics, ModelMetrics};
use crate::params::SimulationParams;
use crate::rng::RngExt;
use crate::spatial::Position;

/// How dead birds are replaced by fledglings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplacementPolicy {
    /// Respawn dead agents at the end of the same step, one fledgling each.
    #[default]
    Immediate,
    /// Bank recruits and release them when a breeding season starts.
    Seasonal,
}

impl std::str::FromStr for ReplacementPolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "immediate" => Ok(ReplacementPolicy::Immediate),
            "seasonal" => Ok(ReplacementPolicy::Seasonal),
            other => Err(format!(
                "unknown replacement policy '{other}' (expected 'immediate' or 'seasonal')"
            )),
        }
    }
}

fn default_extent() -> f64 {
    99.0
}

/// Rectangle `[0, width) x [0, height)` in which recruits appear.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpawnBounds {
    #[serde(default = "default_extent")]
    pub width: f64,
    #[serde(default = "default_extent")]
    pub height: f64,
}

impl Default for SpawnBounds {
    fn default() -> Self {
        Self {
            width: default_extent(),
            height: default_extent(),
        }
    }
}

impl SpawnBounds {
    pub fn sample<R: Rng>(&self, rng: &mut R) -> Position {
        let x = rng.uniform(0.0, self.width);
        let y = rng.uniform(0.0, self.height);
        Position::new(x, y)
    }
}

/// Mutable simulation state. Static inputs live in
/// [`Landscape`](crate::landscape::Landscape).
pub struct World {
    month: u32,
    last_month: u32,
    steps: u64,
    pub(crate) agents: Vec<Agent>,
    pub(crate) collision_probability: f64,
    pub(crate) fatalities: u32,
    pub(crate) fledglings: u32,
    pub(crate) pending_recruits: u32,
    pub(crate) curtailment: CurtailmentSchedule,
}

impl World {
    pub fn new(params: &SimulationParams) -> Self {
        Self {
            month: 1,
            last_month: 1,
            steps: 0,
            agents: Vec::new(),
            collision_probability: params.collision_prob_prior,
            fatalities: 0,
            fledglings: 0,
            pending_recruits: 0,
            curtailment: CurtailmentSchedule::default(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn last_month(&self) -> u32 {
        self.last_month
    }

    /// Steps completed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub(crate) fn advance_month(&mut self) {
        self.month = self.month % 12 + 1;
    }

    pub(crate) fn finish_step(&mut self) {
        self.last_month = self.month;
        self.steps += 1;
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn population(&self) -> usize {
        self.agents.iter().filter(|a| a.alive).count()
    }

    pub fn collision_probability(&self) -> f64 {
        self.collision_probability
    }

    pub fn fatalities(&self) -> u32 {
        self.fatalities
    }

    pub fn fledglings(&self) -> u32 {
        self.fledglings
    }

    pub fn pending_recruits(&self) -> u32 {
        self.pending_recruits
    }

    pub fn curtailment(&self) -> &CurtailmentSchedule {
        &self.curtailment
    }

    pub fn add_agent(&mut self, agent: Agent) {
        self.agents.push(agent);
    }

    /// Removes an agent from the active set. Unknown ids are ignored.
    pub fn remove_agent(&mut self, id: AgentId) -> Option<Agent> {
        let index = self.agents.iter().position(|a| a.id == id)?;
        Some(self.agents.remove(index))
    }

    /// Drains every agent marked dead, preserving the order of the survivors.
    pub(crate) fn remove_dead(&mut self) -> Vec<Agent> {
        let dead: Vec<AgentId> = self
            .agents
            .iter()
            .filter(|a| !a.alive)
            .map(|a| a.id)
            .collect();
        dead.into_iter()
            .filter_map(|id| self.remove_agent(id))
            .collect()
    }

    /// Identifier for a recruit that is not in use by any active agent.
    pub(crate) fn next_recruit_id(&self) -> AgentId {
        let max = self.agents.iter().map(|a| a.id.raw()).max().unwrap_or(0);
        AgentId(max + 1)
    }

    pub fn model_metrics(&self) -> ModelMetrics {
        ModelMetrics {
            step: self.steps,
            month: self.month,
            population: self.population(),
            fatalities: self.fatalities,
            fledglings: self.fledglings,
            collision_probability: self.collision_probability,
        }
    }

    pub fn agent_metrics(&self) -> Vec<AgentMetrics> {
        self.agents
            .iter()
            .map(|agent| AgentMetrics::from_agent(self.steps, agent))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::SimRng;

    fn agent(id: u64, alive: bool) -> Agent {
        Agent {
            id: AgentId(id),
            position: Position::default(),
            height: 10.0,
            alive,
            breeding: false,
            nest: None,
            energy: 100.0,
            node: None,
        }
    }

    #[test]
    fn month_wraps_after_december() {
        let mut world = World::new(&SimulationParams::default());
        for _ in 0..11 {
            world.advance_month();
        }
        assert_eq!(world.month(), 12);
        world.advance_month();
        assert_eq!(world.month(), 1);
    }

    #[test]
    fn removing_twice_is_harmless() {
        let mut world = World::new(&SimulationParams::default());
        world.add_agent(agent(1, true));
        assert!(world.remove_agent(AgentId(1)).is_some());
        assert!(world.remove_agent(AgentId(1)).is_none());
        assert!(world.agents().is_empty());
    }

    #[test]
    fn remove_dead_keeps_survivor_order() {
        let mut world = World::new(&SimulationParams::default());
        for (id, alive) in [(1, true), (2, false), (3, true), (4, false)] {
            world.add_agent(agent(id, alive));
        }
        let dead = world.remove_dead();
        assert_eq!(dead.iter().map(|a| a.id.raw()).collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(
            world.agents().iter().map(|a| a.id.raw()).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(world.population(), 2);
        assert!(world.remove_dead().is_empty());
    }

    #[test]
    fn recruit_ids_follow_highest_active_id() {
        let mut world = World::new(&SimulationParams::default());
        assert_eq!(world.next_recruit_id(), AgentId(1));
        world.add_agent(agent(7, true));
        world.add_agent(agent(3, true));
        assert_eq!(world.next_recruit_id(), AgentId(8));
    }

    #[test]
    fn spawn_positions_stay_in_bounds() {
        let bounds = SpawnBounds::default();
        let mut rng = SimRng::new(42);
        for _ in 0..500 {
            let p = bounds.sample(&mut rng);
            assert!((0.0..99.0).contains(&p.x) && (0.0..99.0).contains(&p.y));
        }
    }

    #[test]
    fn policy_parses_case_insensitively() {
        assert_eq!("Seasonal".parse::<ReplacementPolicy>(), Ok(ReplacementPolicy::Seasonal));
        assert_eq!(" immediate ".parse::<ReplacementPolicy>(), Ok(ReplacementPolicy::Immediate));
        assert!("yearly".parse::<ReplacementPolicy>().is_err());
    }
}
