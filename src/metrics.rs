//! Per-step output rows and the recorder interface the engine reports to.

use serde::Serialize;

use crate::agent::Agent;
use crate::spatial::Position;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ModelMetrics {
    pub step: u64,
    pub month: u32,
    pub population: usize,
    pub fatalities: u32,
    pub fledglings: u32,
    pub collision_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AgentMetrics {
    pub step: u64,
    pub agent: u64,
    pub position: Position,
    pub height: f64,
    pub alive: bool,
}

impl AgentMetrics {
    pub fn from_agent(step: u64, agent: &Agent) -> Self {
        Self {
            step,
            agent: agent.id.raw(),
            position: agent.position,
            height: agent.height,
            alive: agent.alive,
        }
    }
}

/// Receives one model row and the agent rows at the end of every step.
pub trait MetricsRecorder {
    fn record(&mut self, model: &ModelMetrics, agents: &[AgentMetrics]);
}

impl<F> MetricsRecorder for F
where
    F: FnMut(&ModelMetrics, &[AgentMetrics]),
{
    fn record(&mut self, model: &ModelMetrics, agents: &[AgentMetrics]) {
        self(model, agents)
    }
}

/// In-memory time series of everything recorded.
#[derive(Debug, Clone, Default)]
pub struct MetricsLog {
    pub model: Vec<ModelMetrics>,
    pub agents: Vec<AgentMetrics>,
    skip_agents: bool,
}

impl MetricsLog {
    /// Keeps model rows only; agent rows grow with population x horizon.
    pub fn model_only() -> Self {
        Self {
            skip_agents: true,
            ..Self::default()
        }
    }

    pub fn latest(&self) -> Option<&ModelMetrics> {
        self.model.last()
    }

    pub fn total_fatalities(&self) -> u64 {
        self.model.iter().map(|m| m.fatalities as u64).sum()
    }

    /// Mean fatalities per simulated year (12 steps).
    pub fn mean_annual_fatalities(&self) -> f64 {
        if self.model.is_empty() {
            return 0.0;
        }
        self.total_fatalities() as f64 / self.model.len() as f64 * 12.0
    }
}

impl MetricsRecorder for MetricsLog {
    fn record(&mut self, model: &ModelMetrics, agents: &[AgentMetrics]) {
        self.model.push(*model);
        if !self.skip_agents {
            self.agents.extend_from_slice(agents);
        }
    }
}
