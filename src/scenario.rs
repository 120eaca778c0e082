use std::{
    collections::{BTreeMap, HashSet},
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    agent::AgentSeed,
    engine::EngineSettings,
    graph::{
        EdgeAttrs, GraphBuilder, GraphError, GraphNode, NodeId, SpatialGraph, TransitionEntry,
        WeatherSample,
    },
    landscape::{Diagnostics, InputError, Landscape, LandscapeInputs, TrackingRecord, Turbine},
    params::SimulationParams,
    spatial::Position,
    wake::WakeModel,
    world::{ReplacementPolicy, SpawnBounds},
};

fn default_years() -> u64 {
    100
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(flatten)]
    pub attrs: EdgeAttrs,
}

/// Graph produced upstream by the clustering step.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSpec {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<EdgeSpec>,
}

/// Everything collaborators hand to the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InputBundle {
    /// Pre-built graph; when absent the graph is derived from `waypoints`,
    /// `terrain` and `weather`.
    #[serde(default)]
    pub graph: Option<GraphSpec>,
    #[serde(default)]
    pub waypoints: Vec<Position>,
    #[serde(default)]
    pub terrain: Vec<GraphNode>,
    #[serde(default)]
    pub weather: Vec<WeatherSample>,
    #[serde(default)]
    pub turbines: Vec<Turbine>,
    #[serde(default)]
    pub tracking: Vec<TrackingRecord>,
    #[serde(default)]
    pub transitions: Vec<TransitionEntry>,
    #[serde(default)]
    pub nests: Vec<Position>,
    #[serde(default)]
    pub communal_roosts: Vec<Position>,
    #[serde(default)]
    pub single_roosts: Vec<Position>,
    /// Explicit initial population; derived from `tracking` when empty.
    #[serde(default)]
    pub agents: Vec<AgentSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: Option<String>,
    pub seed: u64,
    #[serde(default = "default_years")]
    pub years: u64,
    #[serde(default)]
    pub replacement_policy: ReplacementPolicy,
    #[serde(default)]
    pub wake: WakeModel,
    #[serde(default)]
    pub bounds: SpawnBounds,
    #[serde(default)]
    pub params: SimulationParams,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub inputs: InputBundle,
    /// JSON file with an [`InputBundle`], relative to the scenario file.
    #[serde(default)]
    pub inputs_file: Option<PathBuf>,
}

pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<Scenario> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
        let mut scenario: Scenario = serde_yaml::from_str(&data)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        if let Some(inputs_file) = &scenario.inputs_file {
            let inputs_path = path
                .parent()
                .map(|dir| dir.join(inputs_file))
                .unwrap_or_else(|| inputs_file.clone());
            let raw = fs::read_to_string(&inputs_path).with_context(|| {
                format!("Failed to read input bundle {}", inputs_path.display())
            })?;
            scenario.inputs = serde_json::from_str(&raw)
                .with_context(|| format!("Failed to parse {}", inputs_path.display()))?;
        }

        scenario.validate()?;
        Ok(scenario)
    }
}

impl Scenario {
    pub fn from_yaml(text: &str) -> Result<Self> {
        let scenario: Scenario = serde_yaml::from_str(text).context("Failed to parse scenario")?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            bail!("scenario must define a name");
        }
        let months = self
            .params
            .breeding_months
            .iter()
            .chain(&self.params.migration_months);
        for month in months {
            if !(1..=12).contains(month) {
                bail!("season month {month} is outside 1..=12");
            }
        }
        if self.bounds.width <= 0.0 || self.bounds.height <= 0.0 {
            bail!("spawn bounds must be positive");
        }
        Ok(())
    }

    pub fn steps(&self, override_years: Option<u64>) -> u64 {
        override_years.unwrap_or(self.years) * 12
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            scenario_name: self.name.clone(),
            seed: self.seed,
            policy: self.replacement_policy,
            wake: self.wake,
            params: self.params.clone(),
            bounds: self.bounds,
        }
    }

    pub fn build_landscape(&self) -> Result<Landscape, InputError> {
        let inputs = &self.inputs;
        let mut diagnostics = Diagnostics::default();
        let turbines: Vec<Turbine> = inputs
            .turbines
            .iter()
            .map(|t| t.with_margin(self.params.collision_margin))
            .collect();
        let fallback = Landscape::tracking_centroid(&inputs.tracking);

        let (graph, transitions) = match &inputs.graph {
            Some(prebuilt) => {
                let remap = NodeRemap::new(&prebuilt.nodes);
                diagnostics.skipped_nodes = remap.dropped();
                let mut graph = SpatialGraph::with_fallback(remap.kept_nodes(&prebuilt.nodes), fallback);
                for edge in &prebuilt.edges {
                    match (remap.get(edge.from), remap.get(edge.to)) {
                        (Some(Some(from)), Some(Some(to))) => {
                            graph.add_edge(from, to, edge.attrs)?;
                        }
                        (Some(_), Some(_)) => diagnostics.skipped_edges += 1,
                        _ => {
                            return Err(GraphError::UnknownNode {
                                from: edge.from,
                                to: edge.to,
                                nodes: prebuilt.nodes.len(),
                            }
                            .into())
                        }
                    }
                }
                let mut transitions = Vec::with_capacity(inputs.transitions.len());
                for entry in &inputs.transitions {
                    match (remap.get(entry.from), remap.get(entry.to)) {
                        (Some(Some(from)), Some(Some(to))) => transitions.push(TransitionEntry {
                            month: entry.month,
                            from,
                            to,
                            probability: entry.probability,
                        }),
                        _ => diagnostics.skipped_transitions += 1,
                    }
                }
                (graph, transitions)
            }
            None => {
                let waypoints: Vec<Position> = inputs
                    .waypoints
                    .iter()
                    .copied()
                    .filter(Position::is_finite)
                    .collect();
                let terrain: Vec<GraphNode> = inputs
                    .terrain
                    .iter()
                    .filter(|node| node.position.is_finite())
                    .cloned()
                    .collect();
                diagnostics.skipped_nodes = inputs.waypoints.len() + inputs.terrain.len()
                    - waypoints.len()
                    - terrain.len();
                let graph = GraphBuilder::new(&self.params, &turbines, &inputs.weather)
                    .waypoints(waypoints)
                    .terrain(terrain)
                    .build(fallback);
                (graph, inputs.transitions.clone())
            }
        };

        Landscape::new(LandscapeInputs {
            graph,
            transitions,
            turbines,
            tracking: inputs.tracking.clone(),
            nests: inputs.nests.clone(),
            communal_roosts: inputs.communal_roosts.clone(),
            single_roosts: inputs.single_roosts.clone(),
            max_tracking_speed: Some(self.params.max_tracking_speed),
            diagnostics,
        })
    }

    /// Explicit agents, or one per tracked individual at its first retained
    /// fix. Individuals are ordered by id; the leading share are breeders.
    /// Explicit agents with non-finite positions are skipped and counted in
    /// the landscape diagnostics; a repeated id is rejected.
    pub fn agent_seeds(&self, landscape: &mut Landscape) -> Result<Vec<AgentSeed>, InputError> {
        if !self.inputs.agents.is_empty() {
            let mut ids = HashSet::new();
            let mut seeds = Vec::with_capacity(self.inputs.agents.len());
            for seed in &self.inputs.agents {
                if !ids.insert(seed.id) {
                    return Err(InputError::DuplicateAgent(seed.id));
                }
                if seed.position.is_finite() {
                    seeds.push(*seed);
                }
            }
            let skipped = self.inputs.agents.len() - seeds.len();
            if skipped > 0 {
                warn!(count = skipped, "skipped initial agents with non-finite positions");
                landscape.diagnostics.skipped_agents += skipped;
            }
            return Ok(seeds);
        }

        let mut first_fix: BTreeMap<u64, Position> = BTreeMap::new();
        for record in &landscape.tracking {
            first_fix.entry(record.individual).or_insert(record.position());
        }
        if first_fix.is_empty() {
            return Err(InputError::MissingTracking);
        }
        let breeding_cut = (self.params.breeding_share * first_fix.len() as f64).floor() as usize;
        Ok(first_fix
            .into_iter()
            .enumerate()
            .map(|(idx, (id, position))| AgentSeed {
                id,
                position,
                breeding: idx < breeding_cut,
            })
            .collect())
    }
}

/// Maps prebuilt node ids onto the nodes that survive the finiteness check.
struct NodeRemap {
    ids: Vec<Option<NodeId>>,
}

impl NodeRemap {
    fn new(nodes: &[GraphNode]) -> Self {
        let mut next = 0;
        let ids = nodes
            .iter()
            .map(|node| {
                node.position.is_finite().then(|| {
                    next += 1;
                    next - 1
                })
            })
            .collect();
        Self { ids }
    }

    /// `None` for an id outside the input, `Some(None)` for a dropped node.
    fn get(&self, id: NodeId) -> Option<Option<NodeId>> {
        self.ids.get(id).copied()
    }

    fn dropped(&self) -> usize {
        self.ids.iter().filter(|id| id.is_none()).count()
    }

    fn kept_nodes(&self, nodes: &[GraphNode]) -> Vec<GraphNode> {
        nodes
            .iter()
            .zip(&self.ids)
            .filter(|(_, id)| id.is_some())
            .map(|(node, _)| node.clone())
            .collect()
    }
}
