//! Static inputs of a run: movement graph, turbines, protected sites and the
//! historical tracking table, together with the spatial indices built over
//! them. Nothing here changes once the simulation starts.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::graph::{GraphError, SpatialGraph, TransitionEntry, TransitionTable};
use crate::spatial::{Position, SpatialIndex};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Turbine {
    pub position: Position,
    pub blade_radius: f64,
    /// Radius of the collision zone. When not supplied, scenarios fill it in
    /// as the blade radius plus the configured safety margin.
    #[serde(default)]
    pub collision_radius: Option<f64>,
}

impl Turbine {
    /// Sets the collision radius to `blade_radius + margin` unless one is given.
    pub fn with_margin(mut self, margin: f64) -> Self {
        if self.collision_radius.is_none() {
            self.collision_radius = Some(self.blade_radius + margin);
        }
        self
    }

    /// Falls back to the bare blade radius when no zone was configured.
    pub fn collision_radius(&self) -> f64 {
        self.collision_radius.unwrap_or(self.blade_radius)
    }

    pub fn collision_zone_area(&self) -> f64 {
        let r = self.collision_radius();
        PI * r * r
    }

    pub fn in_collision_zone(&self, pos: Position) -> bool {
        self.position.distance(pos) < self.collision_radius()
    }

    fn is_valid(&self) -> bool {
        self.position.is_finite()
            && self.blade_radius.is_finite()
            && self.blade_radius >= 0.0
            && self.collision_radius.map_or(true, |r| r.is_finite() && r >= 0.0)
    }
}

/// One row of the historical GPS tracking table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub individual: u64,
    pub timestamp: String,
    pub lat: f64,
    pub lon: f64,
    pub alt: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub slope: Option<f64>,
    #[serde(default)]
    pub height_above_ground: Option<f64>,
}

impl TrackingRecord {
    pub fn position(&self) -> Position {
        Position::new(self.lon, self.lat)
    }

    fn is_valid(&self) -> bool {
        self.lat.is_finite() && self.lon.is_finite() && self.alt.is_finite()
    }
}

#[derive(Debug, Error)]
pub enum InputError {
    #[error("invalid movement graph: {0}")]
    Graph(#[from] GraphError),
    #[error("tracking table is empty and no explicit agents were given")]
    MissingTracking,
    #[error("agent id {0} is used by more than one initial agent")]
    DuplicateAgent(u64),
}

/// Counts of per-record input problems that were skipped at load time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub skipped_tracking_records: usize,
    pub skipped_turbines: usize,
    pub skipped_sites: usize,
    pub skipped_transitions: usize,
    pub skipped_nodes: usize,
    pub skipped_edges: usize,
    pub skipped_agents: usize,
    /// Well-formed fixes dropped by the speed filter. Not a data problem.
    pub filtered_fast_records: usize,
}

impl Diagnostics {
    /// No malformed record was skipped.
    pub fn is_clean(&self) -> bool {
        Diagnostics {
            filtered_fast_records: 0,
            ..self.clone()
        } == Diagnostics::default()
    }
}

/// Raw collaborator products handed to [`Landscape::new`].
#[derive(Debug, Clone, Default)]
pub struct LandscapeInputs {
    pub graph: SpatialGraph,
    pub transitions: Vec<TransitionEntry>,
    pub turbines: Vec<Turbine>,
    pub tracking: Vec<TrackingRecord>,
    pub nests: Vec<Position>,
    pub communal_roosts: Vec<Position>,
    pub single_roosts: Vec<Position>,
    /// Tracking fixes at or above this speed are dropped.
    pub max_tracking_speed: Option<f64>,
    /// Problems already counted while preparing the inputs.
    pub diagnostics: Diagnostics,
}

pub struct Landscape {
    pub graph: SpatialGraph,
    pub transitions: TransitionTable,
    pub turbines: Vec<Turbine>,
    pub tracking: Vec<TrackingRecord>,
    pub nests: Vec<Position>,
    pub communal_roosts: Vec<Position>,
    pub single_roosts: Vec<Position>,
    pub diagnostics: Diagnostics,
    turbine_positions: Vec<Position>,
    node_index: SpatialIndex,
    turbine_index: SpatialIndex,
    nest_index: SpatialIndex,
    communal_index: SpatialIndex,
    single_index: SpatialIndex,
}

impl Landscape {
    pub fn new(inputs: LandscapeInputs) -> Result<Self, InputError> {
        let mut diagnostics = inputs.diagnostics;

        let tracking_total = inputs.tracking.len();
        let tracking: Vec<TrackingRecord> = inputs
            .tracking
            .into_iter()
            .filter(TrackingRecord::is_valid)
            .collect();
        diagnostics.skipped_tracking_records += tracking_total - tracking.len();

        let valid_total = tracking.len();
        let tracking: Vec<TrackingRecord> = match inputs.max_tracking_speed {
            Some(max) => tracking.into_iter().filter(|r| r.speed < max).collect(),
            None => tracking,
        };
        diagnostics.filtered_fast_records += valid_total - tracking.len();

        let turbine_total = inputs.turbines.len();
        let turbines: Vec<Turbine> = inputs
            .turbines
            .into_iter()
            .filter(Turbine::is_valid)
            .collect();
        diagnostics.skipped_turbines += turbine_total - turbines.len();

        let mut skipped_sites = 0;
        let mut keep_finite = |sites: Vec<Position>| -> Vec<Position> {
            let total = sites.len();
            let kept: Vec<Position> = sites.into_iter().filter(Position::is_finite).collect();
            skipped_sites += total - kept.len();
            kept
        };
        let nests = keep_finite(inputs.nests);
        let communal_roosts = keep_finite(inputs.communal_roosts);
        let single_roosts = keep_finite(inputs.single_roosts);
        diagnostics.skipped_sites += skipped_sites;

        let graph = inputs.graph;
        let mut transitions = TransitionTable::default();
        for entry in &inputs.transitions {
            if entry.from >= graph.node_count() || entry.to >= graph.node_count() {
                diagnostics.skipped_transitions += 1;
                continue;
            }
            transitions.insert(entry)?;
        }

        report(&diagnostics);

        let turbine_positions: Vec<Position> = turbines.iter().map(|t| t.position).collect();
        let landscape = Self {
            node_index: SpatialIndex::build(&graph.positions()),
            turbine_index: SpatialIndex::build(&turbine_positions),
            nest_index: SpatialIndex::build(&nests),
            communal_index: SpatialIndex::build(&communal_roosts),
            single_index: SpatialIndex::build(&single_roosts),
            turbine_positions,
            graph,
            transitions,
            turbines,
            tracking,
            nests,
            communal_roosts,
            single_roosts,
            diagnostics,
        };
        info!(
            nodes = landscape.graph.node_count(),
            edges = landscape.graph.edge_count(),
            turbines = landscape.turbines.len(),
            tracking_records = landscape.tracking.len(),
            "landscape ready"
        );
        Ok(landscape)
    }

    pub fn turbine_positions(&self) -> &[Position] {
        &self.turbine_positions
    }

    /// Closest graph node; `None` only for an empty graph.
    pub fn nearest_node(&self, pos: Position) -> Option<usize> {
        self.node_index.nearest(pos)
    }

    pub fn nearest_turbine(&self, pos: Position) -> Option<usize> {
        self.turbine_index.nearest(pos)
    }

    pub fn turbine_within(&self, pos: Position, radius: f64) -> bool {
        self.turbine_index.any_within(pos, radius)
    }

    pub fn nest_within(&self, pos: Position, radius: f64) -> bool {
        self.nest_index.any_within(pos, radius)
    }

    pub fn communal_roost_within(&self, pos: Position, radius: f64) -> bool {
        self.communal_index.any_within(pos, radius)
    }

    pub fn single_roost_within(&self, pos: Position, radius: f64) -> bool {
        self.single_index.any_within(pos, radius)
    }

    /// Mean tracked position, used to place the fallback waypoint.
    pub fn tracking_centroid(records: &[TrackingRecord]) -> Position {
        let valid: Vec<&TrackingRecord> = records.iter().filter(|r| r.is_valid()).collect();
        if valid.is_empty() {
            return Position::default();
        }
        let n = valid.len() as f64;
        Position::new(
            valid.iter().map(|r| r.lon).sum::<f64>() / n,
            valid.iter().map(|r| r.lat).sum::<f64>() / n,
        )
    }
}

fn report(diagnostics: &Diagnostics) {
    if diagnostics.skipped_tracking_records > 0 {
        warn!(
            count = diagnostics.skipped_tracking_records,
            "skipped tracking records with non-finite coordinates or altitude"
        );
    }
    if diagnostics.skipped_turbines > 0 {
        warn!(
            count = diagnostics.skipped_turbines,
            "skipped turbines with invalid position or radius"
        );
    }
    if diagnostics.skipped_sites > 0 {
        warn!(
            count = diagnostics.skipped_sites,
            "skipped nest/roost sites with non-finite coordinates"
        );
    }
    if diagnostics.skipped_transitions > 0 {
        warn!(
            count = diagnostics.skipped_transitions,
            "skipped transition entries referencing unknown nodes"
        );
    }
    if diagnostics.skipped_nodes > 0 {
        warn!(
            count = diagnostics.skipped_nodes,
            edges = diagnostics.skipped_edges,
            "skipped graph nodes with non-finite coordinates and their edges"
        );
    }
    if diagnostics.filtered_fast_records > 0 {
        info!(
            count = diagnostics.filtered_fast_records,
            "dropped tracking fixes above the speed cutoff"
        );
    }
}
