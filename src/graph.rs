//! Movement graph: node arena, adjacency lists, and typed edge attributes.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::landscape::Turbine;
use crate::params::SimulationParams;
use crate::spatial::Position;

pub type NodeId = usize;
pub type EdgeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Waypoint,
    Terrain,
    Turbine,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub position: Position,
    pub kind: NodeKind,
    #[serde(default)]
    pub elevation: Option<f64>,
    #[serde(default)]
    pub slope: Option<f64>,
}

impl GraphNode {
    pub fn waypoint(position: Position) -> Self {
        Self {
            position,
            kind: NodeKind::Waypoint,
            elevation: None,
            slope: None,
        }
    }
}

fn default_thermal() -> f64 {
    1.0
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttrs {
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub turbine_risk: f64,
    #[serde(default = "default_thermal")]
    pub thermal: f64,
    #[serde(default)]
    pub turbine_active: bool,
}

impl EdgeAttrs {
    /// Turbine risk only counts while the turbines along the edge are spinning.
    pub fn effective_risk(&self) -> f64 {
        if self.turbine_active {
            self.turbine_risk
        } else {
            0.0
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub node: NodeId,
    pub edge: EdgeId,
}

#[derive(Debug, Error, PartialEq)]
pub enum GraphError {
    #[error("edge {from} -> {to} references unknown node (graph has {nodes} nodes)")]
    UnknownNode {
        from: NodeId,
        to: NodeId,
        nodes: usize,
    },
    #[error("edge {0} -> {0} is a self loop")]
    SelfLoop(NodeId),
    #[error("transition entry for month {0} is outside 1..=12")]
    InvalidMonth(u32),
    #[error("transition probability {0} is outside [0, 1]")]
    InvalidProbability(f64),
}

/// Undirected graph with index-addressed nodes. Static once built.
#[derive(Debug, Clone, Default)]
pub struct SpatialGraph {
    nodes: Vec<GraphNode>,
    edges: Vec<(NodeId, NodeId, EdgeAttrs)>,
    adjacency: Vec<Vec<Neighbor>>,
}

impl SpatialGraph {
    pub fn new(nodes: Vec<GraphNode>) -> Self {
        let adjacency = vec![Vec::new(); nodes.len()];
        Self {
            nodes,
            edges: Vec::new(),
            adjacency,
        }
    }

    /// Graph with no waypoints collapses to one node at `fallback`.
    pub fn with_fallback(nodes: Vec<GraphNode>, fallback: Position) -> Self {
        if nodes.is_empty() {
            warn!(
                x = fallback.x,
                y = fallback.y,
                "movement graph is empty, falling back to a single waypoint"
            );
            return Self::new(vec![GraphNode::waypoint(fallback)]);
        }
        Self::new(nodes)
    }

    /// Inserts an undirected edge, replacing the attributes of an existing one.
    pub fn add_edge(
        &mut self,
        from: NodeId,
        to: NodeId,
        attrs: EdgeAttrs,
    ) -> Result<EdgeId, GraphError> {
        if from >= self.nodes.len() || to >= self.nodes.len() {
            return Err(GraphError::UnknownNode {
                from,
                to,
                nodes: self.nodes.len(),
            });
        }
        if from == to {
            return Err(GraphError::SelfLoop(from));
        }
        if let Some(existing) = self.edge_between(from, to) {
            self.edges[existing].2 = attrs;
            return Ok(existing);
        }
        let id = self.edges.len();
        self.edges.push((from, to, attrs));
        self.adjacency[from].push(Neighbor { node: to, edge: id });
        self.adjacency[to].push(Neighbor {
            node: from,
            edge: id,
        });
        Ok(id)
    }

    pub fn edge_between(&self, a: NodeId, b: NodeId) -> Option<EdgeId> {
        self.adjacency
            .get(a)?
            .iter()
            .find(|n| n.node == b)
            .map(|n| n.edge)
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&EdgeAttrs> {
        self.edges.get(id).map(|(_, _, attrs)| attrs)
    }

    /// Neighbours in insertion order; empty for an unknown node.
    pub fn neighbors(&self, id: NodeId) -> &[Neighbor] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn positions(&self) -> Vec<Position> {
        self.nodes.iter().map(|n| n.position).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionKey {
    pub month: u32,
    pub from: NodeId,
    pub to: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEntry {
    pub month: u32,
    pub from: NodeId,
    pub to: NodeId,
    pub probability: f64,
}

/// Monthly node-to-node movement probabilities. Missing entries resolve to a
/// uniform choice over the source node's neighbours.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    entries: HashMap<TransitionKey, f64>,
}

impl TransitionTable {
    pub fn insert(&mut self, entry: &TransitionEntry) -> Result<(), GraphError> {
        if !(1..=12).contains(&entry.month) {
            return Err(GraphError::InvalidMonth(entry.month));
        }
        if !(0.0..=1.0).contains(&entry.probability) {
            return Err(GraphError::InvalidProbability(entry.probability));
        }
        self.entries.insert(
            TransitionKey {
                month: entry.month,
                from: entry.from,
                to: entry.to,
            },
            entry.probability,
        );
        Ok(())
    }

    pub fn probability(&self, month: u32, from: NodeId, to: NodeId, neighbor_count: usize) -> f64 {
        self.entries
            .get(&TransitionKey { month, from, to })
            .copied()
            .unwrap_or_else(|| 1.0 / neighbor_count.max(1) as f64)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeatherSample {
    pub wind_speed: f64,
    pub pressure: f64,
}

impl WeatherSample {
    pub fn thermal(&self) -> f64 {
        self.wind_speed * 1000.0 / self.pressure
    }
}

/// Derives the movement graph from clustered waypoints, steep terrain cells,
/// turbines, and a weather series.
pub struct GraphBuilder<'a> {
    params: &'a SimulationParams,
    waypoints: Vec<Position>,
    terrain: Vec<GraphNode>,
    turbines: &'a [Turbine],
    weather: &'a [WeatherSample],
}

impl<'a> GraphBuilder<'a> {
    pub fn new(params: &'a SimulationParams, turbines: &'a [Turbine], weather: &'a [WeatherSample]) -> Self {
        Self {
            params,
            waypoints: Vec::new(),
            terrain: Vec::new(),
            turbines,
            weather,
        }
    }

    pub fn waypoints(mut self, waypoints: impl IntoIterator<Item = Position>) -> Self {
        self.waypoints.extend(waypoints);
        self
    }

    pub fn terrain(mut self, nodes: impl IntoIterator<Item = GraphNode>) -> Self {
        self.terrain.extend(nodes);
        self
    }

    pub fn build(self, fallback: Position) -> SpatialGraph {
        let (thermal, turbine_active) = self.weather_summary();
        let waypoint_count = self.waypoints.len();
        let mut nodes: Vec<GraphNode> = self
            .waypoints
            .iter()
            .copied()
            .map(GraphNode::waypoint)
            .collect();
        nodes.extend(self.terrain.into_iter().map(|mut node| {
            node.kind = NodeKind::Terrain;
            node
        }));
        let mut graph = SpatialGraph::with_fallback(nodes, fallback);

        let count = graph.node_count();
        for i in 0..count {
            let origin = graph.nodes[i].position;
            let range = if i < waypoint_count {
                self.params.foraging_range
            } else {
                self.params.non_breeding_range
            };
            let nearby_turbines = self
                .turbines
                .iter()
                .filter(|t| t.position.distance(origin) < t.collision_zone_area())
                .count();
            let turbine_risk = self.params.turbine_risk_increment * nearby_turbines as f64;
            for j in (i + 1)..count {
                let distance = origin.distance(graph.nodes[j].position);
                if distance < range {
                    let attrs = EdgeAttrs {
                        distance,
                        turbine_risk,
                        thermal,
                        turbine_active,
                    };
                    // i < j < count: both endpoints exist and differ
                    let _ = graph.add_edge(i, j, attrs);
                }
            }
        }
        graph
    }

    fn weather_summary(&self) -> (f64, bool) {
        let samples: Vec<&WeatherSample> = self
            .weather
            .iter()
            .filter(|w| w.wind_speed.is_finite() && w.pressure.is_finite() && w.pressure > 0.0)
            .collect();
        if samples.is_empty() {
            return (default_thermal(), false);
        }
        let n = samples.len() as f64;
        let thermal = samples.iter().map(|w| w.thermal()).sum::<f64>() / n;
        let active = samples
            .iter()
            .filter(|w| w.wind_speed > self.params.wind_threshold)
            .count() as f64
            / n;
        (thermal, active > 0.5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> SpatialGraph {
        let mut graph = SpatialGraph::new(vec![
            GraphNode::waypoint(Position::new(0.0, 0.0)),
            GraphNode::waypoint(Position::new(1.0, 0.0)),
            GraphNode::waypoint(Position::new(0.0, 1.0)),
        ]);
        let attrs = EdgeAttrs {
            distance: 1.0,
            turbine_risk: 0.0,
            thermal: 1.0,
            turbine_active: false,
        };
        graph.add_edge(0, 1, attrs).unwrap();
        graph.add_edge(0, 2, attrs).unwrap();
        graph
    }

    #[test]
    fn adjacency_is_symmetric() {
        let graph = triangle();
        assert_eq!(graph.neighbors(0).len(), 2);
        assert_eq!(graph.neighbors(1).len(), 1);
        assert_eq!(graph.neighbors(1)[0].node, 0);
        assert!(graph.neighbors(99).is_empty());
    }

    #[test]
    fn duplicate_edge_replaces_attributes() {
        let mut graph = triangle();
        let attrs = EdgeAttrs {
            distance: 1.0,
            turbine_risk: 0.3,
            thermal: 2.0,
            turbine_active: true,
        };
        let id = graph.add_edge(1, 0, attrs).unwrap();
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.edge(id).unwrap().thermal, 2.0);
        assert_eq!(graph.neighbors(1).len(), 1);
    }

    #[test]
    fn bad_edges_are_rejected() {
        let mut graph = triangle();
        let attrs = EdgeAttrs {
            distance: 0.0,
            turbine_risk: 0.0,
            thermal: 1.0,
            turbine_active: false,
        };
        assert!(matches!(
            graph.add_edge(0, 7, attrs),
            Err(GraphError::UnknownNode { .. })
        ));
        assert_eq!(graph.add_edge(2, 2, attrs), Err(GraphError::SelfLoop(2)));
    }

    #[test]
    fn effective_risk_requires_active_turbines() {
        let mut attrs = EdgeAttrs {
            distance: 1.0,
            turbine_risk: 0.45,
            thermal: 1.0,
            turbine_active: false,
        };
        assert_eq!(attrs.effective_risk(), 0.0);
        attrs.turbine_active = true;
        assert_eq!(attrs.effective_risk(), 0.45);
    }

    #[test]
    fn missing_transition_defaults_to_uniform() {
        let mut table = TransitionTable::default();
        table
            .insert(&TransitionEntry {
                month: 3,
                from: 0,
                to: 1,
                probability: 0.9,
            })
            .unwrap();
        assert_eq!(table.probability(3, 0, 1, 2), 0.9);
        assert_eq!(table.probability(3, 0, 2, 2), 0.5);
        assert_eq!(table.probability(4, 0, 1, 4), 0.25);
    }

    #[test]
    fn transition_entries_are_validated() {
        let mut table = TransitionTable::default();
        let bad_month = TransitionEntry {
            month: 13,
            from: 0,
            to: 1,
            probability: 0.5,
        };
        assert_eq!(table.insert(&bad_month), Err(GraphError::InvalidMonth(13)));
        let bad_prob = TransitionEntry {
            month: 1,
            from: 0,
            to: 1,
            probability: 1.5,
        };
        assert_eq!(
            table.insert(&bad_prob),
            Err(GraphError::InvalidProbability(1.5))
        );
        assert!(table.is_empty());
    }

    #[test]
    fn builder_falls_back_to_single_node() {
        let params = SimulationParams::default();
        let graph = GraphBuilder::new(&params, &[], &[]).build(Position::new(12.0, 34.0));
        assert_eq!(graph.node_count(), 1);
        assert_eq!(graph.node(0).unwrap().position, Position::new(12.0, 34.0));
        assert!(graph.neighbors(0).is_empty());
    }

    #[test]
    fn builder_connects_nodes_within_range() {
        let params = SimulationParams::default();
        let weather = [
            WeatherSample {
                wind_speed: 5.0,
                pressure: 1000.0,
            },
            WeatherSample {
                wind_speed: 7.0,
                pressure: 1000.0,
            },
        ];
        let graph = GraphBuilder::new(&params, &[], &weather)
            .waypoints([
                Position::new(0.0, 0.0),
                Position::new(10.0, 0.0),
                Position::new(50.0, 0.0),
            ])
            .build(Position::default());
        assert_eq!(graph.edge_count(), 1);
        let edge = graph.edge(graph.edge_between(0, 1).unwrap()).unwrap();
        assert_eq!(edge.distance, 10.0);
        assert!((edge.thermal - 6.0).abs() < 1e-12);
        assert!(edge.turbine_active);
        assert_eq!(edge.turbine_risk, 0.0);
    }

    #[test]
    fn builder_terrain_edges_share_weather_summary() {
        let params = SimulationParams::default();
        let weather = [WeatherSample {
            wind_speed: 2.0,
            pressure: 1000.0,
        }];
        let terrain = GraphNode {
            position: Position::new(0.0, 12.0),
            kind: NodeKind::Waypoint,
            elevation: Some(250.0),
            slope: Some(3.0),
        };
        let graph = GraphBuilder::new(&params, &[], &weather)
            .waypoints([Position::new(0.0, 0.0)])
            .terrain([terrain])
            .build(Position::default());
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.node(1).unwrap().kind, NodeKind::Terrain);
        let edge = graph.edge(graph.edge_between(0, 1).unwrap()).unwrap();
        assert!((edge.thermal - 2.0).abs() < 1e-12);
        assert!(!edge.turbine_active);
    }
}
