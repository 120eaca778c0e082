//! Individual harrier state and its monthly transitions.
//!
//! Agents are plain records; behaviour lives in free functions that read the
//! landscape through a [`FlightContext`] and draw from the shared stream. The
//! number and order of draws per call is fixed, which is what makes a seeded
//! run reproducible.

use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::graph::NodeId;
use crate::landscape::Landscape;
use crate::params::{Season, SimulationParams};
use crate::rng::RngExt;
use crate::spatial::Position;
use crate::wake::WakeModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AgentId(pub u64);

impl AgentId {
    pub fn raw(self) -> u64 {
        self.0
    }

    pub fn is_even(self) -> bool {
        self.0 % 2 == 0
    }
}

/// Where and how an agent enters the population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentSeed {
    pub id: u64,
    pub position: Position,
    #[serde(default)]
    pub breeding: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    pub id: AgentId,
    pub position: Position,
    pub height: f64,
    pub alive: bool,
    pub breeding: bool,
    pub nest: Option<Position>,
    pub energy: f64,
    pub node: Option<NodeId>,
}

impl Agent {
    /// Draws the initial height and, for breeders, a nest.
    pub fn spawn<R: Rng>(
        id: AgentId,
        position: Position,
        breeding: bool,
        params: &SimulationParams,
        nests: &[Position],
        rng: &mut R,
    ) -> Self {
        let height = rng.uniform_in(params.initial_height);
        let nest = if breeding {
            nests.choose(rng).copied()
        } else {
            None
        };
        Self {
            id,
            position,
            height,
            alive: true,
            breeding,
            nest,
            energy: params.initial_energy,
            node: None,
        }
    }
}

/// Read-only view of everything an agent transition needs for one step.
pub struct FlightContext<'a> {
    pub landscape: &'a Landscape,
    pub params: &'a SimulationParams,
    pub wake: &'a WakeModel,
    pub month: u32,
    pub collision_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Inactive,
    /// Current node has no neighbours.
    Stranded,
    /// Every candidate had zero or invalid weight.
    NoViableStep,
    /// Chosen node lies inside the displacement radius of a turbine.
    Displaced,
    Moved(NodeId),
}

fn set_flight_profile<R: Rng>(agent: &mut Agent, ctx: &FlightContext<'_>, rng: &mut R) {
    let params = ctx.params;
    agent.height = match params.season(ctx.month) {
        Season::Breeding if agent.breeding => {
            if rng.chance(params.bsa_flight_share) {
                rng.uniform_in(params.bsa_height)
            } else {
                rng.uniform_in(params.low_flight_height)
            }
        }
        Season::Migration => rng.uniform_in(params.migration_height),
        _ => rng.uniform_in(params.low_flight_height),
    };
}

pub fn move_agent<R: Rng>(agent: &mut Agent, ctx: &FlightContext<'_>, rng: &mut R) -> MoveOutcome {
    if !agent.alive {
        return MoveOutcome::Inactive;
    }
    let landscape = ctx.landscape;
    let graph = &landscape.graph;

    let current = match agent.node.or_else(|| landscape.nearest_node(agent.position)) {
        Some(node) => node,
        None => return MoveOutcome::Stranded,
    };
    agent.node = Some(current);

    set_flight_profile(agent, ctx, rng);

    let neighbors = graph.neighbors(current);
    if neighbors.is_empty() {
        return MoveOutcome::Stranded;
    }
    let origin = match graph.node(current) {
        Some(node) => node.position,
        None => return MoveOutcome::Stranded,
    };

    let weights: Vec<f64> = neighbors
        .iter()
        .map(|n| {
            let prob = landscape
                .transitions
                .probability(ctx.month, current, n.node, neighbors.len());
            let Some(edge) = graph.edge(n.edge) else {
                return 0.0;
            };
            let mut thermal = edge.thermal;
            if ctx.wake.enabled {
                if let Some(dest) = graph.node(n.node) {
                    thermal *= ctx
                        .wake
                        .multiplier(origin.midpoint(dest.position), landscape.turbine_positions());
                }
            }
            prob * thermal / (1.0 + edge.effective_risk())
        })
        .collect();

    let chooser = match WeightedIndex::new(&weights) {
        Ok(chooser) => chooser,
        Err(_) => return MoveOutcome::NoViableStep,
    };
    let next = neighbors[chooser.sample(rng)].node;
    let Some(destination) = graph.node(next).map(|n| n.position) else {
        return MoveOutcome::NoViableStep;
    };

    if landscape.turbine_within(destination, ctx.params.displacement_radius) {
        return MoveOutcome::Displaced;
    }

    agent.position = destination;
    agent.node = Some(next);
    agent.energy -= 1.0;
    MoveOutcome::Moved(next)
}

/// Resolves turbine exposure for this month. Returns true when the agent is
/// killed; the agent is marked dead in place.
pub fn check_collision<R: Rng>(agent: &mut Agent, ctx: &FlightContext<'_>, rng: &mut R) -> bool {
    if !agent.alive {
        return false;
    }
    let params = ctx.params;
    let landscape = ctx.landscape;
    let breeding_month = params.is_breeding_month(ctx.month);

    let in_blade_band = breeding_month && params.bsa_height.contains(agent.height);
    let in_migration_band =
        params.is_migration_month(ctx.month) && params.migration_height.contains(agent.height);
    if !(in_blade_band || in_migration_band) {
        return false;
    }

    let pos = agent.position;
    if !landscape.turbine_within(pos, params.turbine_proximity) {
        return false;
    }

    // buffers are strict: a bird exactly on the radius is not protected
    if landscape.nest_within(pos, params.nest_buffer_very_high)
        || landscape.communal_roost_within(pos, params.roost_buffer_communal)
        || landscape.single_roost_within(pos, params.roost_buffer_single)
    {
        return false;
    }

    if rng.gen::<f64>() <= params.avoidance_rate {
        return false;
    }

    let mut probability = ctx.collision_probability;
    if rng.chance(params.blade_paint.deployment) {
        probability *= 1.0 - params.blade_paint.reduction;
    }
    if rng.chance(params.shutdown_on_demand.deployment) && breeding_month {
        probability *= 1.0 - params.shutdown_on_demand.reduction;
    }
    if rng.chance(params.prey_reduction.deployment) {
        probability *= 1.0 - params.prey_reduction.reduction;
    }

    if rng.chance(probability) {
        agent.alive = false;
        return true;
    }
    false
}

/// Fledglings produced this month.
///
/// Nest failure is only applied to even identifiers, standing in for the loss
/// of the male parent. The failure draw is taken for every breeder regardless.
pub fn breed<R: Rng>(agent: &Agent, ctx: &FlightContext<'_>, rng: &mut R) -> u32 {
    let params = ctx.params;
    if !(agent.alive && agent.breeding && params.is_breeding_month(ctx.month)) {
        return 0;
    }
    if rng.chance(params.nest_fail_prob) && agent.id.is_even() {
        return 0;
    }
    if rng.chance(params.breed_success_prob) {
        params.fledglings_per_success
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeAttrs, GraphNode, SpatialGraph};
    use crate::landscape::{LandscapeInputs, Turbine};
    use crate::params::Mitigation;
    use crate::rng::SimRng;

    const BREEDING_MONTH: u32 = 7;
    const QUIET_MONTH: u32 = 3;

    fn edge() -> EdgeAttrs {
        EdgeAttrs {
            distance: 10.0,
            turbine_risk: 0.0,
            thermal: 1.0,
            turbine_active: false,
        }
    }

    fn agent_at(id: u64, pos: Position) -> Agent {
        Agent {
            id: AgentId(id),
            position: pos,
            height: 50.0,
            alive: true,
            breeding: true,
            nest: None,
            energy: 100.0,
            node: None,
        }
    }

    fn context<'a>(
        landscape: &'a Landscape,
        params: &'a SimulationParams,
        wake: &'a WakeModel,
        month: u32,
        collision_probability: f64,
    ) -> FlightContext<'a> {
        FlightContext {
            landscape,
            params,
            wake,
            month,
            collision_probability,
        }
    }

    /// Mitigation never deploys and avoidance never triggers.
    fn lethal_params() -> SimulationParams {
        SimulationParams {
            avoidance_rate: 0.0,
            blade_paint: Mitigation {
                deployment: 0.0,
                reduction: 0.71,
            },
            shutdown_on_demand: Mitigation {
                deployment: 0.0,
                reduction: 0.5,
            },
            prey_reduction: Mitigation {
                deployment: 0.0,
                reduction: 0.5,
            },
            ..SimulationParams::default()
        }
    }

    fn turbine_landscape(nests: Vec<Position>) -> Landscape {
        Landscape::new(LandscapeInputs {
            graph: SpatialGraph::new(vec![GraphNode::waypoint(Position::new(0.0, 0.0))]),
            turbines: vec![Turbine {
                position: Position::new(0.0, 0.0),
                blade_radius: 0.05,
                collision_radius: None,
            }],
            nests,
            ..LandscapeInputs::default()
        })
        .unwrap()
    }

    #[test]
    fn isolated_node_leaves_agent_in_place() {
        let landscape = Landscape::new(LandscapeInputs {
            graph: SpatialGraph::new(vec![GraphNode::waypoint(Position::new(5.0, 5.0))]),
            ..LandscapeInputs::default()
        })
        .unwrap();
        let params = SimulationParams::default();
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, QUIET_MONTH, 0.15);
        let mut rng = SimRng::new(42);
        let mut agent = agent_at(1, Position::new(5.0, 5.0));
        agent.node = Some(0);

        assert_eq!(move_agent(&mut agent, &ctx, &mut rng), MoveOutcome::Stranded);
        assert_eq!(agent.position, Position::new(5.0, 5.0));
        assert_eq!(agent.node, Some(0));
        assert_eq!(agent.energy, 100.0);
    }

    #[test]
    fn isolated_unassigned_agent_only_records_its_node() {
        let landscape = Landscape::new(LandscapeInputs {
            graph: SpatialGraph::new(vec![GraphNode::waypoint(Position::new(5.0, 5.0))]),
            ..LandscapeInputs::default()
        })
        .unwrap();
        let params = SimulationParams::default();
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, QUIET_MONTH, 0.15);
        let mut rng = SimRng::new(42);
        let mut agent = agent_at(1, Position::new(6.0, 4.0));

        assert_eq!(move_agent(&mut agent, &ctx, &mut rng), MoveOutcome::Stranded);
        assert_eq!(agent.node, Some(0));
        assert_eq!(agent.position, Position::new(6.0, 4.0));
        assert_eq!(agent.energy, 100.0);
    }

    #[test]
    fn unassigned_agent_snaps_to_nearest_node_and_moves() {
        let mut graph = SpatialGraph::new(vec![
            GraphNode::waypoint(Position::new(10.0, 10.0)),
            GraphNode::waypoint(Position::new(20.0, 10.0)),
        ]);
        graph.add_edge(0, 1, edge()).unwrap();
        let landscape = Landscape::new(LandscapeInputs {
            graph,
            ..LandscapeInputs::default()
        })
        .unwrap();
        let params = SimulationParams::default();
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, QUIET_MONTH, 0.15);
        let mut rng = SimRng::new(42);
        let mut agent = agent_at(1, Position::new(11.0, 9.0));

        assert_eq!(move_agent(&mut agent, &ctx, &mut rng), MoveOutcome::Moved(1));
        assert_eq!(agent.position, Position::new(20.0, 10.0));
        assert_eq!(agent.energy, 99.0);
        assert!(params.low_flight_height.contains(agent.height));
    }

    #[test]
    fn turbine_displacement_rejects_move() {
        let mut graph = SpatialGraph::new(vec![
            GraphNode::waypoint(Position::new(10.0, 10.0)),
            GraphNode::waypoint(Position::new(20.0, 10.0)),
        ]);
        graph.add_edge(0, 1, edge()).unwrap();
        let landscape = Landscape::new(LandscapeInputs {
            graph,
            turbines: vec![Turbine {
                position: Position::new(20.2, 10.0),
                blade_radius: 0.05,
                collision_radius: None,
            }],
            ..LandscapeInputs::default()
        })
        .unwrap();
        let params = SimulationParams::default();
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, QUIET_MONTH, 0.15);
        let mut rng = SimRng::new(1);
        let mut agent = agent_at(1, Position::new(10.0, 10.0));
        agent.node = Some(0);

        assert_eq!(move_agent(&mut agent, &ctx, &mut rng), MoveOutcome::Displaced);
        assert_eq!(agent.position, Position::new(10.0, 10.0));
        assert_eq!(agent.node, Some(0));
        assert_eq!(agent.energy, 100.0);
    }

    #[test]
    fn zero_weights_make_move_a_no_op() {
        let mut graph = SpatialGraph::new(vec![
            GraphNode::waypoint(Position::new(0.0, 0.0)),
            GraphNode::waypoint(Position::new(5.0, 0.0)),
        ]);
        graph
            .add_edge(
                0,
                1,
                EdgeAttrs {
                    thermal: 0.0,
                    ..edge()
                },
            )
            .unwrap();
        let landscape = Landscape::new(LandscapeInputs {
            graph,
            ..LandscapeInputs::default()
        })
        .unwrap();
        let params = SimulationParams::default();
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, QUIET_MONTH, 0.15);
        let mut rng = SimRng::new(9);
        let mut agent = agent_at(1, Position::new(0.0, 0.0));

        assert_eq!(move_agent(&mut agent, &ctx, &mut rng), MoveOutcome::NoViableStep);
        assert_eq!(agent.position, Position::new(0.0, 0.0));
    }

    #[test]
    fn dead_agents_do_nothing() {
        let landscape = turbine_landscape(vec![]);
        let params = lethal_params();
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, BREEDING_MONTH, 1.0);
        let mut rng = SimRng::new(42);
        let mut agent = agent_at(2, Position::new(0.0, 0.0));
        agent.alive = false;

        assert_eq!(move_agent(&mut agent, &ctx, &mut rng), MoveOutcome::Inactive);
        assert!(!check_collision(&mut agent, &ctx, &mut rng));
        assert_eq!(breed(&agent, &ctx, &mut rng), 0);
    }

    #[test]
    fn exposed_bird_without_protection_is_killed() {
        let landscape = turbine_landscape(vec![]);
        let params = lethal_params();
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, BREEDING_MONTH, 1.0);
        let mut rng = SimRng::new(42);
        let mut agent = agent_at(1, Position::new(0.5, 0.0));

        assert!(check_collision(&mut agent, &ctx, &mut rng));
        assert!(!agent.alive);
    }

    #[test]
    fn nest_buffer_inside_radius_protects() {
        let landscape = turbine_landscape(vec![Position::new(2.999, 0.0)]);
        let params = lethal_params();
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, BREEDING_MONTH, 1.0);
        let mut rng = SimRng::new(42);
        let mut agent = agent_at(1, Position::new(0.0, 0.0));

        assert!(!check_collision(&mut agent, &ctx, &mut rng));
        assert!(agent.alive);
    }

    #[test]
    fn nest_buffer_boundary_is_not_protected() {
        let landscape = turbine_landscape(vec![Position::new(3.0, 0.0)]);
        let params = lethal_params();
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, BREEDING_MONTH, 1.0);
        let mut rng = SimRng::new(42);
        let mut agent = agent_at(1, Position::new(0.0, 0.0));

        assert!(check_collision(&mut agent, &ctx, &mut rng));
    }

    #[test]
    fn height_outside_seasonal_band_is_safe() {
        let landscape = turbine_landscape(vec![]);
        let params = lethal_params();
        let wake = WakeModel::default();
        let mut rng = SimRng::new(42);

        let ctx = context(&landscape, &params, &wake, BREEDING_MONTH, 1.0);
        let mut low = agent_at(1, Position::new(0.0, 0.0));
        low.height = 20.0;
        assert!(!check_collision(&mut low, &ctx, &mut rng));

        // migration band is narrower than the blade band
        let ctx = context(&landscape, &params, &wake, 1, 1.0);
        let mut high = agent_at(1, Position::new(0.0, 0.0));
        high.height = 120.0;
        assert!(!check_collision(&mut high, &ctx, &mut rng));

        let ctx = context(&landscape, &params, &wake, QUIET_MONTH, 1.0);
        let mut quiet = agent_at(1, Position::new(0.0, 0.0));
        assert!(!check_collision(&mut quiet, &ctx, &mut rng));
    }

    #[test]
    fn no_turbines_means_no_collisions() {
        let landscape = Landscape::new(LandscapeInputs {
            graph: SpatialGraph::new(vec![GraphNode::waypoint(Position::new(0.0, 0.0))]),
            ..LandscapeInputs::default()
        })
        .unwrap();
        let params = lethal_params();
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, BREEDING_MONTH, 1.0);
        let mut rng = SimRng::new(42);
        for _ in 0..100 {
            let mut agent = agent_at(1, Position::new(0.0, 0.0));
            assert!(!check_collision(&mut agent, &ctx, &mut rng));
        }
    }

    #[test]
    fn full_mitigation_prevents_every_death() {
        let landscape = turbine_landscape(vec![]);
        let params = SimulationParams {
            blade_paint: Mitigation {
                deployment: 1.0,
                reduction: 1.0,
            },
            ..lethal_params()
        };
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, BREEDING_MONTH, 1.0);
        let mut rng = SimRng::new(5);
        for _ in 0..50 {
            let mut agent = agent_at(1, Position::new(0.0, 0.0));
            assert!(!check_collision(&mut agent, &ctx, &mut rng));
        }
    }

    #[test]
    fn breeding_requires_season_and_flag() {
        let landscape = turbine_landscape(vec![]);
        let params = SimulationParams {
            nest_fail_prob: 0.0,
            breed_success_prob: 1.0,
            ..SimulationParams::default()
        };
        let wake = WakeModel::default();
        let mut rng = SimRng::new(42);

        let ctx = context(&landscape, &params, &wake, BREEDING_MONTH, 0.15);
        assert_eq!(breed(&agent_at(3, Position::default()), &ctx, &mut rng), 2);
        let mut non_breeder = agent_at(3, Position::default());
        non_breeder.breeding = false;
        assert_eq!(breed(&non_breeder, &ctx, &mut rng), 0);

        let ctx = context(&landscape, &params, &wake, QUIET_MONTH, 0.15);
        assert_eq!(breed(&agent_at(3, Position::default()), &ctx, &mut rng), 0);
    }

    #[test]
    fn nest_failure_only_hits_even_ids() {
        let landscape = turbine_landscape(vec![]);
        let params = SimulationParams {
            nest_fail_prob: 1.0,
            breed_success_prob: 1.0,
            ..SimulationParams::default()
        };
        let wake = WakeModel::default();
        let ctx = context(&landscape, &params, &wake, BREEDING_MONTH, 0.15);
        let mut rng = SimRng::new(42);

        assert_eq!(breed(&agent_at(4, Position::default()), &ctx, &mut rng), 0);
        assert_eq!(breed(&agent_at(5, Position::default()), &ctx, &mut rng), 2);
    }

    #[test]
    fn spawn_assigns_nest_only_to_breeders() {
        let params = SimulationParams::default();
        let nests = [Position::new(30.0, 30.0), Position::new(60.0, 60.0)];
        let mut rng = SimRng::new(42);

        let breeder = Agent::spawn(AgentId(0), Position::default(), true, &params, &nests, &mut rng);
        assert!(breeder.nest.is_some_and(|n| nests.contains(&n)));
        assert!(params.initial_height.contains(breeder.height));

        let other = Agent::spawn(AgentId(1), Position::default(), false, &params, &nests, &mut rng);
        assert_eq!(other.nest, None);

        let orphan = Agent::spawn(AgentId(2), Position::default(), true, &params, &[], &mut rng);
        assert_eq!(orphan.nest, None);
    }
}
