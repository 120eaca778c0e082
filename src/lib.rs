pub mod agent;
pub mod bayes;
pub mod curtailment;
pub mod engine;
pub mod graph;
pub mod landscape;
pub mod metrics;
pub mod output;
pub mod params;
pub mod rng;
pub mod scenario;
pub mod spatial;
pub mod systems;
pub mod wake;
pub mod world;

pub use engine::{Engine, EngineBuilder, EngineSettings, RunSummary};
pub use landscape::Landscape;
pub use metrics::{MetricsLog, MetricsRecorder};
pub use scenario::{Scenario, ScenarioLoader};
pub use world::{ReplacementPolicy, World};
