use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use harrier_abm::{
    engine::EngineBuilder,
    metrics::MetricsLog,
    output::{ResultWriter, RunReport},
    scenario::ScenarioLoader,
    world::{ReplacementPolicy, World},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Harrier collision-risk simulation runner")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, default_value = "scenarios/small_valley.yaml")]
    scenario: PathBuf,

    /// Override the simulated horizon in years (12 steps each)
    #[arg(long)]
    years: Option<u64>,

    /// Override the scenario seed
    #[arg(long)]
    seed: Option<u64>,

    /// Override the replacement policy (immediate or seasonal)
    #[arg(long)]
    policy: Option<ReplacementPolicy>,

    /// Enable turbine wake damping of movement weights
    #[arg(long)]
    wake: bool,

    /// Keep only model rows in memory and on disk
    #[arg(long)]
    model_only: bool,

    /// Directory for result files
    #[arg(long, default_value = "results")]
    output_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let loader = ScenarioLoader::new(".");
    let mut scenario = loader.load(&cli.scenario)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&scenario.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(seed) = cli.seed {
        scenario.seed = seed;
    }
    if let Some(policy) = cli.policy {
        scenario.replacement_policy = policy;
    }
    if cli.wake {
        scenario.wake.enabled = true;
    }
    let steps = scenario.steps(cli.years);

    let mut landscape = scenario.build_landscape()?;
    let seeds = scenario.agent_seeds(&mut landscape)?;
    let diagnostics = landscape.diagnostics.clone();
    info!(
        scenario = %scenario.name,
        description = scenario.description.as_deref().unwrap_or(""),
        seed = scenario.seed,
        steps,
        policy = ?scenario.replacement_policy,
        wake = scenario.wake.enabled,
        "starting run"
    );

    let mut world = World::new(&scenario.params);
    let mut engine = EngineBuilder::new(scenario.engine_settings(), landscape)
        .with_standard_systems()
        .build();
    engine.populate(&mut world, &seeds);

    let mut log = if cli.model_only {
        MetricsLog::model_only()
    } else {
        MetricsLog::default()
    };
    let summary = engine.run(&mut world, steps, &mut log)?;

    let report = RunReport::new(
        &scenario.name,
        scenario.seed,
        summary.cancelled,
        &log,
        world.curtailment(),
        &diagnostics,
    );
    for warning in &report.warnings {
        warn!("{warning}");
    }
    let dir = ResultWriter::new(&cli.output_dir).write(&report, &log, world.curtailment())?;

    println!(
        "Scenario '{}' completed {} steps. Final population: {}, mean annual fatalities: {:.2}, results in {}",
        scenario.name,
        summary.steps_completed,
        report.final_population,
        report.mean_annual_fatalities,
        dir.display()
    );
    Ok(())
}
