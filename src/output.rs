//! Result files written by the runner after a simulation finishes.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::{curtailment::CurtailmentSchedule, landscape::Diagnostics, metrics::MetricsLog};

/// Annual fatality rates above which the population is expected to collapse
/// within the stated horizon.
const COLLAPSE_THRESHOLDS: [(f64, u32); 2] = [(3.0, 100), (5.0, 75)];

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub scenario: String,
    pub seed: u64,
    pub steps: u64,
    pub cancelled: bool,
    pub final_population: usize,
    pub mean_annual_fatalities: f64,
    pub final_collision_probability: f64,
    pub curtailed_turbines: usize,
    pub warnings: Vec<String>,
    pub diagnostics: Diagnostics,
    pub generated_at: String,
}

impl RunReport {
    pub fn new(
        scenario: &str,
        seed: u64,
        cancelled: bool,
        log: &MetricsLog,
        schedule: &CurtailmentSchedule,
        diagnostics: &Diagnostics,
    ) -> Self {
        let mean_annual_fatalities = log.mean_annual_fatalities();
        let warnings = COLLAPSE_THRESHOLDS
            .iter()
            .filter(|(rate, _)| mean_annual_fatalities >= *rate)
            .map(|(rate, years)| {
                format!(
                    "population may collapse in ~{years} years at {rate} or more fatalities per year"
                )
            })
            .collect();
        let latest = log.latest();
        Self {
            scenario: scenario.to_string(),
            seed,
            steps: log.model.len() as u64,
            cancelled,
            final_population: latest.map(|m| m.population).unwrap_or(0),
            mean_annual_fatalities,
            final_collision_probability: latest.map(|m| m.collision_probability).unwrap_or(0.0),
            curtailed_turbines: schedule.turbines().count(),
            warnings,
            diagnostics: diagnostics.clone(),
            generated_at: chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string(),
        }
    }
}

pub struct ResultWriter {
    dir: PathBuf,
}

impl ResultWriter {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Writes model metrics, agent metrics, the curtailment schedule and the
    /// run report under `<dir>/<scenario>/`, returning that directory.
    pub fn write(
        &self,
        report: &RunReport,
        log: &MetricsLog,
        schedule: &CurtailmentSchedule,
    ) -> Result<PathBuf> {
        let dir = self.dir.join(&report.scenario);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
        write_json(&dir.join("model_metrics.json"), &log.model)?;
        write_json(&dir.join("agent_metrics.json"), &log.agents)?;
        write_json(&dir.join("curtailment_schedule.json"), schedule)?;
        write_json(&dir.join("run.json"), report)?;
        Ok(dir)
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", path.display()))?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
}
