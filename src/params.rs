//! Behavioural and mortality constants for the harrier model.
//!
//! Distances share the unit of the landscape coordinates (kilometres on the
//! default 100 x 100 grid); heights are metres above ground.

use serde::{Deserialize, Serialize};

/// Closed altitude interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightBand {
    pub min: f64,
    pub max: f64,
}

impl HeightBand {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, height: f64) -> bool {
        self.min <= height && height <= self.max
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Season {
    Breeding,
    Migration,
    Other,
}

/// A single mitigation measure: applied when its deployment gate succeeds,
/// scaling the mortality probability by `1 - reduction`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mitigation {
    pub deployment: f64,
    pub reduction: f64,
}

fn default_blade_paint() -> Mitigation {
    Mitigation {
        deployment: 0.71,
        reduction: 0.71,
    }
}

fn default_shutdown() -> Mitigation {
    Mitigation {
        deployment: 0.50,
        reduction: 0.50,
    }
}

fn default_prey_reduction() -> Mitigation {
    Mitigation {
        deployment: 0.5,
        reduction: 0.5,
    }
}

fn default_nest_buffer() -> f64 {
    3.0
}

fn default_communal_roost_buffer() -> f64 {
    4.0
}

fn default_single_roost_buffer() -> f64 {
    2.0
}

fn default_bsa_height() -> HeightBand {
    HeightBand::new(30.0, 130.0)
}

fn default_migration_height() -> HeightBand {
    HeightBand::new(60.0, 100.0)
}

fn default_low_flight() -> HeightBand {
    HeightBand::new(0.0, 30.0)
}

fn default_initial_height() -> HeightBand {
    HeightBand::new(0.0, 100.0)
}

fn default_bsa_flight_share() -> f64 {
    0.35
}

fn default_foraging_range() -> f64 {
    16.4
}

fn default_non_breeding_range() -> f64 {
    18.1
}

fn default_avoidance_rate() -> f64 {
    0.935
}

fn default_collision_prob_prior() -> f64 {
    0.15
}

fn default_displacement_radius() -> f64 {
    0.5
}

fn default_turbine_proximity() -> f64 {
    1.0
}

/// 50 m in degrees of latitude.
fn default_collision_margin() -> f64 {
    50.0 / 111_000.0
}

fn default_max_tracking_speed() -> f64 {
    20.0
}

fn default_nest_fail_prob() -> f64 {
    0.3
}

fn default_breed_success_prob() -> f64 {
    0.7
}

fn default_fledglings_per_success() -> u32 {
    2
}

fn default_initial_energy() -> f64 {
    100.0
}

fn default_breeding_share() -> f64 {
    0.12
}

fn default_breeding_months() -> Vec<u32> {
    vec![7, 8, 11, 12]
}

fn default_migration_months() -> Vec<u32> {
    vec![1, 2, 4, 5, 6]
}

fn default_wind_threshold() -> f64 {
    3.0
}

fn default_turbine_risk_increment() -> f64 {
    0.15
}

fn default_prior_alpha() -> f64 {
    14.0
}

fn default_prior_beta() -> f64 {
    86.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    #[serde(default = "default_nest_buffer")]
    pub nest_buffer_very_high: f64,
    #[serde(default = "default_communal_roost_buffer")]
    pub roost_buffer_communal: f64,
    #[serde(default = "default_single_roost_buffer")]
    pub roost_buffer_single: f64,
    #[serde(default = "default_bsa_height")]
    pub bsa_height: HeightBand,
    #[serde(default = "default_migration_height")]
    pub migration_height: HeightBand,
    #[serde(default = "default_low_flight")]
    pub low_flight_height: HeightBand,
    #[serde(default = "default_initial_height")]
    pub initial_height: HeightBand,
    /// Chance a breeder flies inside the blade-swept band in a breeding month.
    #[serde(default = "default_bsa_flight_share")]
    pub bsa_flight_share: f64,
    #[serde(default = "default_foraging_range")]
    pub foraging_range: f64,
    #[serde(default = "default_non_breeding_range")]
    pub non_breeding_range: f64,
    #[serde(default = "default_avoidance_rate")]
    pub avoidance_rate: f64,
    #[serde(default = "default_collision_prob_prior")]
    pub collision_prob_prior: f64,
    #[serde(default = "default_displacement_radius")]
    pub displacement_radius: f64,
    /// A bird is exposed only when strictly closer than this to a turbine.
    #[serde(default = "default_turbine_proximity")]
    pub turbine_proximity: f64,
    /// Added to the blade radius of turbines without an explicit collision zone.
    #[serde(default = "default_collision_margin")]
    pub collision_margin: f64,
    /// Tracking fixes at or above this speed are treated as transit and dropped.
    #[serde(default = "default_max_tracking_speed")]
    pub max_tracking_speed: f64,
    #[serde(default = "default_blade_paint")]
    pub blade_paint: Mitigation,
    #[serde(default = "default_shutdown")]
    pub shutdown_on_demand: Mitigation,
    #[serde(default = "default_prey_reduction")]
    pub prey_reduction: Mitigation,
    #[serde(default = "default_nest_fail_prob")]
    pub nest_fail_prob: f64,
    #[serde(default = "default_breed_success_prob")]
    pub breed_success_prob: f64,
    #[serde(default = "default_fledglings_per_success")]
    pub fledglings_per_success: u32,
    #[serde(default = "default_initial_energy")]
    pub initial_energy: f64,
    #[serde(default = "default_breeding_share")]
    pub breeding_share: f64,
    #[serde(default = "default_breeding_months")]
    pub breeding_months: Vec<u32>,
    #[serde(default = "default_migration_months")]
    pub migration_months: Vec<u32>,
    #[serde(default = "default_wind_threshold")]
    pub wind_threshold: f64,
    #[serde(default = "default_turbine_risk_increment")]
    pub turbine_risk_increment: f64,
    #[serde(default = "default_prior_alpha")]
    pub prior_alpha: f64,
    #[serde(default = "default_prior_beta")]
    pub prior_beta: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            nest_buffer_very_high: default_nest_buffer(),
            roost_buffer_communal: default_communal_roost_buffer(),
            roost_buffer_single: default_single_roost_buffer(),
            bsa_height: default_bsa_height(),
            migration_height: default_migration_height(),
            low_flight_height: default_low_flight(),
            initial_height: default_initial_height(),
            bsa_flight_share: default_bsa_flight_share(),
            foraging_range: default_foraging_range(),
            non_breeding_range: default_non_breeding_range(),
            avoidance_rate: default_avoidance_rate(),
            collision_prob_prior: default_collision_prob_prior(),
            displacement_radius: default_displacement_radius(),
            turbine_proximity: default_turbine_proximity(),
            collision_margin: default_collision_margin(),
            max_tracking_speed: default_max_tracking_speed(),
            blade_paint: default_blade_paint(),
            shutdown_on_demand: default_shutdown(),
            prey_reduction: default_prey_reduction(),
            nest_fail_prob: default_nest_fail_prob(),
            breed_success_prob: default_breed_success_prob(),
            fledglings_per_success: default_fledglings_per_success(),
            initial_energy: default_initial_energy(),
            breeding_share: default_breeding_share(),
            breeding_months: default_breeding_months(),
            migration_months: default_migration_months(),
            wind_threshold: default_wind_threshold(),
            turbine_risk_increment: default_turbine_risk_increment(),
            prior_alpha: default_prior_alpha(),
            prior_beta: default_prior_beta(),
        }
    }
}

impl SimulationParams {
    pub fn is_breeding_month(&self, month: u32) -> bool {
        self.breeding_months.contains(&month)
    }

    pub fn is_migration_month(&self, month: u32) -> bool {
        self.migration_months.contains(&month)
    }

    /// Breeding wins over migration when a month sits in both sets.
    pub fn season(&self, month: u32) -> Season {
        if self.is_breeding_month(month) {
            Season::Breeding
        } else if self.is_migration_month(month) {
            Season::Migration
        } else {
            Season::Other
        }
    }
}
