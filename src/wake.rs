use serde::{Deserialize, Serialize};

use crate::spatial::Position;

fn default_coefficient() -> f64 {
    0.15
}

fn default_decay() -> f64 {
    2.0
}

/// Isotropic, exponentially decaying loss of thermal uplift around turbines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WakeModel {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_coefficient")]
    pub coefficient: f64,
    #[serde(default = "default_decay")]
    pub decay: f64,
}

impl Default for WakeModel {
    fn default() -> Self {
        Self {
            enabled: false,
            coefficient: default_coefficient(),
            decay: default_decay(),
        }
    }
}

impl WakeModel {
    pub const MIN_MULTIPLIER: f64 = 0.1;
    pub const MAX_MULTIPLIER: f64 = 1.0;

    /// Thermal multiplier at `pos`, clipped to `[0.1, 1.0]`.
    pub fn multiplier(&self, pos: Position, turbines: &[Position]) -> f64 {
        if !self.enabled || turbines.is_empty() {
            return Self::MAX_MULTIPLIER;
        }
        let decay = self.decay.max(1e-6);
        let exposure: f64 = turbines
            .iter()
            .map(|t| (-t.distance(pos) / decay).exp())
            .sum();
        let value = 1.0 - self.coefficient * exposure;
        if value.is_nan() {
            return Self::MIN_MULTIPLIER;
        }
        value.clamp(Self::MIN_MULTIPLIER, Self::MAX_MULTIPLIER)
    }
}
