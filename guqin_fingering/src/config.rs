// Request configuration: everything a recommendation needs besides the
// passage and its locks.
//
// `FingeringConfig` bundles the tuning, position-engine options, chord
// limits, cost weights and the number of solutions. Every section has
// serde defaults, so a JSON file only needs the parts it changes. Loaded
// values go through `validate()`, which enforces the accepted request
// ranges before any work starts.

use crate::chord::ChordLimits;
use crate::cost::Weights;
use crate::error::{FingeringError, Result};
use crate::position::PositionOptions;
use crate::tuning::Tuning;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest accepted stopped distance, in semitones.
pub const MAX_SEMITONES_LIMIT: i32 = 60;
/// Largest accepted harmonic tolerance, in cents.
pub const MAX_TOLERANCE_CENTS: f64 = 100.0;
/// Largest accepted number of solutions per request.
pub const MAX_K: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FingeringConfig {
    pub tuning: Tuning,
    pub position: PositionOptions,
    pub weights: Weights,
    pub chord: ChordLimits,
    /// Number of solutions to return.
    pub k: usize,
}

impl Default for FingeringConfig {
    fn default() -> Self {
        FingeringConfig {
            tuning: Tuning::demo(),
            position: PositionOptions::default(),
            weights: Weights::default(),
            chord: ChordLimits::default(),
            k: 5,
        }
    }
}

fn out_of_range(name: &'static str, detail: String) -> FingeringError {
    FingeringError::InvalidOption { name, detail }
}

impl FingeringConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json(&data)
    }

    /// Parse and validate a JSON config.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: FingeringConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.position.validate()?;
        let max_d = self.position.max_semitones;
        if !(0..=MAX_SEMITONES_LIMIT).contains(&max_d) {
            return Err(out_of_range(
                "max_semitones",
                format!("must be in 0..={MAX_SEMITONES_LIMIT}, got {max_d}"),
            ));
        }
        let tol = self.position.harmonic_tolerance_cents;
        if tol > MAX_TOLERANCE_CENTS {
            return Err(out_of_range(
                "harmonic_tolerance_cents",
                format!("must be in 0..={MAX_TOLERANCE_CENTS}, got {tol}"),
            ));
        }
        if !(1..=MAX_K).contains(&self.k) {
            return Err(out_of_range("k", format!("must be in 1..={MAX_K}, got {}", self.k)));
        }
        self.chord.validate()?;
        self.weights.validate()
    }
}
