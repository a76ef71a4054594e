// Position engine (stage 1): every way to sound one target pitch.
//
// Given a target MIDI pitch and a tuning, enumerate every (string,
// technique) pair that produces it:
// - open: the string's open pitch equals the target;
// - press: the target lies 1..=max_semitones above the open pitch; the
//   stopping point sits at pos = 1 - 2^(-d/12) of the string length
//   (equal-tempered string-length ratio, so press candidates are exact);
// - harmonic (optional): the interval above the open string is within a
//   cents tolerance of partial n (12*log2(n) semitones), touched at any
//   node k/n with gcd(k, n) = 1. Harmonics are bounded by the tolerance,
//   not by max_semitones.
//
// A stopped string can only raise the pitch, so strings tuned above the
// target contribute nothing. Output order is deterministic: open/press
// candidates string by string, then harmonics by string, order n, node k.
// search.rs breaks cost ties by this order.
//
// Display coordinates (hui.rs) are attached for UI use only.

use crate::error::{FingeringError, Result};
use crate::hui::{Temperament, hui_for_semitones, hui_from_pos_ratio};
use crate::model::{Candidate, HarmonicNode, Technique, gcd};
use crate::tuning::Tuning;
use serde::{Deserialize, Serialize};

/// Largest harmonic order the engine accepts.
pub const MAX_HARMONIC_ORDER: u32 = 32;

/// Knobs for candidate enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionOptions {
    /// Which display table to read hui coordinates from.
    pub temperament: Temperament,
    /// Furthest stopped distance above the open string, in semitones.
    pub max_semitones: i32,
    pub include_harmonics: bool,
    /// Highest harmonic order considered (2..=32).
    pub max_harmonic_order: u32,
    /// Largest accepted harmonic intonation error, in cents.
    pub harmonic_tolerance_cents: f64,
}

impl Default for PositionOptions {
    fn default() -> Self {
        PositionOptions {
            temperament: Temperament::Equal,
            max_semitones: 36,
            include_harmonics: false,
            max_harmonic_order: 12,
            harmonic_tolerance_cents: 25.0,
        }
    }
}

impl PositionOptions {
    /// Same options with harmonics switched on.
    pub fn with_harmonics(self) -> Self {
        PositionOptions {
            include_harmonics: true,
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_semitones < 0 {
            return Err(FingeringError::InvalidOption {
                name: "max_semitones",
                detail: format!("must be non-negative, got {}", self.max_semitones),
            });
        }
        if !(2..=MAX_HARMONIC_ORDER).contains(&self.max_harmonic_order) {
            return Err(FingeringError::InvalidOption {
                name: "max_harmonic_order",
                detail: format!(
                    "must be in 2..={MAX_HARMONIC_ORDER}, got {}",
                    self.max_harmonic_order
                ),
            });
        }
        if !self.harmonic_tolerance_cents.is_finite() || self.harmonic_tolerance_cents < 0.0 {
            return Err(FingeringError::InvalidOption {
                name: "harmonic_tolerance_cents",
                detail: format!(
                    "must be finite and non-negative, got {}",
                    self.harmonic_tolerance_cents
                ),
            });
        }
        Ok(())
    }
}

/// Equal-tempered stopping position `d` semitones above the open string:
/// frequency ratio 2^(d/12) = 1 / (1 - pos). Zero for `d <= 0`.
pub fn pos_ratio_for_semitones(d: i32) -> f64 {
    if d <= 0 {
        return 0.0;
    }
    1.0 - 2f64.powf(-(d as f64) / 12.0)
}

/// Every candidate fingering for `target` under `tuning`.
///
/// An empty result is not an error here: it means no string can reach the
/// target with these options. Callers decide whether that is fatal.
pub fn enumerate(
    target: i32,
    tuning: &Tuning,
    options: &PositionOptions,
) -> Result<Vec<Candidate>> {
    options.validate()?;
    let mut out = Vec::new();

    for string in Tuning::strings() {
        let d = semitones_above_open(target, tuning, string)?;
        if d < 0 || d > options.max_semitones {
            continue;
        }
        if d == 0 {
            out.push(Candidate {
                string,
                technique: Technique::Open,
                pitch: target,
                semitones_from_open: 0,
                pos_ratio: 0.0,
                hui: None,
                temperament: options.temperament,
                harmonic: None,
                cents_error: 0.0,
            });
        } else {
            out.push(Candidate {
                string,
                technique: Technique::Press,
                pitch: target,
                semitones_from_open: d,
                pos_ratio: pos_ratio_for_semitones(d),
                hui: hui_for_semitones(d, options.temperament),
                temperament: options.temperament,
                harmonic: None,
                cents_error: 0.0,
            });
        }
    }

    if options.include_harmonics {
        for string in Tuning::strings() {
            let interval = semitones_above_open(target, tuning, string)?;
            if interval <= 0 {
                continue;
            }
            push_harmonics(&mut out, string, target, interval, options);
        }
    }

    Ok(out)
}

/// Distance from `string`'s open pitch up to `target`; negative below it.
fn semitones_above_open(target: i32, tuning: &Tuning, string: u8) -> Result<i32> {
    let open = tuning.open_pitch(string)?;
    target
        .checked_sub(open)
        .ok_or_else(|| FingeringError::InvalidPitch(format!("target {target} is out of range")))
}

fn push_harmonics(
    out: &mut Vec<Candidate>,
    string: u8,
    target: i32,
    interval: i32,
    options: &PositionOptions,
) {
    for n in 2..=options.max_harmonic_order {
        let expected = 12.0 * (n as f64).log2();
        let cents_error = (interval as f64 - expected) * 100.0;
        if cents_error.abs() > options.harmonic_tolerance_cents {
            continue;
        }
        for k in (1..n).filter(|&k| gcd(k, n) == 1) {
            let node = HarmonicNode { n, k };
            let pos_ratio = node.pos_ratio();
            out.push(Candidate {
                string,
                technique: Technique::Harmonic,
                pitch: target,
                semitones_from_open: interval,
                pos_ratio,
                hui: hui_from_pos_ratio(pos_ratio, options.temperament),
                temperament: options.temperament,
                harmonic: Some(node),
                cents_error,
            });
        }
    }
}
