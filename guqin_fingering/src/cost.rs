// Cost model: playing effort between consecutive fingerings.
//
// The cost of moving from fingering A to fingering B is a weighted sum of
// five terms:
//
// - shift: hand travel, |pos(A) - pos(B)|;
// - string change: 1 when A and B share no string;
// - technique change: 1 when the technique sets differ;
// - harmonic penalty: 1 when B uses a harmonic;
// - intonation error: |err(B)| in cents.
//
// The first event of a passage has no predecessor, so its base cost uses
// only the last two terms. Everything is computed over the `Fingering`
// trait (model.rs), so single notes and chords share one code path.
//
// Consumed by search.rs.

use crate::error::{FingeringError, Result};
use crate::model::Fingering;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Cost coefficients. All must be finite and non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Weights {
    /// Per unit of position-ratio travel.
    pub shift: f64,
    pub string_change: f64,
    pub technique_change: f64,
    pub harmonic_penalty: f64,
    /// Per cent of intonation error.
    pub cents_error: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Weights {
            shift: 1.0,
            string_change: 0.5,
            technique_change: 0.2,
            harmonic_penalty: 0.1,
            cents_error: 0.01,
        }
    }
}

impl Weights {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("weights.shift", self.shift),
            ("weights.string_change", self.string_change),
            ("weights.technique_change", self.technique_change),
            ("weights.harmonic_penalty", self.harmonic_penalty),
            ("weights.cents_error", self.cents_error),
        ];
        for (name, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(FingeringError::InvalidOption {
                    name,
                    detail: format!("must be finite and non-negative, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// Additive decomposition of a cost, already multiplied by the weights.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub shift: f64,
    pub string_change: f64,
    pub technique_change: f64,
    pub harmonic: f64,
    pub cents_error: f64,
}

impl CostBreakdown {
    /// Sum of the components, always added in the same order so equal
    /// breakdowns produce bit-identical totals.
    pub fn total(&self) -> f64 {
        self.shift + self.string_change + self.technique_change + self.harmonic + self.cents_error
    }
}

impl Add for CostBreakdown {
    type Output = CostBreakdown;

    fn add(self, rhs: CostBreakdown) -> CostBreakdown {
        CostBreakdown {
            shift: self.shift + rhs.shift,
            string_change: self.string_change + rhs.string_change,
            technique_change: self.technique_change + rhs.technique_change,
            harmonic: self.harmonic + rhs.harmonic,
            cents_error: self.cents_error + rhs.cents_error,
        }
    }
}

impl AddAssign for CostBreakdown {
    fn add_assign(&mut self, rhs: CostBreakdown) {
        *self = *self + rhs;
    }
}

fn indicator(condition: bool) -> f64 {
    if condition { 1.0 } else { 0.0 }
}

/// Cost of a fingering with no predecessor.
pub fn base_cost(first: &dyn Fingering, weights: &Weights) -> CostBreakdown {
    CostBreakdown {
        harmonic: indicator(first.has_harmonic()) * weights.harmonic_penalty,
        cents_error: first.error().abs() * weights.cents_error,
        ..CostBreakdown::default()
    }
}

/// Cost of playing `to` right after `from`.
pub fn transition_cost(
    from: &dyn Fingering,
    to: &dyn Fingering,
    weights: &Weights,
) -> CostBreakdown {
    CostBreakdown {
        shift: (from.position() - to.position()).abs() * weights.shift,
        string_change: indicator(!from.strings().intersects(to.strings()))
            * weights.string_change,
        technique_change: indicator(from.techniques() != to.techniques())
            * weights.technique_change,
        ..base_cost(to, weights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hui::Temperament;
    use crate::model::{Candidate, ChordCandidate, HarmonicNode, SlotChoice, Technique};

    fn cand(string: u8, technique: Technique, pos: f64) -> Candidate {
        Candidate {
            string,
            technique,
            pitch: 60,
            semitones_from_open: 0,
            pos_ratio: pos,
            hui: None,
            temperament: Temperament::Equal,
            harmonic: None,
            cents_error: 0.0,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_default_weights() {
        let w = Weights::default();
        assert_eq!(
            (w.shift, w.string_change, w.technique_change, w.harmonic_penalty, w.cents_error),
            (1.0, 0.5, 0.2, 0.1, 0.01)
        );
        assert!(w.validate().is_ok());
    }

    #[test]
    fn test_open_to_press_same_string() {
        // Open string 3 then press on string 3 at 0.1: shift + technique only.
        let w = Weights::default();
        let c = transition_cost(
            &cand(3, Technique::Open, 0.0),
            &cand(3, Technique::Press, 0.1),
            &w,
        );
        assert!(close(c.shift, 0.1));
        assert_eq!(c.string_change, 0.0);
        assert!(close(c.technique_change, 0.2));
        assert_eq!(c.harmonic, 0.0);
        assert_eq!(c.cents_error, 0.0);
        assert!(close(c.total(), 0.3), "total was {}", c.total());
    }

    #[test]
    fn test_string_change_and_harmonic_terms() {
        let w = Weights::default();
        let mut to = cand(5, Technique::Harmonic, 0.5);
        to.harmonic = Some(HarmonicNode { n: 2, k: 1 });
        to.cents_error = -10.0;
        let c = transition_cost(&cand(1, Technique::Harmonic, 0.5), &to, &w);
        assert_eq!(c.shift, 0.0);
        assert!(close(c.string_change, 0.5), "disjoint strings");
        assert_eq!(c.technique_change, 0.0, "same technique");
        assert!(close(c.harmonic, 0.1));
        assert!(close(c.cents_error, 0.1), "absolute error is used");
    }

    #[test]
    fn test_base_cost_ignores_motion_terms() {
        let w = Weights::default();
        let mut first = cand(1, Technique::Harmonic, 0.25);
        first.cents_error = 13.686;
        let c = base_cost(&first, &w);
        assert_eq!((c.shift, c.string_change, c.technique_change), (0.0, 0.0, 0.0));
        assert!(close(c.total(), 0.1 + 0.13686));
    }

    #[test]
    fn test_chord_shares_string_with_single() {
        // A chord on strings 2 and 4 followed by a single on 4: no string
        // change, but the technique sets {open, press} and {press} differ.
        let w = Weights::default();
        let chord = ChordCandidate::pair(
            SlotChoice {
                slot: "L".into(),
                candidate: cand(2, Technique::Open, 0.0),
            },
            SlotChoice {
                slot: "R".into(),
                candidate: cand(4, Technique::Press, 0.2),
            },
        )
        .unwrap();
        let c = transition_cost(&chord, &cand(4, Technique::Press, 0.3), &w);
        assert!(close(c.shift, 0.2), "chord position is the mean 0.1");
        assert_eq!(c.string_change, 0.0);
        assert!(close(c.technique_change, 0.2));
    }

    #[test]
    fn test_breakdown_sums() {
        let a = CostBreakdown {
            shift: 1.0,
            string_change: 0.5,
            ..Default::default()
        };
        let mut b = CostBreakdown {
            cents_error: 0.25,
            ..Default::default()
        };
        b += a;
        assert_eq!(b.total(), 1.75);
        assert_eq!((a + a).shift, 2.0);
    }

    #[test]
    fn test_rejects_negative_weight() {
        let w = Weights {
            string_change: -0.5,
            ..Default::default()
        };
        assert!(matches!(
            w.validate(),
            Err(FingeringError::InvalidOption { name: "weights.string_change", .. })
        ));
        let w = Weights {
            shift: f64::NAN,
            ..Default::default()
        };
        assert!(w.validate().is_err());
    }
}
