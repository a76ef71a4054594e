// Shared fingering model: techniques, single-note candidates, chord
// candidates, and the `Fingering` view the cost model reads.
//
// A `Candidate` is one physically valid way to sound one pitch: a string,
// a technique, and a position ratio (fraction of string length cut off by
// the stopping point; 0 for an open string, k/n at a harmonic node).
// A `ChordCandidate` pairs two candidates, one per slot of a two-note
// event, and never puts both notes on the same string.
//
// Both implement `Fingering`, which is all the transition-cost function in
// cost.rs needs. That keeps cost.rs and search.rs agnostic to whether an
// event is a single note or a chord.
//
// Candidates are produced fresh per request by position.rs and chord.rs;
// they are never persisted. They serialize so the profile layer can show
// them and translate a choice into written fields (writeback.rs).

use crate::error::{FingeringError, Result};
use crate::hui::Temperament;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a note is sounded on a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Technique {
    /// Unstopped string at its tuned pitch.
    Open,
    /// String stopped against the board at a continuous position.
    Press,
    /// String lightly touched at a node to sound a natural harmonic.
    Harmonic,
}

impl Technique {
    pub const ALL: [Technique; 3] = [Technique::Open, Technique::Press, Technique::Harmonic];

    pub fn as_str(self) -> &'static str {
        match self {
            Technique::Open => "open",
            Technique::Press => "press",
            Technique::Harmonic => "harmonic",
        }
    }

    fn bit(self) -> u8 {
        match self {
            Technique::Open => 1,
            Technique::Press => 2,
            Technique::Harmonic => 4,
        }
    }
}

impl fmt::Display for Technique {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Technique {
    type Err = FingeringError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(Technique::Open),
            "press" => Ok(Technique::Press),
            "harmonic" => Ok(Technique::Harmonic),
            other => Err(FingeringError::UnknownTechnique(other.to_string())),
        }
    }
}

/// Natural-harmonic node: partial `n` touched at `k/n` of the string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HarmonicNode {
    /// Harmonic order (partial number), at least 2.
    pub n: u32,
    /// Node index, 1 <= k < n with gcd(k, n) = 1.
    pub k: u32,
}

impl HarmonicNode {
    pub fn pos_ratio(self) -> f64 {
        self.k as f64 / self.n as f64
    }
}

/// Greatest common divisor (Euclid).
pub fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// One way to produce one target pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// String number, 1..=7.
    pub string: u8,
    pub technique: Technique,
    /// Target pitch (MIDI) this candidate produces.
    pub pitch: i32,
    /// Semitones between the (transposed) open string and the target.
    pub semitones_from_open: i32,
    /// Fraction of string length in [0, 1); 0 for open strings.
    #[serde(default)]
    pub pos_ratio: f64,
    /// Traditional display coordinate; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hui: Option<f64>,
    #[serde(default)]
    pub temperament: Temperament,
    /// Present exactly when `technique` is `Harmonic`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harmonic: Option<HarmonicNode>,
    /// Intonation error in cents (0 for open and press).
    #[serde(default)]
    pub cents_error: f64,
}

impl Candidate {
    /// Check the fields a candidate's technique requires. Returns a
    /// description of the first problem found.
    pub fn shape_problem(&self) -> Option<String> {
        if !(1..=7).contains(&self.string) {
            return Some(format!("string {} is outside 1..=7", self.string));
        }
        if !self.pos_ratio.is_finite() || !(0.0..1.0).contains(&self.pos_ratio) {
            return Some(format!("pos_ratio {} is outside [0, 1)", self.pos_ratio));
        }
        if !self.cents_error.is_finite() {
            return Some("cents_error is not finite".to_string());
        }
        match (self.technique, self.harmonic) {
            (Technique::Open, None) if self.pos_ratio == 0.0 => None,
            (Technique::Open, None) => Some("open candidate with non-zero pos_ratio".to_string()),
            (Technique::Press, None) if self.pos_ratio > 0.0 => None,
            (Technique::Press, None) => Some("press candidate without a pos_ratio".to_string()),
            (Technique::Harmonic, None) => {
                Some("harmonic candidate without harmonic order/node".to_string())
            }
            (Technique::Harmonic, Some(node)) => {
                if node.n < 2 || node.k == 0 || node.k >= node.n || gcd(node.k, node.n) != 1 {
                    Some(format!("invalid harmonic node k={} n={}", node.k, node.n))
                } else {
                    None
                }
            }
            (t, Some(_)) => Some(format!("{t} candidate carries a harmonic node")),
        }
    }

    pub fn is_harmonic(&self) -> bool {
        self.technique == Technique::Harmonic
    }
}

/// Set of string numbers (bit i = string i).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StringSet(u16);

impl StringSet {
    pub fn single(string: u8) -> Self {
        StringSet(1u16.checked_shl(string as u32).unwrap_or(0))
    }

    pub fn union(self, other: StringSet) -> Self {
        StringSet(self.0 | other.0)
    }

    pub fn intersects(self, other: StringSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn contains(self, string: u8) -> bool {
        string < 16 && self.0 & (1u16 << string) != 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

/// Set of techniques.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TechniqueSet(u8);

impl TechniqueSet {
    pub fn single(t: Technique) -> Self {
        TechniqueSet(t.bit())
    }

    pub fn union(self, other: TechniqueSet) -> Self {
        TechniqueSet(self.0 | other.0)
    }

    pub fn contains(self, t: Technique) -> bool {
        self.0 & t.bit() != 0
    }
}

/// What the cost model needs to know about a chosen fingering, whether a
/// single note or a two-note chord.
pub trait Fingering {
    /// Hand position: the position ratio, or the chord mean.
    fn position(&self) -> f64;
    /// Strings sounded.
    fn strings(&self) -> StringSet;
    /// Techniques used.
    fn techniques(&self) -> TechniqueSet;
    fn has_harmonic(&self) -> bool;
    /// Intonation error in cents (summed over chord notes).
    fn error(&self) -> f64;
}

impl Fingering for Candidate {
    fn position(&self) -> f64 {
        self.pos_ratio
    }

    fn strings(&self) -> StringSet {
        StringSet::single(self.string)
    }

    fn techniques(&self) -> TechniqueSet {
        TechniqueSet::single(self.technique)
    }

    fn has_harmonic(&self) -> bool {
        self.is_harmonic()
    }

    fn error(&self) -> f64 {
        self.cents_error
    }
}

/// One slot of a chord event and the candidate chosen for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotChoice {
    pub slot: String,
    pub candidate: Candidate,
}

/// Joint fingering for a two-note event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChordCandidate {
    /// Slot choices in the event's slot order.
    pub slots: [SlotChoice; 2],
    /// Mean of the two position ratios.
    pub position: f64,
    /// Sum of the two absolute intonation errors.
    pub cents_error: f64,
    pub has_harmonic: bool,
}

impl ChordCandidate {
    /// Pair two slot choices. `None` when both sit on the same string, which
    /// cannot sound two pitches at once.
    pub fn pair(a: SlotChoice, b: SlotChoice) -> Option<Self> {
        if a.candidate.string == b.candidate.string {
            return None;
        }
        let position = (a.candidate.pos_ratio + b.candidate.pos_ratio) / 2.0;
        let cents_error = a.candidate.cents_error.abs() + b.candidate.cents_error.abs();
        let has_harmonic = a.candidate.is_harmonic() || b.candidate.is_harmonic();
        Some(ChordCandidate {
            slots: [a, b],
            position,
            cents_error,
            has_harmonic,
        })
    }

    /// The candidate chosen for `slot`, if the chord has that slot.
    pub fn choice(&self, slot: &str) -> Option<&Candidate> {
        self.slots
            .iter()
            .find(|c| c.slot == slot)
            .map(|c| &c.candidate)
    }
}

impl Fingering for ChordCandidate {
    fn position(&self) -> f64 {
        self.position
    }

    fn strings(&self) -> StringSet {
        self.slots[0]
            .candidate
            .strings()
            .union(self.slots[1].candidate.strings())
    }

    fn techniques(&self) -> TechniqueSet {
        self.slots[0]
            .candidate
            .techniques()
            .union(self.slots[1].candidate.techniques())
    }

    fn has_harmonic(&self) -> bool {
        self.has_harmonic
    }

    fn error(&self) -> f64 {
        self.cents_error
    }
}
