// Tuning model: seven open-string pitches plus a global transposition.
//
// Strings are numbered 1..=7 the way guqin notation numbers them (string 1
// is the lowest, nearest the player). Pitches are MIDI note numbers. The
// transpose offset is added to every open string, so a passage can be
// re-pitched without touching the score.
//
// Deserialization goes through `TuningSpec` so a pitch list that is not
// exactly seven long fails with `InvalidTuning` instead of producing a
// value that breaks the invariant later.
//
// Used by position.rs (candidate enumeration) and sounding.rs (the inverse
// fingering-to-pitch derivation).

use crate::error::{FingeringError, Result};
use serde::{Deserialize, Serialize};

/// Number of strings on the instrument.
pub const STRING_COUNT: usize = 7;
/// Highest accepted open-string pitch (MIDI); the lowest is 0.
pub const MAX_OPEN_PITCH: i32 = 127;
/// Largest accepted transpose in either direction, in semitones.
pub const MAX_TRANSPOSE: i32 = 127;

/// Open-string pitches (MIDI) and a semitone transpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TuningSpec", into = "TuningSpec")]
pub struct Tuning {
    name: String,
    open_pitches: [i32; STRING_COUNT],
    transpose: i32,
}

/// Wire form of a tuning, validated on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TuningSpec {
    #[serde(default)]
    name: Option<String>,
    open_pitches: Vec<i32>,
    #[serde(default)]
    transpose: i32,
}

impl TryFrom<TuningSpec> for Tuning {
    type Error = FingeringError;

    fn try_from(spec: TuningSpec) -> Result<Self> {
        let name = spec.name.unwrap_or_else(|| "custom".to_string());
        Tuning::new(name, &spec.open_pitches, spec.transpose)
    }
}

impl From<Tuning> for TuningSpec {
    fn from(t: Tuning) -> Self {
        TuningSpec {
            name: Some(t.name),
            open_pitches: t.open_pitches.to_vec(),
            transpose: t.transpose,
        }
    }
}

impl Tuning {
    /// Build a tuning from a pitch list that must hold exactly seven MIDI
    /// pitches, with a transpose of at most `MAX_TRANSPOSE` either way.
    pub fn new(name: impl Into<String>, open_pitches: &[i32], transpose: i32) -> Result<Self> {
        let open_pitches: [i32; STRING_COUNT] = open_pitches
            .try_into()
            .map_err(|_| FingeringError::InvalidTuning(open_pitches.len()))?;
        if let Some(bad) = open_pitches.iter().find(|p| !(0..=MAX_OPEN_PITCH).contains(*p)) {
            return Err(FingeringError::TuningOutOfRange {
                field: "open_pitches",
                detail: format!("{bad} is outside 0..={MAX_OPEN_PITCH}"),
            });
        }
        if !(-MAX_TRANSPOSE..=MAX_TRANSPOSE).contains(&transpose) {
            return Err(FingeringError::TuningOutOfRange {
                field: "transpose",
                detail: format!("{transpose} is outside -{MAX_TRANSPOSE}..={MAX_TRANSPOSE}"),
            });
        }
        Ok(Tuning {
            name: name.into(),
            open_pitches,
            transpose,
        })
    }

    /// The common "G A c d e g a" tuning as MIDI G3 A3 C4 D4 E4 G4 A4.
    pub fn demo() -> Self {
        Tuning {
            name: "demo_g_a_c_d_e_g_a".to_string(),
            open_pitches: [55, 57, 60, 62, 64, 67, 69],
            transpose: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn transpose(&self) -> i32 {
        self.transpose
    }

    /// Untransposed open-string pitches, string 1 first.
    pub fn base_pitches(&self) -> &[i32; STRING_COUNT] {
        &self.open_pitches
    }

    /// Same tuning with a different transpose.
    pub fn with_transpose(&self, transpose: i32) -> Self {
        Tuning {
            transpose,
            ..self.clone()
        }
    }

    /// Sounding pitch of an open string: base pitch plus transpose.
    pub fn open_pitch(&self, string: u8) -> Result<i32> {
        if !(1..=STRING_COUNT as u8).contains(&string) {
            return Err(FingeringError::StringOutOfRange(string as i64));
        }
        let base = self.open_pitches[(string - 1) as usize];
        base.checked_add(self.transpose).ok_or_else(|| FingeringError::TuningOutOfRange {
            field: "transpose",
            detail: format!("{base} + {} overflows", self.transpose),
        })
    }

    /// String numbers in order, 1..=7.
    pub fn strings() -> impl Iterator<Item = u8> {
        1..=STRING_COUNT as u8
    }
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning::demo()
    }
}
