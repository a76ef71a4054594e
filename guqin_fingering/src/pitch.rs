// Spelled pitches (step, alteration, octave) and their MIDI numbers.
//
// The notation layer spells notes the way engraving formats do. Stage 1
// needs absolute MIDI numbers, so this is the one conversion point. Middle C
// is C4 = 60. Out-of-range parts fail instead of wrapping.

use crate::error::{FingeringError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A note spelled as step letter, alteration in semitones, and octave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpelledPitch {
    /// `A`..=`G`; lowercase is accepted.
    pub step: char,
    /// -2..=2 (double flat to double sharp).
    #[serde(default)]
    pub alter: i32,
    /// -1..=9.
    pub octave: i32,
}

fn step_semitone(step: char) -> Option<i32> {
    Some(match step.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    })
}

impl SpelledPitch {
    pub fn new(step: char, alter: i32, octave: i32) -> Self {
        SpelledPitch { step, alter, octave }
    }

    /// MIDI note number, `(octave + 1) * 12 + pitch class + alter`.
    pub fn to_midi(self) -> Result<i32> {
        let pc = step_semitone(self.step)
            .ok_or_else(|| FingeringError::InvalidPitch(format!("unknown step {:?}", self.step)))?;
        if !(-2..=2).contains(&self.alter) {
            return Err(FingeringError::InvalidPitch(format!(
                "alter {} is outside -2..=2",
                self.alter
            )));
        }
        if !(-1..=9).contains(&self.octave) {
            return Err(FingeringError::InvalidPitch(format!(
                "octave {} is outside -1..=9",
                self.octave
            )));
        }
        Ok((self.octave + 1) * 12 + pc + self.alter)
    }
}

impl FromStr for SpelledPitch {
    type Err = FingeringError;

    /// Compact names: `C4`, `F#3`, `Bb2`, `Ebb5`, `C-1`.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || FingeringError::InvalidPitch(format!("cannot parse {s:?}"));
        let mut chars = s.trim().chars();
        let step = chars.next().ok_or_else(bad)?;
        step_semitone(step).ok_or_else(bad)?;

        let rest = chars.as_str();
        let accidentals = rest.len() - rest.trim_start_matches(['#', 'b']).len();
        let (acc, octave) = rest.split_at(accidentals);
        let alter = acc.chars().map(|c| if c == '#' { 1 } else { -1 }).sum();
        let octave = octave.parse::<i32>().map_err(|_| bad())?;

        let pitch = SpelledPitch::new(step.to_ascii_uppercase(), alter, octave);
        pitch.to_midi()?;
        Ok(pitch)
    }
}

impl fmt::Display for SpelledPitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let acc = if self.alter >= 0 { "#" } else { "b" };
        write!(
            f,
            "{}{}{}",
            self.step.to_ascii_uppercase(),
            acc.repeat(self.alter.unsigned_abs() as usize),
            self.octave
        )
    }
}
