// Sounding pitch: what a fingering actually plays.
//
// The inverse of the position engine. Given a string, a technique and its
// position data (either a `Candidate` or the written profile fields of an
// event), compute the MIDI pitch that sounds:
//
// - open: the string's open pitch (with transpose);
// - pressed: open + (-12 * log2(1 - pos)), rounded to the nearest semitone;
// - harmonic: open + 12 * log2(n), rounded, keeping the deviation of the
//   rounded pitch from the exact partial in cents.
//
// Used to check that a committed fingering still sounds the score's pitch.
// Missing or malformed fields fail with `FieldShape`; nothing is guessed.

use crate::error::{FingeringError, Result};
use crate::model::{Candidate, Technique};
use crate::tuning::Tuning;
use crate::writeback::{Fields, parse_sound};
use serde::Serialize;

/// How a sounding pitch was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SoundingMethod {
    OpenString,
    PressedPosRatio,
    NaturalHarmonic,
}

/// Pitch sounded by one string of a fingering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SoundingPitch {
    /// `None` for single-note fingerings, else the slot label.
    pub slot: Option<String>,
    /// Nearest MIDI note.
    pub midi: i32,
    /// Exact (fractional) MIDI pitch before rounding.
    pub midi_exact: f64,
    pub method: SoundingMethod,
    /// Rounded minus exact, in cents; harmonics only.
    pub cents_deviation: Option<f64>,
}

fn field_err(field: impl Into<String>, detail: impl Into<String>) -> FingeringError {
    FingeringError::FieldShape {
        field: field.into(),
        detail: detail.into(),
    }
}

pub fn sound_open(slot: Option<&str>, string: u8, tuning: &Tuning) -> Result<SoundingPitch> {
    let open = tuning.open_pitch(string)?;
    Ok(SoundingPitch {
        slot: slot.map(str::to_string),
        midi: open,
        midi_exact: open as f64,
        method: SoundingMethod::OpenString,
        cents_deviation: None,
    })
}

pub fn sound_pressed(
    slot: Option<&str>,
    string: u8,
    pos_ratio: f64,
    tuning: &Tuning,
) -> Result<SoundingPitch> {
    if !(0.0..1.0).contains(&pos_ratio) {
        return Err(field_err(
            "pos_ratio",
            format!("{pos_ratio} is outside [0, 1)"),
        ));
    }
    let open = tuning.open_pitch(string)?;
    let d = if pos_ratio == 0.0 {
        0.0
    } else {
        -12.0 * (1.0 - pos_ratio).log2()
    };
    let exact = open as f64 + d;
    Ok(SoundingPitch {
        slot: slot.map(str::to_string),
        midi: exact.round() as i32,
        midi_exact: exact,
        method: SoundingMethod::PressedPosRatio,
        cents_deviation: None,
    })
}

pub fn sound_harmonic(
    slot: Option<&str>,
    string: u8,
    harmonic_n: u32,
    tuning: &Tuning,
) -> Result<SoundingPitch> {
    if harmonic_n < 2 {
        return Err(field_err("harmonic_n", format!("{harmonic_n} is below 2")));
    }
    let open = tuning.open_pitch(string)?;
    let exact = open as f64 + 12.0 * (harmonic_n as f64).log2();
    let midi = exact.round() as i32;
    Ok(SoundingPitch {
        slot: slot.map(str::to_string),
        midi,
        midi_exact: exact,
        method: SoundingMethod::NaturalHarmonic,
        cents_deviation: Some((midi as f64 - exact) * 100.0),
    })
}

/// The pitch a candidate sounds under `tuning`.
pub fn sounding_pitch(candidate: &Candidate, tuning: &Tuning) -> Result<SoundingPitch> {
    match candidate.technique {
        Technique::Open => sound_open(None, candidate.string, tuning),
        Technique::Press => sound_pressed(None, candidate.string, candidate.pos_ratio, tuning),
        Technique::Harmonic => {
            let node = candidate
                .harmonic
                .ok_or_else(|| field_err("harmonic_n", "harmonic candidate without a node"))?;
            sound_harmonic(None, candidate.string, node.n, tuning)
        }
    }
}

fn require<'a>(fields: &'a Fields, key: &str) -> Result<&'a str> {
    fields
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| field_err(key, "missing"))
}

fn parse_string(key: &str, value: &str) -> Result<u8> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|s| (1..=7).contains(s))
        .ok_or_else(|| field_err(key, format!("expected a string number 1..=7, got {value:?}")))
}

fn parse_f64(fields: &Fields, key: &str) -> Result<f64> {
    let raw = require(fields, key)?;
    raw.trim()
        .parse::<f64>()
        .map_err(|_| field_err(key, format!("not a number: {raw:?}")))
}

fn parse_u32(fields: &Fields, key: &str) -> Result<u32> {
    let raw = require(fields, key)?;
    raw.trim()
        .parse::<u32>()
        .map_err(|_| field_err(key, format!("not a non-negative integer: {raw:?}")))
}

fn sound_of(fields: &Fields, key: &str) -> Result<Technique> {
    let raw = require(fields, key)?;
    parse_sound(raw).ok_or_else(|| field_err(key, format!("unknown sound {raw:?}")))
}

/// One string's pitch from prefixed fields (`""`, `"l_"` or `"r_"`).
fn derive_prefixed(
    fields: &Fields,
    prefix: &str,
    slot: Option<&str>,
    string: u8,
    tuning: &Tuning,
) -> Result<SoundingPitch> {
    match sound_of(fields, &format!("{prefix}sound"))? {
        Technique::Open => sound_open(slot, string, tuning),
        Technique::Press => {
            let pos = parse_f64(fields, &format!("{prefix}pos_ratio"))?;
            sound_pressed(slot, string, pos, tuning)
        }
        Technique::Harmonic => {
            let n = parse_u32(fields, &format!("{prefix}harmonic_n"))?;
            sound_harmonic(slot, string, n, tuning)
        }
    }
}

/// Pitches an event's written fields sound: one for a single-string simple
/// event, two (slots `1`, `2`) for a two-string simple event, two (slots
/// `L`, `R`) for a complex event.
pub fn derive_from_fields(fields: &Fields, tuning: &Tuning) -> Result<Vec<SoundingPitch>> {
    match require(fields, "form")? {
        "simple" => {
            let xian = require(fields, "xian")?;
            let strings = xian
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| parse_string("xian", s))
                .collect::<Result<Vec<u8>>>()?;
            match strings.as_slice() {
                [] => Err(field_err("xian", "no strings listed")),
                [string] => Ok(vec![derive_prefixed(fields, "", None, *string, tuning)?]),
                [s1, s2] => {
                    let sound = sound_of(fields, "sound")?;
                    let mut out = Vec::with_capacity(2);
                    for (slot, string) in [("1", *s1), ("2", *s2)] {
                        out.push(match sound {
                            Technique::Open => sound_open(Some(slot), string, tuning)?,
                            Technique::Press => {
                                let pos = parse_f64(fields, &format!("pos_ratio_{slot}"))?;
                                sound_pressed(Some(slot), string, pos, tuning)?
                            }
                            Technique::Harmonic => {
                                let n = parse_u32(fields, "harmonic_n")?;
                                sound_harmonic(Some(slot), string, n, tuning)?
                            }
                        });
                    }
                    Ok(out)
                }
                more => Err(field_err(
                    "xian",
                    format!("{} strings listed; at most 2 are supported", more.len()),
                )),
            }
        }
        "complex" => {
            let l = parse_string("l_xian", require(fields, "l_xian")?)?;
            let r = parse_string("r_xian", require(fields, "r_xian")?)?;
            Ok(vec![
                derive_prefixed(fields, "l_", Some("L"), l, tuning)?,
                derive_prefixed(fields, "r_", Some("R"), r, tuning)?,
            ])
        }
        other => Err(field_err(
            "form",
            format!("expected simple or complex, got {other:?}"),
        )),
    }
}
