// Traditional position coordinates ("hui") for display.
//
// Guqin players locate stopped positions relative to the thirteen hui
// (inlaid markers) along the soundboard, with fractional values between
// them. This module maps a stopped distance, or a continuous position
// ratio, onto that coordinate so a UI can print something players read.
//
// The coordinate is informational only. The position ratio on each
// candidate is the source of truth; nothing here feeds candidate validity
// or search cost. The two tables (equal and just temperament) hold the
// customary readings for d = 0..=36 semitones above the open string.

use crate::position::pos_ratio_for_semitones;
use serde::{Deserialize, Serialize};

/// Which reference table to read display coordinates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temperament {
    /// Twelve-tone equal temperament readings.
    #[default]
    Equal,
    /// Just-intonation readings (differs from Equal at a handful of points).
    Just,
}

/// Hui readings for d = 0..=36 semitones, equal temperament.
const HUI_EQUAL: [f64; 37] = [
    0.0, 13.6, 13.1, 12.2, 10.9, 10.0, 9.5, 9.0, 8.4, 7.9, 7.6, 7.3, 7.0, 6.7, 6.5, 6.2, 6.0, 5.6,
    5.3, 5.0, 4.8, 4.6, 4.4, 4.2, 4.0, 3.7, 3.5, 3.2, 3.0, 2.6, 2.3, 2.0, 1.8, 1.6, 1.4, 1.2, 1.0,
];

/// Hui readings for d = 0..=36 semitones, just intonation.
const HUI_JUST: [f64; 37] = [
    0.0, 13.6, 13.1, 12.2, 11.0, 10.0, 9.5, 9.0, 8.5, 8.0, 7.7, 7.3, 7.0, 6.7, 6.4, 6.2, 6.0, 5.6,
    5.3, 5.0, 4.8, 4.6, 4.4, 4.2, 4.0, 3.7, 3.4, 3.2, 3.0, 2.6, 2.3, 2.0, 1.8, 1.6, 1.4, 1.2, 1.0,
];

impl Temperament {
    fn table(self) -> &'static [f64; 37] {
        match self {
            Temperament::Equal => &HUI_EQUAL,
            Temperament::Just => &HUI_JUST,
        }
    }
}

/// Table reading for a stopped note `d` semitones above the open string.
/// `None` for open strings and for distances beyond the table.
pub fn hui_for_semitones(d: i32, temperament: Temperament) -> Option<f64> {
    let table = temperament.table();
    if d <= 0 || d as usize >= table.len() {
        return None;
    }
    Some(table[d as usize])
}

/// Interpolated reading for an arbitrary position ratio in (0, 1).
///
/// Interpolates linearly between the stopped-note table points (d = 1..=36
/// placed at their equal-tempered position ratios) and clamps outside the
/// first and last point.
pub fn hui_from_pos_ratio(pos_ratio: f64, temperament: Temperament) -> Option<f64> {
    if pos_ratio.is_nan() || pos_ratio <= 0.0 || pos_ratio >= 1.0 {
        return None;
    }
    let table = temperament.table();
    // Position ratio is strictly increasing in d, so the points are sorted.
    let points: Vec<(f64, f64)> = (1..table.len())
        .map(|d| (pos_ratio_for_semitones(d as i32), table[d]))
        .collect();

    let (first, last) = (points[0], points[points.len() - 1]);
    if pos_ratio <= first.0 {
        return Some(first.1);
    }
    if pos_ratio >= last.0 {
        return Some(last.1);
    }
    points.windows(2).find_map(|w| {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        (x0..=x1).contains(&pos_ratio).then(|| y0 + (pos_ratio - x0) / (x1 - x0) * (y1 - y0))
    })
}
