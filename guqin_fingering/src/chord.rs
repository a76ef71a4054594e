// Chord candidate builder: joint fingerings for two-note events.
//
// A two-note event has two slots (labels such as "L"/"R" or "1"/"2"), each
// with its own single-note candidate pool from position.rs. The builder:
//
// 1. rejects anything but exactly two distinct, non-empty slots;
// 2. routes each lock addressed to the event to the slot it names and
//    filters that slot's pool (locks without a slot, or naming a slot the
//    event lacks, fail);
// 3. prunes each pool to the best `per_slot` candidates, ranked by absolute
//    intonation error and then non-harmonic before harmonic (stable, so
//    enumeration order breaks the remaining ties);
// 4. takes the cross product, dropping pairs that put both notes on one
//    string, and fails rather than truncating if the surviving pairs exceed
//    `max_pairs`.
//
// Locks are applied before pruning so a lock can reach any enumerated
// candidate, not only the top `per_slot`.
//
// Consumed by pipeline.rs, which hands the result to search.rs.

use crate::error::{FingeringError, Result};
use crate::lock::{Lock, locks_for};
use crate::model::{Candidate, ChordCandidate, SlotChoice};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bounds on chord candidate generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChordLimits {
    /// Candidates kept per slot before the cross product.
    pub per_slot: usize,
    /// Hard cap on surviving pairs; exceeding it is an error.
    pub max_pairs: usize,
}

impl Default for ChordLimits {
    fn default() -> Self {
        ChordLimits {
            per_slot: 25,
            max_pairs: 1200,
        }
    }
}

impl ChordLimits {
    /// Both caps must be at least 1.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("chord.per_slot", self.per_slot),
            ("chord.max_pairs", self.max_pairs),
        ] {
            if value == 0 {
                return Err(FingeringError::InvalidOption {
                    name,
                    detail: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// One slot's input: its label, target pitch, and candidate pool.
#[derive(Debug, Clone, Copy)]
pub struct ChordSide<'a> {
    pub slot: &'a str,
    pub pitch: i32,
    pub candidates: &'a [Candidate],
}

/// Build the joint candidates for a two-note event.
pub fn build_chord_candidates(
    event_id: &str,
    sides: &[ChordSide<'_>],
    locks: &[Lock],
    limits: &ChordLimits,
) -> Result<Vec<ChordCandidate>> {
    limits.validate()?;
    let [a, b] = sides else {
        return Err(FingeringError::UnsupportedArity {
            event_id: event_id.to_string(),
            targets: sides.len(),
        });
    };
    check_slots(event_id, a.slot, b.slot)?;

    let mut pool_a: Vec<&Candidate> = a.candidates.iter().collect();
    let mut pool_b: Vec<&Candidate> = b.candidates.iter().collect();

    for lock in locks_for(locks, event_id) {
        let pool = match lock.slot.as_deref() {
            None => {
                return Err(FingeringError::LockMissingSlot {
                    event_id: event_id.to_string(),
                });
            }
            Some(slot) if slot == a.slot => &mut pool_a,
            Some(slot) if slot == b.slot => &mut pool_b,
            Some(slot) => {
                return Err(FingeringError::LockUnknownSlot {
                    event_id: event_id.to_string(),
                    slot: slot.to_string(),
                });
            }
        };
        pool.retain(|c| lock.admits(c));
    }

    for (side, pool) in [(a, &mut pool_a), (b, &mut pool_b)] {
        if pool.is_empty() {
            return Err(FingeringError::SlotConstraintExhausted {
                event_id: event_id.to_string(),
                slot: side.slot.to_string(),
            });
        }
        prune(pool, limits.per_slot);
    }

    let mut out = Vec::new();
    for ca in &pool_a {
        for cb in &pool_b {
            let pair = ChordCandidate::pair(
                SlotChoice {
                    slot: a.slot.to_string(),
                    candidate: (*ca).clone(),
                },
                SlotChoice {
                    slot: b.slot.to_string(),
                    candidate: (*cb).clone(),
                },
            );
            let Some(pair) = pair else { continue };
            if out.len() == limits.max_pairs {
                return Err(FingeringError::ProductCapExceeded {
                    event_id: event_id.to_string(),
                    cap: limits.max_pairs,
                });
            }
            out.push(pair);
        }
    }

    if out.is_empty() {
        return Err(FingeringError::ChordStringsCollide {
            event_id: event_id.to_string(),
        });
    }
    debug!(
        event_id,
        slot_a = a.slot,
        pitch_a = a.pitch,
        slot_b = b.slot,
        pitch_b = b.pitch,
        pool_a = pool_a.len(),
        pool_b = pool_b.len(),
        pairs = out.len(),
        "built chord candidates"
    );
    Ok(out)
}

/// Two distinct, non-empty slot labels.
pub(crate) fn check_slots(event_id: &str, a: &str, b: &str) -> Result<()> {
    let detail = if a.is_empty() || b.is_empty() {
        "chord slots must be non-empty"
    } else if a == b {
        "chord slots must be distinct"
    } else {
        return Ok(());
    };
    Err(FingeringError::InvalidSlots {
        event_id: event_id.to_string(),
        detail: format!("{detail} (got {a:?}, {b:?})"),
    })
}

/// Keep the best `keep` candidates: smallest |cents error| first, then
/// non-harmonic before harmonic. Stable, so ties keep enumeration order.
fn prune(pool: &mut Vec<&Candidate>, keep: usize) {
    pool.sort_by(|x, y| {
        x.cents_error
            .abs()
            .total_cmp(&y.cents_error.abs())
            .then(x.is_harmonic().cmp(&y.is_harmonic()))
    });
    pool.truncate(keep);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Fingering, Technique};
    use crate::position::{PositionOptions, enumerate};
    use crate::tuning::Tuning;

    fn pool(pitch: i32, opts: &PositionOptions) -> Vec<Candidate> {
        enumerate(pitch, &Tuning::demo(), opts).unwrap()
    }

    #[test]
    fn test_builds_pairs_on_distinct_strings() {
        let opts = PositionOptions::default();
        let low = pool(60, &opts); // strings 1, 2, 3
        let high = pool(64, &opts); // strings 1..5
        let sides = [
            ChordSide {
                slot: "L",
                pitch: 60,
                candidates: &low,
            },
            ChordSide {
                slot: "R",
                pitch: 64,
                candidates: &high,
            },
        ];
        let chords = build_chord_candidates("e1", &sides, &[], &ChordLimits::default()).unwrap();

        // 3 x 5 pairs minus the three shared strings.
        assert_eq!(chords.len(), 12);
        for c in &chords {
            assert_ne!(c.slots[0].candidate.string, c.slots[1].candidate.string);
            assert_eq!(c.slots[0].slot, "L");
            assert_eq!(c.slots[1].slot, "R");
            assert_eq!(c.strings().len(), 2);
        }
    }

    #[test]
    fn test_rejects_three_targets() {
        let cands = pool(60, &PositionOptions::default());
        let side = ChordSide {
            slot: "1",
            pitch: 60,
            candidates: &cands,
        };
        let sides = [
            side,
            ChordSide { slot: "2", ..side },
            ChordSide { slot: "3", ..side },
        ];
        let err = build_chord_candidates("e9", &sides, &[], &ChordLimits::default()).unwrap_err();
        assert!(matches!(err, FingeringError::UnsupportedArity { targets: 3, .. }));
    }

    #[test]
    fn test_rejects_bad_slot_labels() {
        let cands = pool(60, &PositionOptions::default());
        let side = ChordSide {
            slot: "L",
            pitch: 60,
            candidates: &cands,
        };
        let err =
            build_chord_candidates("e", &[side, side], &[], &ChordLimits::default()).unwrap_err();
        assert!(matches!(err, FingeringError::InvalidSlots { .. }));
        let empty = ChordSide { slot: "", ..side };
        let err =
            build_chord_candidates("e", &[side, empty], &[], &ChordLimits::default()).unwrap_err();
        assert!(matches!(err, FingeringError::InvalidSlots { .. }));
    }

    #[test]
    fn test_lock_applies_to_named_slot_only() {
        let opts = PositionOptions::default();
        let low = pool(60, &opts);
        let high = pool(64, &opts);
        let sides = [
            ChordSide {
                slot: "L",
                pitch: 60,
                candidates: &low,
            },
            ChordSide {
                slot: "R",
                pitch: 64,
                candidates: &high,
            },
        ];
        let locks = [Lock::new("e1").with_slot("L").with_technique(Technique::Open)];
        let chords = build_chord_candidates("e1", &sides, &locks, &ChordLimits::default()).unwrap();
        assert!(chords.iter().all(|c| c.slots[0].candidate.technique == Technique::Open));
        // L is pinned to string 3, R may use 1, 2, 4, 5.
        assert_eq!(chords.len(), 4);

        // Locks on other events are ignored.
        let other = [Lock::new("e2").with_slot("L").with_string(7)];
        assert_eq!(
            build_chord_candidates("e1", &sides, &other, &ChordLimits::default())
                .unwrap()
                .len(),
            12
        );
    }

    #[test]
    fn test_lock_addressing_errors() {
        let cands = pool(60, &PositionOptions::default());
        let sides = [
            ChordSide {
                slot: "L",
                pitch: 60,
                candidates: &cands,
            },
            ChordSide {
                slot: "R",
                pitch: 60,
                candidates: &cands,
            },
        ];
        let limits = ChordLimits::default();

        let no_slot = [Lock::new("e").with_string(1)];
        assert!(matches!(
            build_chord_candidates("e", &sides, &no_slot, &limits),
            Err(FingeringError::LockMissingSlot { .. })
        ));

        let wrong_slot = [Lock::new("e").with_slot("X").with_string(1)];
        assert!(matches!(
            build_chord_candidates("e", &sides, &wrong_slot, &limits),
            Err(FingeringError::LockUnknownSlot { ref slot, .. }) if slot == "X"
        ));

        let exhausting = [Lock::new("e").with_slot("R").with_string(7)];
        assert!(matches!(
            build_chord_candidates("e", &sides, &exhausting, &limits),
            Err(FingeringError::SlotConstraintExhausted { ref slot, .. }) if slot == "R"
        ));
    }

    #[test]
    fn test_same_string_only_fails() {
        let opts = PositionOptions::default();
        let cands = pool(60, &opts);
        let sides = [
            ChordSide {
                slot: "1",
                pitch: 60,
                candidates: &cands,
            },
            ChordSide {
                slot: "2",
                pitch: 60,
                candidates: &cands,
            },
        ];
        let locks = [
            Lock::new("e").with_slot("1").with_string(3),
            Lock::new("e").with_slot("2").with_string(3),
        ];
        assert!(matches!(
            build_chord_candidates("e", &sides, &locks, &ChordLimits::default()),
            Err(FingeringError::ChordStringsCollide { .. })
        ));
    }

    #[test]
    fn test_product_cap_fails_instead_of_truncating() {
        let opts = PositionOptions::default();
        let low = pool(60, &opts);
        let high = pool(64, &opts);
        let sides = [
            ChordSide {
                slot: "L",
                pitch: 60,
                candidates: &low,
            },
            ChordSide {
                slot: "R",
                pitch: 64,
                candidates: &high,
            },
        ];
        let tight = ChordLimits {
            per_slot: 25,
            max_pairs: 11,
        };
        assert!(matches!(
            build_chord_candidates("e", &sides, &[], &tight),
            Err(FingeringError::ProductCapExceeded { cap: 11, .. })
        ));
        let exact = ChordLimits {
            per_slot: 25,
            max_pairs: 12,
        };
        assert_eq!(build_chord_candidates("e", &sides, &[], &exact).unwrap().len(), 12);
    }

    #[test]
    fn test_zero_limits_are_rejected() {
        let opts = PositionOptions::default();
        let low = pool(60, &opts);
        let high = pool(64, &opts);
        let sides = [
            ChordSide {
                slot: "L",
                pitch: 60,
                candidates: &low,
            },
            ChordSide {
                slot: "R",
                pitch: 64,
                candidates: &high,
            },
        ];
        let no_pool = ChordLimits {
            per_slot: 0,
            max_pairs: 1200,
        };
        let err = build_chord_candidates("e", &sides, &[], &no_pool).unwrap_err();
        assert!(
            matches!(err, FingeringError::InvalidOption { name: "chord.per_slot", .. }),
            "got {err:?}"
        );
        let no_pairs = ChordLimits {
            per_slot: 25,
            max_pairs: 0,
        };
        let err = build_chord_candidates("e", &sides, &[], &no_pairs).unwrap_err();
        assert!(
            matches!(err, FingeringError::InvalidOption { name: "chord.max_pairs", .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn test_prune_prefers_accurate_and_non_harmonic() {
        // 67 with harmonics: press on 1..5, open on 6, exact octave harmonic
        // on 1. Keeping two leaves the first two exact non-harmonics.
        let opts = PositionOptions::default().with_harmonics();
        let mut cands: Vec<&Candidate> = Vec::new();
        let all = pool(67, &opts);
        cands.extend(all.iter().rev());
        prune(&mut cands, 2);
        assert!(cands.iter().all(|c| !c.is_harmonic()));
        // Stable: reversed enumeration order survives among exact ties.
        assert_eq!(cands[0].string, 6);
        assert_eq!(cands[1].string, 5);
    }

    #[test]
    fn test_prune_ranks_by_cents_error() {
        let opts = PositionOptions::default().with_harmonics();
        let all = pool(83, &opts);
        let mut harmonics: Vec<&Candidate> = all.iter().filter(|c| c.is_harmonic()).collect();
        prune(&mut harmonics, 1);
        // String 5's third partial (-1.96 cents) beats string 1's fifth (+13.7).
        assert_eq!(harmonics[0].string, 5);
    }
}
