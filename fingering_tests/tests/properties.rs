// Property tests over random tunings, targets and short passages.
//
// Enumeration is checked against the closed-form position and harmonic
// rules, chord building against the one-note-per-string rule, and the
// search against the brute-force reference in `fingering_tests`.

use fingering_tests::{brute_force_costs, chord_event, search_input};
use guqin_fingering::chord::{ChordLimits, ChordSide, build_chord_candidates};
use guqin_fingering::model::{Technique, gcd};
use guqin_fingering::pipeline::{PassageEvent, Target};
use guqin_fingering::position::{PositionOptions, enumerate, pos_ratio_for_semitones};
use guqin_fingering::tuning::Tuning;
use guqin_fingering::{FingeringConfig, FingeringError, recommend};
use proptest::prelude::*;

fn arb_tuning() -> impl Strategy<Value = Tuning> {
    (prop::array::uniform7(36i32..=72), -12i32..=12)
        .prop_map(|(pitches, transpose)| Tuning::new("random", &pitches, transpose).unwrap())
}

fn arb_options() -> impl Strategy<Value = PositionOptions> {
    (0i32..=60, any::<bool>(), 2u32..=16, 0.0f64..=100.0).prop_map(
        |(max_semitones, include_harmonics, max_harmonic_order, harmonic_tolerance_cents)| {
            PositionOptions {
                max_semitones,
                include_harmonics,
                max_harmonic_order,
                harmonic_tolerance_cents,
                ..PositionOptions::default()
            }
        },
    )
}

/// Pitches the demo tuning reaches without harmonics.
fn arb_pitch() -> impl Strategy<Value = i32> {
    55i32..=90
}

/// Chord pitches, each reachable on at least three strings, so some
/// pairing always avoids a shared string.
fn arb_chord_pitch() -> impl Strategy<Value = i32> {
    60i32..=90
}

fn arb_event(index: usize) -> impl Strategy<Value = PassageEvent> {
    let id = format!("e{}", index + 1);
    let single_id = id.clone();
    prop_oneof![
        3 => arb_pitch().prop_map(move |p| PassageEvent {
            id: single_id.clone(),
            targets: vec![Target::single(p)],
        }),
        1 => (arb_chord_pitch(), arb_chord_pitch())
            .prop_map(move |(a, b)| chord_event(&id, ("L", a), ("R", b))),
    ]
}

fn arb_passage() -> impl Strategy<Value = Vec<PassageEvent>> {
    (1usize..=3).prop_flat_map(|len| (0..len).map(arb_event).collect::<Vec<_>>())
}

fn arb_config() -> impl Strategy<Value = FingeringConfig> {
    (1usize..=6, any::<bool>()).prop_map(|(k, harmonics)| {
        let mut config = FingeringConfig {
            k,
            ..FingeringConfig::default()
        };
        config.position.include_harmonics = harmonics;
        config
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn enumerated_candidates_follow_the_position_rules(
        tuning in arb_tuning(),
        options in arb_options(),
        target in 20i32..=120,
    ) {
        let cands = enumerate(target, &tuning, &options).unwrap();
        for c in &cands {
            let open = tuning.open_pitch(c.string).unwrap();
            prop_assert_eq!(c.pitch, target);
            prop_assert_eq!(c.semitones_from_open, target - open);
            match c.technique {
                Technique::Open => {
                    prop_assert_eq!(c.semitones_from_open, 0);
                    prop_assert_eq!(c.pos_ratio, 0.0);
                }
                Technique::Press => {
                    let d = c.semitones_from_open;
                    prop_assert!(d >= 1 && d <= options.max_semitones);
                    prop_assert!((c.pos_ratio - pos_ratio_for_semitones(d)).abs() < 1e-12);
                    prop_assert!((c.pos_ratio - (1.0 - 2f64.powf(-d as f64 / 12.0))).abs() < 1e-12);
                }
                Technique::Harmonic => {
                    prop_assert!(options.include_harmonics);
                    let node = c.harmonic.unwrap();
                    prop_assert!(node.n >= 2 && node.n <= options.max_harmonic_order);
                    prop_assert!(node.k >= 1 && node.k < node.n);
                    prop_assert_eq!(gcd(node.k, node.n), 1);
                    prop_assert!((c.pos_ratio - node.k as f64 / node.n as f64).abs() < 1e-12);
                    let octaves = (node.n as f64).log2();
                    let expected = (c.semitones_from_open as f64 - 12.0 * octaves) * 100.0;
                    prop_assert!((c.cents_error - expected).abs() < 1e-9);
                    prop_assert!(c.cents_error.abs() <= options.harmonic_tolerance_cents);
                }
            }
        }

        let has_open = cands.iter().any(|c| c.technique == Technique::Open);
        let open_matches = Tuning::strings().any(|s| tuning.open_pitch(s).unwrap() == target);
        prop_assert_eq!(has_open, open_matches);
    }

    #[test]
    fn enumeration_is_complete_for_stopped_notes(
        tuning in arb_tuning(),
        options in arb_options(),
        target in 20i32..=120,
    ) {
        let cands = enumerate(target, &tuning, &options).unwrap();
        for s in Tuning::strings() {
            let d = target - tuning.open_pitch(s).unwrap();
            let expected = if d == 0 {
                Some(Technique::Open)
            } else if d >= 1 && d <= options.max_semitones {
                Some(Technique::Press)
            } else {
                None
            };
            let found = cands
                .iter()
                .find(|c| c.string == s && c.technique != Technique::Harmonic)
                .map(|c| c.technique);
            prop_assert_eq!(found, expected, "string {}", s);
        }
    }

    #[test]
    fn chord_pairs_never_share_a_string(
        a in 40i32..=100,
        b in 40i32..=100,
        harmonics in any::<bool>(),
        max_pairs in 1usize..=60,
    ) {
        let mut options = PositionOptions::default();
        options.include_harmonics = harmonics;
        let tuning = Tuning::demo();
        let ca = enumerate(a, &tuning, &options).unwrap();
        let cb = enumerate(b, &tuning, &options).unwrap();
        let sides = [
            ChordSide {
                slot: "L",
                pitch: a,
                candidates: &ca,
            },
            ChordSide {
                slot: "R",
                pitch: b,
                candidates: &cb,
            },
        ];
        let limits = ChordLimits {
            per_slot: 25,
            max_pairs,
        };
        match build_chord_candidates("c1", &sides, &[], &limits) {
            Ok(pairs) => {
                prop_assert!(!pairs.is_empty());
                prop_assert!(pairs.len() <= max_pairs);
                for p in &pairs {
                    prop_assert_ne!(p.slots[0].candidate.string, p.slots[1].candidate.string);
                    prop_assert_eq!(p.slots[0].slot.as_str(), "L");
                    prop_assert_eq!(p.slots[0].candidate.pitch, a);
                    prop_assert_eq!(p.slots[1].candidate.pitch, b);
                }
            }
            Err(FingeringError::ProductCapExceeded { .. })
            | Err(FingeringError::ChordStringsCollide { .. })
            | Err(FingeringError::SlotConstraintExhausted { .. }) => {}
            Err(other) => prop_assert!(false, "unexpected error {:?}", other),
        }
    }

    #[test]
    fn search_matches_brute_force(events in arb_passage(), config in arb_config()) {
        let prepared = search_input(&events, &[], &config).unwrap();
        let all = brute_force_costs(&prepared, &config.weights);
        let sols = recommend(&events, &[], &config).unwrap();
        prop_assert_eq!(sols.len(), config.k.min(all.len()));
        prop_assert!(sols.windows(2).all(|w| w[0].total_cost <= w[1].total_cost));
        for (sol, expected) in sols.iter().zip(&all) {
            prop_assert!((sol.total_cost - expected).abs() < 1e-9,
                "search {} vs brute force {}", sol.total_cost, expected);
            prop_assert_eq!(sol.assignments.len(), events.len());
        }
    }

    #[test]
    fn recommendations_are_deterministic(events in arb_passage(), config in arb_config()) {
        let first = serde_json::to_string(&recommend(&events, &[], &config).unwrap()).unwrap();
        let second = serde_json::to_string(&recommend(&events, &[], &config).unwrap()).unwrap();
        prop_assert_eq!(first, second);
    }
}
