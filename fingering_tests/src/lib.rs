// Test-only helpers for the fingering integration tests.
//
// Builds passages from plain pitch lists, runs stage 1 + chord building the
// same way `recommend` does, and provides a brute-force reference search
// that scores every end-to-end path of a small passage. The DP in
// `guqin_fingering::search` must agree with it on the cheapest costs.
//
// Also applies planned write-back edits to an in-memory field store, so a
// committed solution can be read back through the sounding-pitch module.
//
// See also: `tests/full_pipeline.rs` (end-to-end scenarios) and
// `tests/properties.rs` (property tests).

use std::collections::BTreeMap;

use guqin_fingering::cost::{Weights, base_cost, transition_cost};
use guqin_fingering::lock::Lock;
use guqin_fingering::model::Fingering;
use guqin_fingering::pipeline::{PassageEvent, Target, enumerate_passage, prepare_search};
use guqin_fingering::search::{EventChoices, SearchEvent};
use guqin_fingering::writeback::{EditOp, Fields};
use guqin_fingering::{FingeringConfig, Result};

/// Single-note passage with ids `e1`, `e2`, ... in order.
pub fn single_passage(pitches: &[i32]) -> Vec<PassageEvent> {
    pitches
        .iter()
        .enumerate()
        .map(|(i, &pitch)| PassageEvent {
            id: format!("e{}", i + 1),
            targets: vec![Target::single(pitch)],
        })
        .collect()
}

/// Two-note chord event with slots `slot_a`/`slot_b`.
pub fn chord_event(
    id: &str,
    (slot_a, pitch_a): (&str, i32),
    (slot_b, pitch_b): (&str, i32),
) -> PassageEvent {
    PassageEvent {
        id: id.to_string(),
        targets: vec![
            Target::slotted(slot_a, pitch_a),
            Target::slotted(slot_b, pitch_b),
        ],
    }
}

/// Stage 1 and chord building, as `recommend` does them.
pub fn search_input(
    events: &[PassageEvent],
    locks: &[Lock],
    config: &FingeringConfig,
) -> Result<Vec<SearchEvent>> {
    let passage = enumerate_passage(events, &config.tuning, &config.position)?;
    prepare_search(&passage, locks, &config.chord)
}

fn fingerings(event: &SearchEvent) -> Vec<&dyn Fingering> {
    match &event.choices {
        EventChoices::Single(c) => c.iter().map(|c| c as &dyn Fingering).collect(),
        EventChoices::Chord { candidates, .. } => {
            candidates.iter().map(|c| c as &dyn Fingering).collect()
        }
    }
}

/// Cost of every end-to-end path, ascending. Accumulates in passage order,
/// the way the DP does, so equal paths give bit-identical costs.
pub fn brute_force_costs(events: &[SearchEvent], weights: &Weights) -> Vec<f64> {
    let layers: Vec<Vec<&dyn Fingering>> = events.iter().map(fingerings).collect();
    let mut costs = Vec::new();
    let mut stack: Vec<usize> = Vec::with_capacity(layers.len());
    walk(&layers, weights, &mut stack, 0.0, &mut costs);
    costs.sort_by(f64::total_cmp);
    costs
}

fn walk(
    layers: &[Vec<&dyn Fingering>],
    weights: &Weights,
    stack: &mut Vec<usize>,
    cost: f64,
    out: &mut Vec<f64>,
) {
    let depth = stack.len();
    if depth == layers.len() {
        out.push(cost);
        return;
    }
    for (j, &here) in layers[depth].iter().enumerate() {
        let step = match stack.last() {
            None => base_cost(here, weights),
            Some(&prev) => transition_cost(layers[depth - 1][prev], here, weights),
        };
        stack.push(j);
        walk(layers, weights, stack, cost + step.total(), out);
        stack.pop();
    }
}

/// Apply planned edits to a field store keyed by event id.
pub fn apply_edits(store: &mut BTreeMap<String, Fields>, ops: &[EditOp]) {
    for op in ops {
        let fields = store.entry(op.event_id.clone()).or_default();
        for (key, value) in &op.changes {
            match value {
                Some(v) => {
                    fields.insert(key.clone(), v.clone());
                }
                None => {
                    fields.remove(key);
                }
            }
        }
    }
}

/// Empty field store with one entry per event, optionally pre-seeded with
/// a `form` for chord events.
pub fn empty_store(events: &[PassageEvent], chord_form: &str) -> BTreeMap<String, Fields> {
    events
        .iter()
        .map(|e| {
            let mut fields = Fields::new();
            if e.targets.len() == 2 {
                fields.insert("form".to_string(), chord_form.to_string());
            }
            (e.id.clone(), fields)
        })
        .collect()
}
