// Sequence search (stage 2): the K cheapest fingering sequences.
//
// Input is the passage as an ordered list of events, each carrying either a
// single-note candidate set or a two-slot chord candidate set. Locks narrow
// the sets first; then a dynamic program walks the chain of events keeping,
// for every candidate of every event, the K cheapest partial paths that end
// there.
//
// The path store is a flat arena per event layer: `records` holds every
// kept path of the layer, grouped by candidate, and `offsets[j]..offsets[j+1]`
// is candidate j's slice (at most K records, cheapest first). A record's back
// pointer is an index into the previous layer's `records`. Because extensions
// are generated in (previous candidate, previous rank) order, which is also
// ascending record index, a stable sort by cost reproduces the required tie
// break: lower previous candidate first, then lower previous rank. The final
// top-K across the last layer uses the same rule over (candidate, rank).
//
// Costs come from cost.rs through the `Fingering` trait, so this file never
// branches on single versus chord when scoring.
//
// Memory is O(events x candidates x K); callers bound the candidate sets
// through the position options and chord limits.

use crate::chord::check_slots;
use crate::cost::{CostBreakdown, Weights, base_cost, transition_cost};
use crate::error::{FingeringError, Result};
use crate::lock::{Lock, locks_for};
use crate::model::{Candidate, ChordCandidate, Fingering, SlotChoice};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::ops::Range;
use tracing::{debug, info};

/// Candidate set of one event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventChoices {
    /// One target, no slot.
    Single(Vec<Candidate>),
    /// Two targets labelled by `slots`; every candidate must use the same
    /// labels in the same order.
    Chord {
        slots: [String; 2],
        candidates: Vec<ChordCandidate>,
    },
}

/// One event of a passage as the search sees it.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchEvent {
    pub event_id: String,
    pub choices: EventChoices,
}

/// The fingering chosen for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventChoice {
    Single(Candidate),
    /// One choice per slot, in the event's slot order.
    Chord([SlotChoice; 2]),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub event_id: String,
    pub choice: EventChoice,
}

/// One of the K best fingering sequences for a passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    /// `S0001` for the best solution, `S0002` for the next, and so on.
    pub id: String,
    pub total_cost: f64,
    pub breakdown: CostBreakdown,
    /// One assignment per event, in passage order.
    pub assignments: Vec<Assignment>,
}

/// Lock-filtered view of one event's candidates.
enum Pool<'a> {
    Single(Vec<&'a Candidate>),
    Chord(Vec<&'a ChordCandidate>),
}

impl Pool<'_> {
    fn len(&self) -> usize {
        match self {
            Pool::Single(c) => c.len(),
            Pool::Chord(c) => c.len(),
        }
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn fingering(&self, j: usize) -> &dyn Fingering {
        match self {
            Pool::Single(c) => c[j],
            Pool::Chord(c) => c[j],
        }
    }

    fn choice(&self, j: usize) -> EventChoice {
        match self {
            Pool::Single(c) => EventChoice::Single(c[j].clone()),
            Pool::Chord(c) => EventChoice::Chord(c[j].slots.clone()),
        }
    }
}

/// One kept partial path.
#[derive(Debug, Clone, Copy)]
struct PathRecord {
    cost: f64,
    breakdown: CostBreakdown,
    /// Index of the path's final candidate within its event's pool.
    candidate: usize,
    /// Index into the previous layer's records; `None` on the first event.
    back: Option<usize>,
}

/// Kept paths of one event, grouped by candidate.
struct Layer {
    records: Vec<PathRecord>,
    offsets: Vec<usize>,
}

impl Layer {
    fn new() -> Self {
        Layer {
            records: Vec::new(),
            offsets: vec![0],
        }
    }

    fn push_group(&mut self, group: &[PathRecord]) {
        self.records.extend_from_slice(group);
        self.offsets.push(self.records.len());
    }

    fn group(&self, j: usize) -> Range<usize> {
        self.offsets[j]..self.offsets[j + 1]
    }
}

fn by_cost(a: &PathRecord, b: &PathRecord) -> std::cmp::Ordering {
    a.cost.total_cmp(&b.cost)
}

/// The `k` lowest-cost fingering sequences, cheapest first.
///
/// Fewer than `k` come back only when the passage has fewer end-to-end
/// paths than that.
pub fn search(
    events: &[SearchEvent],
    k: usize,
    locks: &[Lock],
    weights: &Weights,
) -> Result<Vec<Solution>> {
    if k == 0 {
        return Err(FingeringError::InvalidK(k));
    }
    weights.validate()?;
    check_passage(events, locks)?;

    let pools = events
        .iter()
        .map(|event| filter_event(event, locks))
        .collect::<Result<Vec<_>>>()?;
    debug!(
        events = events.len(),
        k,
        candidates = pools.iter().map(Pool::len).sum::<usize>(),
        "searching fingering sequences"
    );

    let mut layers: Vec<Layer> = Vec::with_capacity(pools.len());

    let mut first = Layer::new();
    for j in 0..pools[0].len() {
        let breakdown = base_cost(pools[0].fingering(j), weights);
        first.push_group(&[PathRecord {
            cost: breakdown.total(),
            breakdown,
            candidate: j,
            back: None,
        }]);
    }
    layers.push(first);

    let mut extensions: Vec<PathRecord> = Vec::new();
    for i in 1..pools.len() {
        let (prev_pool, pool) = (&pools[i - 1], &pools[i]);
        let prev = &layers[i - 1];
        let mut layer = Layer::new();
        for j in 0..pool.len() {
            let to = pool.fingering(j);
            extensions.clear();
            for pj in 0..prev_pool.len() {
                let step = transition_cost(prev_pool.fingering(pj), to, weights);
                let step_total = step.total();
                for r in prev.group(pj) {
                    let path = &prev.records[r];
                    extensions.push(PathRecord {
                        cost: path.cost + step_total,
                        breakdown: path.breakdown + step,
                        candidate: j,
                        back: Some(r),
                    });
                }
            }
            extensions.sort_by(by_cost);
            extensions.truncate(k);
            layer.push_group(&extensions);
        }
        layers.push(layer);
    }

    let Some(last) = layers.last() else {
        return Err(FingeringError::EmptyPassage);
    };
    let mut ends: Vec<usize> = (0..last.records.len()).collect();
    ends.sort_by(|&a, &b| by_cost(&last.records[a], &last.records[b]));
    ends.truncate(k);

    let solutions: Vec<Solution> = ends
        .iter()
        .enumerate()
        .map(|(rank, &end)| reconstruct(rank, end, &layers, &pools, events))
        .collect();

    if let Some(best) = solutions.first() {
        info!(
            events = events.len(),
            solutions = solutions.len(),
            best_cost = best.total_cost,
            "fingering search finished"
        );
    }
    Ok(solutions)
}

fn reconstruct(
    rank: usize,
    end: usize,
    layers: &[Layer],
    pools: &[Pool<'_>],
    events: &[SearchEvent],
) -> Solution {
    let last = layers.len() - 1;
    let tail = layers[last].records[end];

    let mut picks = vec![0usize; layers.len()];
    let mut record = tail;
    picks[last] = record.candidate;
    for i in (0..last).rev() {
        // Every record past the first layer has a back pointer.
        let Some(back) = record.back else { break };
        record = layers[i].records[back];
        picks[i] = record.candidate;
    }

    let assignments = events
        .iter()
        .zip(pools)
        .zip(&picks)
        .map(|((event, pool), &j)| Assignment {
            event_id: event.event_id.clone(),
            choice: pool.choice(j),
        })
        .collect();

    Solution {
        id: format!("S{:04}", rank + 1),
        total_cost: tail.cost,
        breakdown: tail.breakdown,
        assignments,
    }
}

/// Passage-level preconditions: non-empty, identified, unique ids, and
/// every lock addressed to an event that exists.
fn check_passage(events: &[SearchEvent], locks: &[Lock]) -> Result<()> {
    if events.is_empty() {
        return Err(FingeringError::EmptyPassage);
    }
    let mut seen = HashSet::new();
    for (index, event) in events.iter().enumerate() {
        if event.event_id.is_empty() {
            return Err(FingeringError::MissingEventId(index));
        }
        if !seen.insert(event.event_id.as_str()) {
            return Err(FingeringError::DuplicateEventId(event.event_id.clone()));
        }
    }
    for lock in locks {
        if !seen.contains(lock.event_id.as_str()) {
            return Err(FingeringError::LockUnknownEvent(lock.event_id.clone()));
        }
    }
    Ok(())
}

/// Validate one event's candidates and apply the locks addressed to it.
fn filter_event<'a>(event: &'a SearchEvent, locks: &[Lock]) -> Result<Pool<'a>> {
    let event_id = event.event_id.as_str();
    let shape_err = |detail: String| FingeringError::CandidateShape {
        event_id: event_id.to_string(),
        detail,
    };

    let pool = match &event.choices {
        EventChoices::Single(candidates) => {
            for c in candidates {
                if let Some(problem) = c.shape_problem() {
                    return Err(shape_err(problem));
                }
            }
            let mut kept: Vec<&Candidate> = candidates.iter().collect();
            for lock in locks_for(locks, event_id) {
                if let Some(slot) = &lock.slot {
                    return Err(FingeringError::LockSlotOnSingle {
                        event_id: event_id.to_string(),
                        slot: slot.clone(),
                    });
                }
                kept.retain(|c| lock.admits(c));
            }
            Pool::Single(kept)
        }
        EventChoices::Chord { slots, candidates } => {
            check_slots(event_id, &slots[0], &slots[1])?;
            for chord in candidates {
                check_chord(event_id, slots, chord)?;
            }
            let mut kept: Vec<&ChordCandidate> = candidates.iter().collect();
            for lock in locks_for(locks, event_id) {
                let Some(slot) = lock.slot.as_deref() else {
                    return Err(FingeringError::LockMissingSlot {
                        event_id: event_id.to_string(),
                    });
                };
                if !slots.iter().any(|s| s == slot) {
                    return Err(FingeringError::LockUnknownSlot {
                        event_id: event_id.to_string(),
                        slot: slot.to_string(),
                    });
                }
                kept.retain(|c| c.choice(slot).is_some_and(|cand| lock.admits(cand)));
            }
            Pool::Chord(kept)
        }
    };

    if pool.is_empty() {
        return Err(FingeringError::ConstraintExhausted {
            event_id: event_id.to_string(),
        });
    }
    Ok(pool)
}

fn check_chord(event_id: &str, slots: &[String; 2], chord: &ChordCandidate) -> Result<()> {
    let labels = [chord.slots[0].slot.as_str(), chord.slots[1].slot.as_str()];
    if labels != [slots[0].as_str(), slots[1].as_str()] {
        return Err(FingeringError::ShapeMismatch {
            event_id: event_id.to_string(),
            detail: format!("chord candidate slots {labels:?} differ from event slots {slots:?}"),
        });
    }
    if chord.slots[0].candidate.string == chord.slots[1].candidate.string {
        return Err(FingeringError::ShapeMismatch {
            event_id: event_id.to_string(),
            detail: format!(
                "both slots on string {}",
                chord.slots[0].candidate.string
            ),
        });
    }
    for side in &chord.slots {
        if let Some(problem) = side.candidate.shape_problem() {
            return Err(FingeringError::CandidateShape {
                event_id: event_id.to_string(),
                detail: format!("slot {}: {problem}", side.slot),
            });
        }
    }
    // The summary fields feed the cost model, so they must agree with the
    // slot choices they summarize.
    let [a, b] = chord.slots.clone();
    if let Some(expected) = ChordCandidate::pair(a, b) {
        let close = |x: f64, y: f64| (x - y).abs() <= SUMMARY_TOLERANCE;
        let stale = !close(chord.position, expected.position)
            || !close(chord.cents_error, expected.cents_error)
            || chord.has_harmonic != expected.has_harmonic;
        if stale {
            return Err(FingeringError::ShapeMismatch {
                event_id: event_id.to_string(),
                detail: format!(
                    "chord summary (position {}, cents {}, harmonic {}) does not match its slots \
                     (position {}, cents {}, harmonic {})",
                    chord.position,
                    chord.cents_error,
                    chord.has_harmonic,
                    expected.position,
                    expected.cents_error,
                    expected.has_harmonic
                ),
            });
        }
    }
    Ok(())
}

/// Slack allowed when comparing a chord's summary fields to its slots.
const SUMMARY_TOLERANCE: f64 = 1e-9;
