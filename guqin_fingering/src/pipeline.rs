// Passage pipeline: events with target pitches in, ranked fingerings out.
//
// Three steps, each usable on its own:
//
// 1. `enumerate_passage` classifies every event (single note or two-slot
//    chord) before doing any candidate work, then runs the position engine
//    on every target. Targets no string can reach are reported as warnings
//    here; the search later refuses them.
// 2. `prepare_search` turns the per-target lists into search input: single
//    targets pass through, chord targets go through the chord builder with
//    the locks addressed to that event.
// 3. `recommend` runs both plus the sequence search under one
//    `FingeringConfig`.

use crate::chord::{ChordLimits, ChordSide, build_chord_candidates, check_slots};
use crate::config::FingeringConfig;
use crate::error::{FingeringError, Result};
use crate::lock::Lock;
use crate::model::Candidate;
use crate::position::{PositionOptions, enumerate};
use crate::search::{EventChoices, SearchEvent, Solution, search};
use crate::tuning::Tuning;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// One sounding note of an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Absent for single-note events; a distinct label per chord note.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    /// Absolute pitch (MIDI).
    pub pitch: i32,
}

impl Target {
    pub fn single(pitch: i32) -> Self {
        Target { slot: None, pitch }
    }

    pub fn slotted(slot: impl Into<String>, pitch: i32) -> Self {
        Target {
            slot: Some(slot.into()),
            pitch,
        }
    }
}

/// One event of a passage as the notation layer hands it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassageEvent {
    pub id: String,
    pub targets: Vec<Target>,
}

/// Whether an event is a single note or a two-note chord.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventShape {
    Single,
    Chord { slots: [String; 2] },
}

impl EventShape {
    /// Classify an event by its targets. Zero or three-plus targets are
    /// unsupported; a single target must not carry a slot and chord
    /// targets must carry two distinct ones.
    pub fn classify(event: &PassageEvent) -> Result<Self> {
        let label = |t: &Target| t.slot.as_deref().filter(|s| !s.is_empty()).map(str::to_string);
        match event.targets.as_slice() {
            [only] => match label(only) {
                None => Ok(EventShape::Single),
                Some(slot) => Err(FingeringError::InvalidSlots {
                    event_id: event.id.clone(),
                    detail: format!("single-note target carries slot {slot:?}"),
                }),
            },
            [a, b] => {
                let (Some(sa), Some(sb)) = (label(a), label(b)) else {
                    return Err(FingeringError::InvalidSlots {
                        event_id: event.id.clone(),
                        detail: "chord targets must both carry a slot".to_string(),
                    });
                };
                check_slots(&event.id, &sa, &sb)?;
                Ok(EventShape::Chord { slots: [sa, sb] })
            }
            other => Err(FingeringError::UnsupportedArity {
                event_id: event.id.clone(),
                targets: other.len(),
            }),
        }
    }
}

/// Candidates for one target.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetCandidates {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slot: Option<String>,
    pub pitch: i32,
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventCandidates {
    pub event_id: String,
    pub shape: EventShape,
    pub targets: Vec<TargetCandidates>,
}

/// Stage-1 output for a whole passage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PassageCandidates {
    pub events: Vec<EventCandidates>,
    /// One line per target that no string can reach.
    pub warnings: Vec<String>,
}

/// Run the position engine over every target of a passage.
pub fn enumerate_passage(
    events: &[PassageEvent],
    tuning: &Tuning,
    options: &PositionOptions,
) -> Result<PassageCandidates> {
    options.validate()?;
    if events.is_empty() {
        return Err(FingeringError::EmptyPassage);
    }

    let mut seen = HashSet::new();
    let mut shapes = Vec::with_capacity(events.len());
    for (index, event) in events.iter().enumerate() {
        if event.id.is_empty() {
            return Err(FingeringError::MissingEventId(index));
        }
        if !seen.insert(event.id.as_str()) {
            return Err(FingeringError::DuplicateEventId(event.id.clone()));
        }
        shapes.push(EventShape::classify(event)?);
    }

    let mut warnings = Vec::new();
    let mut out = Vec::with_capacity(events.len());
    for (event, shape) in events.iter().zip(shapes) {
        let mut targets = Vec::with_capacity(event.targets.len());
        for target in &event.targets {
            let candidates = enumerate(target.pitch, tuning, options)?;
            if candidates.is_empty() {
                warn!(
                    event_id = %event.id,
                    pitch = target.pitch,
                    tuning = tuning.name(),
                    "no candidates for target"
                );
                warnings.push(format!(
                    "event {}: no candidates for pitch {} under tuning {} \
                     (check tuning, transpose or max_semitones)",
                    event.id,
                    target.pitch,
                    tuning.name()
                ));
            }
            targets.push(TargetCandidates {
                slot: target.slot.clone().filter(|s| !s.is_empty()),
                pitch: target.pitch,
                candidates,
            });
        }
        debug!(
            event_id = %event.id,
            counts = ?targets.iter().map(|t| t.candidates.len()).collect::<Vec<_>>(),
            "enumerated event"
        );
        out.push(EventCandidates {
            event_id: event.id.clone(),
            shape,
            targets,
        });
    }

    Ok(PassageCandidates {
        events: out,
        warnings,
    })
}

/// Turn stage-1 output into search input, building chord candidates for
/// two-note events.
pub fn prepare_search(
    passage: &PassageCandidates,
    locks: &[Lock],
    limits: &ChordLimits,
) -> Result<Vec<SearchEvent>> {
    passage
        .events
        .iter()
        .map(|event| {
            let choices = match (&event.shape, event.targets.as_slice()) {
                (EventShape::Single, [target]) => EventChoices::Single(target.candidates.clone()),
                (EventShape::Chord { slots }, [a, b]) => {
                    let sides = [
                        ChordSide {
                            slot: &slots[0],
                            pitch: a.pitch,
                            candidates: &a.candidates,
                        },
                        ChordSide {
                            slot: &slots[1],
                            pitch: b.pitch,
                            candidates: &b.candidates,
                        },
                    ];
                    EventChoices::Chord {
                        slots: slots.clone(),
                        candidates: build_chord_candidates(&event.event_id, &sides, locks, limits)?,
                    }
                }
                (shape, targets) => {
                    return Err(FingeringError::ShapeMismatch {
                        event_id: event.event_id.clone(),
                        detail: format!("{shape:?} event with {} targets", targets.len()),
                    });
                }
            };
            Ok(SearchEvent {
                event_id: event.event_id.clone(),
                choices,
            })
        })
        .collect()
}

/// Enumerate, build chords and search in one call.
pub fn recommend(
    events: &[PassageEvent],
    locks: &[Lock],
    config: &FingeringConfig,
) -> Result<Vec<Solution>> {
    config.validate()?;
    let passage = enumerate_passage(events, &config.tuning, &config.position)?;
    let search_events = prepare_search(&passage, locks, &config.chord)?;
    search(&search_events, config.k, locks, &config.weights)
}
