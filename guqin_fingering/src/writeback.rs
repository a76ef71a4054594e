// Write-back: translate a chosen solution into structured event fields.
//
// The notation profile stores each event's fingering as string key/value
// fields. This module turns a solution's assignments into field patches in
// that vocabulary, and plans the edits needed to commit the best solution.
//
// Field vocabulary:
// - `form`: `simple` (one technique over one or more strings) or `complex`
//   (independent left/right notes, fields prefixed `l_` and `r_`);
// - `xian`: string number, or a comma-separated list for multi-string
//   simple events;
// - `sound`: `open`, `pressed` or `harmonic`;
// - `pos_ratio`, `harmonic_n`, `harmonic_k`: the technique's position data;
//   multi-string pressed events use `pos_ratio_1`..`pos_ratio_7` instead.
//
// A patch maps a key to `Some(value)` (set) or `None` (delete). Patches
// delete every sound field of the form they write before setting the new
// ones, so re-committing over an older automatic result never leaves stale
// fields behind. Events whose fingering the user has confirmed
// (`user_touched=1` or `truth_src=user`) are never overwritten.
//
// sounding.rs reads the same vocabulary back into pitches.

use crate::error::{FingeringError, Result};
use crate::model::{Candidate, SlotChoice, Technique};
use crate::search::{EventChoice, Solution};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Stored fields of one event.
pub type Fields = BTreeMap<String, String>;

/// Field changes: `Some` sets a value, `None` deletes the key.
pub type Patch = BTreeMap<String, Option<String>>;

/// Sound fields of the simple form, all cleared before a simple write.
const SIMPLE_SOUND_FIELDS: [&str; 11] = [
    "sound",
    "pos_ratio",
    "harmonic_n",
    "harmonic_k",
    "pos_ratio_1",
    "pos_ratio_2",
    "pos_ratio_3",
    "pos_ratio_4",
    "pos_ratio_5",
    "pos_ratio_6",
    "pos_ratio_7",
];

/// Per-side sound fields of the complex form (without the `l_`/`r_` prefix).
const COMPLEX_SOUND_FIELDS: [&str; 4] = ["sound", "pos_ratio", "harmonic_n", "harmonic_k"];

/// The `sound` tag written for a technique.
pub fn sound_tag(technique: Technique) -> &'static str {
    match technique {
        Technique::Open => "open",
        Technique::Press => "pressed",
        Technique::Harmonic => "harmonic",
    }
}

/// Inverse of [`sound_tag`].
pub fn parse_sound(tag: &str) -> Option<Technique> {
    match tag {
        "open" => Some(Technique::Open),
        "pressed" => Some(Technique::Press),
        "harmonic" => Some(Technique::Harmonic),
        _ => None,
    }
}

fn format_ratio(pos_ratio: f64) -> String {
    format!("{pos_ratio:?}")
}

fn set(patch: &mut Patch, key: impl Into<String>, value: impl Into<String>) {
    patch.insert(key.into(), Some(value.into()));
}

fn shape_err(field: &str, detail: String) -> FingeringError {
    FingeringError::FieldShape {
        field: field.to_string(),
        detail,
    }
}

/// Write one candidate's sound fields with key prefix `prefix`.
fn write_sound(patch: &mut Patch, prefix: &str, candidate: &Candidate) -> Result<()> {
    set(patch, format!("{prefix}sound"), sound_tag(candidate.technique));
    match candidate.technique {
        Technique::Open => {}
        Technique::Press => {
            set(patch, format!("{prefix}pos_ratio"), format_ratio(candidate.pos_ratio));
        }
        Technique::Harmonic => {
            let node = candidate.harmonic.ok_or_else(|| {
                shape_err(
                    &format!("{prefix}harmonic_n"),
                    format!("harmonic candidate on string {} has no node", candidate.string),
                )
            })?;
            set(patch, format!("{prefix}harmonic_n"), node.n.to_string());
            set(patch, format!("{prefix}harmonic_k"), node.k.to_string());
            // Display cache only; pitch derivation reads harmonic_n.
            set(patch, format!("{prefix}pos_ratio"), format_ratio(candidate.pos_ratio));
        }
    }
    Ok(())
}

/// Patch for a single-note choice.
///
/// `form`, `lex` and `xian_finger` are only filled in when the event has
/// none, so reading-layer fields the user chose survive.
pub fn single_patch(candidate: &Candidate, existing: &Fields) -> Result<Patch> {
    let mut patch = Patch::new();
    set(&mut patch, "xian", candidate.string.to_string());
    for (key, default) in [("form", "simple"), ("lex", "abbr"), ("xian_finger", "勾")] {
        if !existing.contains_key(key) {
            set(&mut patch, key, default);
        }
    }
    for key in SIMPLE_SOUND_FIELDS {
        patch.insert(key.to_string(), None);
    }
    write_sound(&mut patch, "", candidate)?;
    Ok(patch)
}

/// Patch for a two-note choice. The event's existing `form` decides the
/// layout: `complex` needs slots `L`/`R`, `simple` needs slots `1`/`2`
/// sharing one technique.
pub fn chord_patch(slots: &[SlotChoice; 2], existing: &Fields) -> Result<Patch> {
    let by_slot = |label: &str| slots.iter().find(|s| s.slot == label).map(|s| &s.candidate);

    match existing.get("form").map(String::as_str) {
        Some("complex") => {
            let (Some(l), Some(r)) = (by_slot("L"), by_slot("R")) else {
                return Err(shape_err(
                    "slot",
                    format!(
                        "complex events need slots L and R, got {:?}",
                        [&slots[0].slot, &slots[1].slot]
                    ),
                ));
            };
            let mut patch = Patch::new();
            set(&mut patch, "form", "complex");
            set(&mut patch, "l_xian", l.string.to_string());
            set(&mut patch, "r_xian", r.string.to_string());
            for (prefix, candidate) in [("l_", l), ("r_", r)] {
                for key in COMPLEX_SOUND_FIELDS {
                    patch.insert(format!("{prefix}{key}"), None);
                }
                write_sound(&mut patch, prefix, candidate)?;
            }
            Ok(patch)
        }
        Some("simple") => simple_chord_patch(slots, by_slot("1"), by_slot("2")),
        other => Err(shape_err(
            "form",
            format!("chord write-back needs form simple or complex, got {other:?}"),
        )),
    }
}

fn simple_chord_patch(
    slots: &[SlotChoice; 2],
    first: Option<&Candidate>,
    second: Option<&Candidate>,
) -> Result<Patch> {
    let (Some(a), Some(b)) = (first, second) else {
        return Err(shape_err(
            "slot",
            format!(
                "simple multi-string events need slots 1..N, got {:?}",
                [&slots[0].slot, &slots[1].slot]
            ),
        ));
    };
    if a.technique != b.technique {
        return Err(shape_err(
            "sound",
            format!(
                "simple multi-string events need one technique, got {} and {}",
                a.technique, b.technique
            ),
        ));
    }

    let mut patch = Patch::new();
    set(&mut patch, "form", "simple");
    set(&mut patch, "xian", format!("{},{}", a.string, b.string));
    for key in SIMPLE_SOUND_FIELDS {
        patch.insert(key.to_string(), None);
    }
    set(&mut patch, "sound", sound_tag(a.technique));
    match a.technique {
        Technique::Open => {}
        Technique::Press => {
            set(&mut patch, "pos_ratio_1", format_ratio(a.pos_ratio));
            set(&mut patch, "pos_ratio_2", format_ratio(b.pos_ratio));
        }
        Technique::Harmonic => match (a.harmonic, b.harmonic) {
            (Some(x), Some(y)) if x.n == y.n => set(&mut patch, "harmonic_n", x.n.to_string()),
            (Some(x), Some(y)) => {
                return Err(shape_err(
                    "harmonic_n",
                    format!("simple multi-string harmonics must share n, got {} and {}", x.n, y.n),
                ));
            }
            _ => {
                return Err(shape_err(
                    "harmonic_n",
                    "harmonic candidate without a node".to_string(),
                ));
            }
        },
    }
    Ok(patch)
}

/// Patch for any assignment choice.
pub fn choice_patch(choice: &EventChoice, existing: &Fields) -> Result<Patch> {
    match choice {
        EventChoice::Single(candidate) => single_patch(candidate, existing),
        EventChoice::Chord(slots) => chord_patch(slots, existing),
    }
}

/// Keep only the entries of `patch` that change `existing`: sets whose
/// value differs, and deletions of keys that are present.
pub fn diff_patch(existing: &Fields, patch: &Patch) -> Patch {
    patch
        .iter()
        .filter(|(key, value)| match value {
            Some(v) => existing.get(key.as_str()) != Some(v),
            None => existing.contains_key(key.as_str()),
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Whether the user has confirmed this event's fingering by hand.
pub fn is_user_owned(fields: &Fields) -> bool {
    fields.get("user_touched").is_some_and(|v| v == "1")
        || fields.get("truth_src").is_some_and(|v| v == "user")
}

/// One event update produced by [`plan_commit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditOp {
    pub event_id: String,
    pub changes: Patch,
}

/// Edits that write `solution` over the stored fields, one per event that
/// actually changes. User-owned events are skipped; an assignment for an
/// event with no stored fields is an error.
pub fn plan_commit(
    solution: &Solution,
    existing_by_event: &BTreeMap<String, Fields>,
) -> Result<Vec<EditOp>> {
    let mut ops = Vec::new();
    for assignment in &solution.assignments {
        let existing = existing_by_event
            .get(&assignment.event_id)
            .ok_or_else(|| FingeringError::UnknownEvent(assignment.event_id.clone()))?;
        if is_user_owned(existing) {
            debug!(event_id = %assignment.event_id, "skipping user-confirmed event");
            continue;
        }
        let patch = choice_patch(&assignment.choice, existing)?;
        let changes = diff_patch(existing, &patch);
        if !changes.is_empty() {
            ops.push(EditOp {
                event_id: assignment.event_id.clone(),
                changes,
            });
        }
    }
    debug!(solution = %solution.id, edits = ops.len(), "planned commit");
    Ok(ops)
}
