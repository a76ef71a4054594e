// User-imposed fingering constraints ("locks").
//
// A lock pins one event of a passage to a string and/or a technique. For
// two-note events it must also name the slot it restricts. Locks are plain
// per-request data; they have nothing to do with concurrency.
//
// Externally a lock arrives as an event id plus a loose `{field: value}`
// map. `Lock::from_fields` is the only way in from that form, and it fails
// on any field it does not understand rather than ignoring it.
//
// Applied by chord.rs (per-slot pools, before pruning) and search.rs
// (single events, and re-checked against chord candidates).

use crate::error::{FingeringError, Result};
use crate::model::{Candidate, Technique};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Constraint on the fingering of one event (or one slot of a chord event).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLock", into = "RawLock")]
pub struct Lock {
    pub event_id: String,
    /// Chord slot this lock restricts; required for chord events and
    /// forbidden for single-note events.
    pub slot: Option<String>,
    pub string: Option<u8>,
    pub technique: Option<Technique>,
}

/// Wire form: `{"event_id": "...", "fields": {"string": 3, ...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawLock {
    event_id: String,
    #[serde(default)]
    fields: BTreeMap<String, Value>,
}

impl TryFrom<RawLock> for Lock {
    type Error = FingeringError;

    fn try_from(raw: RawLock) -> Result<Self> {
        Lock::from_fields(&raw.event_id, &raw.fields)
    }
}

impl From<Lock> for RawLock {
    fn from(lock: Lock) -> Self {
        let mut fields = BTreeMap::new();
        if let Some(slot) = lock.slot {
            fields.insert("slot".to_string(), Value::from(slot));
        }
        if let Some(string) = lock.string {
            fields.insert("string".to_string(), Value::from(string));
        }
        if let Some(t) = lock.technique {
            fields.insert("technique".to_string(), Value::from(t.as_str()));
        }
        RawLock {
            event_id: lock.event_id,
            fields,
        }
    }
}

impl Lock {
    /// A lock on `event_id` that restricts nothing yet.
    pub fn new(event_id: impl Into<String>) -> Self {
        Lock {
            event_id: event_id.into(),
            slot: None,
            string: None,
            technique: None,
        }
    }

    pub fn with_slot(mut self, slot: impl Into<String>) -> Self {
        self.slot = Some(slot.into());
        self
    }

    pub fn with_string(mut self, string: u8) -> Self {
        self.string = Some(string);
        self
    }

    pub fn with_technique(mut self, technique: Technique) -> Self {
        self.technique = Some(technique);
        self
    }

    /// Parse the external field map. Accepted fields: `slot` (non-empty
    /// string), `string` (integer 1..=7), `technique` (open/press/harmonic).
    pub fn from_fields(event_id: &str, fields: &BTreeMap<String, Value>) -> Result<Self> {
        let invalid = |field: &str, detail: String| FingeringError::InvalidLockValue {
            event_id: event_id.to_string(),
            field: field.to_string(),
            detail,
        };

        let mut lock = Lock::new(event_id);
        for (field, value) in fields {
            match field.as_str() {
                "slot" => match value.as_str() {
                    Some(s) if !s.is_empty() => lock.slot = Some(s.to_string()),
                    _ => {
                        let detail = format!("expected a slot label, got {value}");
                        return Err(invalid(field.as_str(), detail));
                    }
                },
                "string" => match value.as_u64() {
                    Some(s @ 1..=7) => lock.string = Some(s as u8),
                    _ => {
                        let detail = format!("expected 1..=7, got {value}");
                        return Err(invalid(field.as_str(), detail));
                    }
                },
                "technique" => {
                    let tag = value.as_str().ok_or_else(|| {
                        invalid(field.as_str(), format!("expected a string, got {value}"))
                    })?;
                    lock.technique = Some(tag.parse().map_err(|e: FingeringError| {
                        invalid(field.as_str(), e.to_string())
                    })?);
                }
                _ => {
                    return Err(FingeringError::UnknownLockField {
                        event_id: event_id.to_string(),
                        field: field.clone(),
                    });
                }
            }
        }
        Ok(lock)
    }

    /// Whether a candidate satisfies this lock's string/technique fields.
    /// The slot is not checked here; callers route the lock to a slot first.
    pub fn admits(&self, candidate: &Candidate) -> bool {
        self.string.is_none_or(|s| candidate.string == s)
            && self.technique.is_none_or(|t| candidate.technique == t)
    }
}

/// Locks addressed to `event_id`, in the order given.
pub fn locks_for<'a>(locks: &'a [Lock], event_id: &'a str) -> impl Iterator<Item = &'a Lock> {
    locks.iter().filter(move |l| l.event_id == event_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hui::Temperament;
    use serde_json::json;

    fn fields(v: Value) -> BTreeMap<String, Value> {
        serde_json::from_value(v).unwrap()
    }

    fn candidate(string: u8, technique: Technique) -> Candidate {
        Candidate {
            string,
            technique,
            pitch: 62,
            semitones_from_open: 0,
            pos_ratio: 0.0,
            hui: None,
            temperament: Temperament::Equal,
            harmonic: None,
            cents_error: 0.0,
        }
    }

    #[test]
    fn test_from_fields() {
        let raw = fields(json!({"string": 4, "technique": "open"}));
        let lock = Lock::from_fields("e1", &raw).unwrap();
        assert_eq!(lock, Lock::new("e1").with_string(4).with_technique(Technique::Open));

        let lock = Lock::from_fields("e2", &fields(json!({"slot": "L"}))).unwrap();
        assert_eq!(lock.slot.as_deref(), Some("L"));
    }

    #[test]
    fn test_unknown_field_fails() {
        let err = Lock::from_fields("e1", &fields(json!({"finger": "index"}))).unwrap_err();
        assert!(
            matches!(err, FingeringError::UnknownLockField { ref field, .. } if field == "finger"),
            "got {err:?}"
        );
    }

    #[test]
    fn test_bad_values_fail() {
        for bad in [
            json!({"string": 0}),
            json!({"string": 8}),
            json!({"string": "3"}),
            json!({"technique": "pressed"}),
            json!({"technique": 1}),
            json!({"slot": ""}),
        ] {
            let err = Lock::from_fields("e1", &fields(bad.clone())).unwrap_err();
            assert!(
                matches!(err, FingeringError::InvalidLockValue { .. }),
                "{bad} should be rejected, got {err:?}"
            );
        }
    }

    #[test]
    fn test_admits() {
        let lock = Lock::new("e").with_string(3);
        assert!(lock.admits(&candidate(3, Technique::Open)));
        assert!(!lock.admits(&candidate(2, Technique::Open)));

        let lock = Lock::new("e").with_technique(Technique::Press);
        assert!(!lock.admits(&candidate(3, Technique::Open)));

        assert!(Lock::new("e").admits(&candidate(1, Technique::Harmonic)));
    }

    #[test]
    fn test_json_round_trip() {
        let lock = Lock::new("m1.e3").with_slot("R").with_technique(Technique::Harmonic);
        let json = serde_json::to_value(&lock).unwrap();
        assert_eq!(json["fields"]["technique"], "harmonic");
        let back: Lock = serde_json::from_value(json).unwrap();
        assert_eq!(back, lock);

        let bad = serde_json::from_value::<Lock>(json!({"event_id": "e", "fields": {"fret": 2}}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_locks_for_filters_by_event() {
        let locks = vec![
            Lock::new("a").with_string(1),
            Lock::new("b").with_string(2),
            Lock::new("a").with_technique(Technique::Open),
        ];
        let for_a: Vec<_> = locks_for(&locks, "a").collect();
        assert_eq!(for_a.len(), 2);
    }
}
