// Error taxonomy for the fingering engine.
//
// Every failure is reported to the immediate caller with enough context
// (event id, slot, field) to diagnose it without re-running. Nothing is
// retried internally and nothing is downgraded to a warning: either a full
// candidate set / full top-K solution set comes back, or one of these does.
//
// Groups, roughly in pipeline order:
// - Configuration: tuning shape, engine options, k, empty passage, arity.
// - Locks: malformed lock fields, slot addressing, unknown events.
// - Constraint exhaustion: a lock (alone or with physical constraints)
//   leaves nothing to choose from.
// - Combinatorial bound: chord cross product over the configured cap.
// - Data shape: candidates or written fields missing what their technique
//   requires, unknown technique tags.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FingeringError>;

#[derive(Debug, Error)]
pub enum FingeringError {
    #[error("tuning must list exactly 7 open-string pitches, got {0}")]
    InvalidTuning(usize),

    #[error("tuning {field} out of range: {detail}")]
    TuningOutOfRange { field: &'static str, detail: String },

    #[error("string {0} is outside 1..=7")]
    StringOutOfRange(i64),

    #[error("option `{name}` out of range: {detail}")]
    InvalidOption { name: &'static str, detail: String },

    #[error("k must be at least 1, got {0}")]
    InvalidK(usize),

    #[error("passage has no events")]
    EmptyPassage,

    #[error("event at index {0} has no identifier")]
    MissingEventId(usize),

    #[error("event id `{0}` appears more than once in the passage")]
    DuplicateEventId(String),

    #[error("event {event_id}: {targets} simultaneous targets are unsupported (expected 1 or 2)")]
    UnsupportedArity { event_id: String, targets: usize },

    #[error("event {event_id}: invalid slot labels: {detail}")]
    InvalidSlots { event_id: String, detail: String },

    #[error("event {event_id}: locked to zero candidates")]
    ConstraintExhausted { event_id: String },

    #[error("event {event_id} slot {slot}: locked to zero candidates")]
    SlotConstraintExhausted { event_id: String, slot: String },

    #[error("event {event_id}: every chord pairing puts both notes on one string")]
    ChordStringsCollide { event_id: String },

    #[error("event {event_id}: chord lock must name a slot")]
    LockMissingSlot { event_id: String },

    #[error("event {event_id}: lock names slot `{slot}`, which the event does not have")]
    LockUnknownSlot { event_id: String, slot: String },

    #[error("event {event_id}: lock names slot `{slot}` but the event is a single note")]
    LockSlotOnSingle { event_id: String, slot: String },

    #[error("event {event_id}: unsupported lock field `{field}`")]
    UnknownLockField { event_id: String, field: String },

    #[error("event {event_id}: invalid value for lock field `{field}`: {detail}")]
    InvalidLockValue {
        event_id: String,
        field: String,
        detail: String,
    },

    #[error("lock references event {0}, which is not in the passage")]
    LockUnknownEvent(String),

    #[error(
        "event {event_id}: chord cross product exceeds the cap of {cap} pairs; \
         prune candidates harder upstream"
    )]
    ProductCapExceeded { event_id: String, cap: usize },

    #[error("event {event_id}: malformed candidate: {detail}")]
    CandidateShape { event_id: String, detail: String },

    #[error("event {event_id}: candidate set does not match the event shape: {detail}")]
    ShapeMismatch { event_id: String, detail: String },

    #[error("unknown technique `{0}` (expected open, press or harmonic)")]
    UnknownTechnique(String),

    #[error("invalid pitch: {0}")]
    InvalidPitch(String),

    #[error("field `{field}`: {detail}")]
    FieldShape { field: String, detail: String },

    #[error("solution assigns event {0}, which has no stored fields")]
    UnknownEvent(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
