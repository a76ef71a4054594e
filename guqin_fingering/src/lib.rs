// Guqin fingering engine
//
// Turns a passage of musical events (absolute target pitches, one or two per
// event) into ranked fingering recommendations for the seven-string guqin.
// Every note can be played open, pressed at a continuous position, or as a
// natural harmonic. The engine works in two stages: enumerate every
// physically valid way to produce each pitch, then pick the K cheapest
// sequences across the passage under a weighted playing-effort cost and any
// user locks.
//
// Architecture:
// - tuning.rs: Seven open-string pitches plus a global transpose
// - pitch.rs: Spelled pitch (step/alter/octave) to MIDI conversion
// - hui.rs: Display-only traditional position coordinates (equal/just tables)
// - model.rs: Technique, Candidate, ChordCandidate and the `Fingering` trait
// - position.rs: Stage 1, open/press/harmonic candidates for one pitch
// - lock.rs: User constraints pinning an event (or chord slot) to a
//   string and/or technique
// - chord.rs: Pruned cross product of two slot pools for two-note events
// - cost.rs: Weights and the transition-cost breakdown
// - search.rs: Stage 2, top-K dynamic program over the event chain
// - pipeline.rs: Event classification, passage enumeration, `recommend`
// - config.rs: JSON-loadable request configuration with range checks
// - writeback.rs: Solution to structured event fields, commit planning
// - sounding.rs: Fingering (candidate or written fields) back to pitch
// - error.rs: Crate-wide error enum and `Result` alias
//
// Everything is pure and synchronous. Identical inputs give identical
// output, including the order of equal-cost solutions.

pub mod chord;
pub mod config;
pub mod cost;
pub mod error;
pub mod hui;
pub mod lock;
pub mod model;
pub mod pipeline;
pub mod pitch;
pub mod position;
pub mod search;
pub mod sounding;
pub mod tuning;
pub mod writeback;

pub use config::FingeringConfig;
pub use error::{FingeringError, Result};
pub use pipeline::{PassageEvent, Target, recommend};
pub use search::Solution;
