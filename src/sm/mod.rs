//! Parsing and timing support for the StepMania `.sm`/`.ssc` simfile format.
//!
//! This layer turns raw simfile bytes into the beat-addressable timing data
//! and per-row note events the core foot-stepping model consumes; it has no
//! knowledge of feet, pads, or step types.

pub mod bpm;
pub mod notes;
pub mod parse;
pub mod simfile;
pub mod timing;
