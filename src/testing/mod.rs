//! Deterministic instrument doubles.
//!
//! These stand in for the physical buses in unit and integration tests:
//! [`RecordingDds`] captures every latched tuning word and
//! [`ScriptedDetector`] replays a fixed script of readings and bus faults.
//! The module is compiled into the library so `tests/` can reach it.

pub mod scripted;

pub use scripted::{scripted_analyzer, RecordingDds, ScriptStep, ScriptedDetector};
