//! Engine module housing the `EngineHandle` orchestration layer.
//!
//! The handle owns one instrument and every component that acts on it;
//! the CLI and integration tests drive the analyzer through it.

pub mod core;

pub use core::{EngineEvent, EngineEventKind, EngineHandle};
