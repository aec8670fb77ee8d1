//! Sweep result persistence and history.

pub mod record;
pub mod store;

pub use record::{MeasurementRecord, RatingRecord, SweepParameters, SweepRecord};
pub use store::{HistoryEntry, ResultStore};
