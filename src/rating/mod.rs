//! Antenna performance rating.

pub mod engine;
pub mod grade;

pub use engine::{Rating, RatingBreakdown, RatingEngine, RatingStats};
pub use grade::Grade;
