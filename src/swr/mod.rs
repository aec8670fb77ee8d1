//! Voltage-to-SWR conversion.
//!
//! [`SwrModel`] is the mapping itself (default heuristic or calibrated);
//! [`ModelStore`] holds the active model shared by sweeps and calibration.

pub mod model;
pub mod store;

pub use model::{Breakpoint, ModelKind, SwrModel, SwrModelParams, MAX_SWR, MIN_SWR};
pub use store::ModelStore;
