//! Frequency sweeps.
//!
//! - [`grid`]: linear frequency grid and request validation
//! - [`controller`]: the per-point program/settle/sample loop
//! - [`task`]: cancellable background execution with progress events
//! - [`result`]: measurements, status and aggregates

pub mod controller;
pub mod grid;
pub mod result;
pub mod task;

pub use controller::{SharedInstrument, SweepController, SweepProgress};
pub use grid::{generate_frequency_grid, SweepRequest, MAX_SWEEP_POINTS, MIN_STEP_HZ};
pub use result::{Measurement, SweepFailure, SweepResult, SweepStatus, SweepSummary, GOOD_SWR};
pub use task::{CancelToken, SweepTask};
