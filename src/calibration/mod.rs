// Calibration module - fitting the SWR model from reference measurements
//
// The workflow:
// 1. Collect a with_antenna and a without_antenna dataset (collector)
// 2. Fit a calibrated model from the two classes (deriver)
// 3. Store the result as the active model and persist it (state)

pub mod collector;
pub mod dataset;
pub mod deriver;
pub mod report;
pub mod state;

pub use collector::{collect_dataset, Collection};
pub use dataset::{
    default_dataset_file_name, load_records, AntennaLabel, CalibrationDataset, CalibrationRecord,
    VoltageStats,
};
pub use deriver::{CalibrationDeriver, CalibrationFit, CalibrationParameters};
pub use report::CalibrationReport;
pub use state::CalibrationState;
