// On-disk sweep record
//
// {
//   "timestamp": "2024-03-09T14:05:07.123456",
//   "parameters": {"start_freq": MHz, "stop_freq": MHz, "points": n},
//   "measurements": [{"frequency": MHz, "mag_voltage": V, "phase_voltage": V, "swr": x}],
//   "rating": {"score": 0-100, "rating": "B+", "analysis": "..."}
// }
//
// `status` is written only for sweeps that did not complete.

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::rating::{Grade, Rating};
use crate::sweep::{SweepResult, SweepStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepParameters {
    pub start_freq: f64,
    pub stop_freq: f64,
    pub points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub frequency: f64,
    pub mag_voltage: f64,
    pub phase_voltage: f64,
    pub swr: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub score: u8,
    pub rating: Grade,
    pub analysis: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRecord {
    /// Local wall-clock time the sweep finished
    pub timestamp: NaiveDateTime,
    pub parameters: SweepParameters,
    pub measurements: Vec<MeasurementRecord>,
    pub rating: RatingRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<SweepStatus>,
}

impl SweepRecord {
    pub fn from_result(result: &SweepResult, rating: &Rating) -> Self {
        Self {
            timestamp: result.finished_at.with_timezone(&Local).naive_local(),
            parameters: SweepParameters {
                start_freq: result.start_mhz,
                stop_freq: result.stop_mhz,
                points: result.requested_points,
            },
            measurements: result
                .measurements
                .iter()
                .map(|m| MeasurementRecord {
                    frequency: m.frequency_mhz(),
                    mag_voltage: m.sample.mag_voltage,
                    phase_voltage: m.sample.phase_voltage,
                    swr: m.swr,
                })
                .collect(),
            rating: RatingRecord {
                score: rating.score,
                rating: rating.grade,
                analysis: rating.analysis.clone(),
            },
            status: (!result.is_complete()).then_some(result.status),
        }
    }

    /// `antenna_test_<YYYYmmdd_HHMMSS>.json`
    pub fn file_name(&self) -> String {
        format!("antenna_test_{}.json", self.timestamp.format("%Y%m%d_%H%M%S"))
    }

    pub fn min_swr(&self) -> Option<f64> {
        self.measurements.iter().map(|m| m.swr).reduce(f64::min)
    }
}
