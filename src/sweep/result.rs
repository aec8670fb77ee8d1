use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::hardware::{FrequencyPoint, Sample};
use crate::swr::ModelKind;

/// SWR at or below which a point counts as "good" (and inside the bandwidth)
pub const GOOD_SWR: f64 = 2.0;

/// One measured point of a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub point: FrequencyPoint,
    pub sample: Sample,
    pub swr: f64,
}

impl Measurement {
    pub fn frequency_mhz(&self) -> f64 {
        self.point.frequency_mhz()
    }
}

/// How a sweep ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepStatus {
    Complete,
    PartialFailed,
    Cancelled,
}

impl SweepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepStatus::Complete => "complete",
            SweepStatus::PartialFailed => "partial_failed",
            SweepStatus::Cancelled => "cancelled",
        }
    }
}

/// Why a sweep stopped early with `PartialFailed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepFailure {
    pub code: i32,
    pub message: String,
    /// Frequency (MHz) of the point that failed, if one was being measured
    pub at_mhz: Option<f64>,
}

/// Aggregates over the gathered points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepSummary {
    pub min_swr: f64,
    /// Frequency of the minimum SWR; the lowest one wins ties
    pub resonance_mhz: f64,
    pub avg_swr: f64,
    pub max_swr: f64,
    /// `max(freq) - min(freq)` over all points with SWR <= 2.0, contiguous
    /// or not; `None` when no point qualifies
    pub bandwidth_mhz: Option<f64>,
    pub good_points: usize,
    pub total_points: usize,
}

impl SweepSummary {
    /// `None` for an empty slice. Assumes ascending frequency order.
    pub fn from_measurements(measurements: &[Measurement]) -> Option<Self> {
        let first = measurements.first()?;

        let mut min_swr = first.swr;
        let mut resonance_mhz = first.frequency_mhz();
        let mut max_swr = first.swr;
        let mut sum = 0.0;
        let mut good_lo: Option<f64> = None;
        let mut good_hi: Option<f64> = None;
        let mut good_points = 0;

        for m in measurements {
            let mhz = m.frequency_mhz();
            // strict comparison keeps the earliest (lowest) frequency on ties
            if m.swr < min_swr {
                min_swr = m.swr;
                resonance_mhz = mhz;
            }
            max_swr = max_swr.max(m.swr);
            sum += m.swr;
            if m.swr <= GOOD_SWR {
                good_points += 1;
                good_lo = Some(good_lo.map_or(mhz, |lo| lo.min(mhz)));
                good_hi = Some(good_hi.map_or(mhz, |hi| hi.max(mhz)));
            }
        }

        let bandwidth_mhz = match (good_lo, good_hi) {
            (Some(lo), Some(hi)) => Some(hi - lo),
            _ => None,
        };

        Some(Self {
            min_swr,
            resonance_mhz,
            avg_swr: sum / measurements.len() as f64,
            max_swr,
            bandwidth_mhz,
            good_points,
            total_points: measurements.len(),
        })
    }

    pub fn good_ratio(&self) -> f64 {
        if self.total_points == 0 {
            0.0
        } else {
            self.good_points as f64 / self.total_points as f64
        }
    }
}

/// Outcome of one sweep run. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResult {
    pub start_mhz: f64,
    pub stop_mhz: f64,
    pub requested_points: usize,
    pub measurements: Vec<Measurement>,
    pub summary: Option<SweepSummary>,
    pub status: SweepStatus,
    pub failure: Option<SweepFailure>,
    pub model: ModelKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SweepResult {
    pub fn is_complete(&self) -> bool {
        self.status == SweepStatus::Complete
    }

    pub fn len(&self) -> usize {
        self.measurements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.measurements.is_empty()
    }

    pub fn swr_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.measurements.iter().map(|m| m.swr)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
