// RatingEngine - SWR curve to 0-100 score and letter grade
//
// Scoring is additive over four bucketed components and then clamped:
// base points from the minimum SWR, a linear average-SWR term, a share
// for the fraction of good points, and small bonuses for a deep match or a
// wide good band.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::rating::Grade;
use crate::sweep::{SweepResult, SweepStatus, GOOD_SWR};

pub const EXCELLENT_SWR: f64 = 1.5;
pub const ACCEPTABLE_SWR: f64 = 3.0;

/// Points awarded by each scoring component (before clamping).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingBreakdown {
    pub base: i32,
    pub average: i32,
    pub coverage: i32,
    pub bonus: i32,
}

impl RatingBreakdown {
    pub fn total(&self) -> i32 {
        self.base + self.average + self.coverage + self.bonus
    }

    /// Total clamped to [0, 100].
    pub fn score(&self) -> u8 {
        self.total().clamp(0, 100) as u8
    }
}

/// Band counts and SWR extremes behind a rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingStats {
    pub min_swr: f64,
    pub avg_swr: f64,
    pub max_swr: f64,
    pub total_points: usize,
    pub excellent_points: usize,
    pub good_points: usize,
    pub acceptable_points: usize,
}

impl RatingStats {
    pub fn excellent_ratio(&self) -> f64 {
        ratio(self.excellent_points, self.total_points)
    }

    pub fn good_ratio(&self) -> f64 {
        ratio(self.good_points, self.total_points)
    }

    pub fn acceptable_ratio(&self) -> f64 {
        ratio(self.acceptable_points, self.total_points)
    }
}

fn ratio(n: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 / total as f64
    }
}

/// Score, grade and rationale for one sweep.
///
/// Owns copies of everything it reports, so it can outlive the sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub score: u8,
    pub grade: Grade,
    pub analysis: String,
    pub breakdown: RatingBreakdown,
    pub stats: Option<RatingStats>,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RatingEngine;

impl RatingEngine {
    pub fn new() -> Self {
        Self
    }

    /// Component points for the given aggregates.
    pub fn score(&self, min_swr: f64, avg_swr: f64, good_ratio: f64) -> RatingBreakdown {
        let base = if min_swr <= 1.3 {
            35
        } else if min_swr <= 1.7 {
            25
        } else if min_swr <= 2.0 {
            15
        } else {
            0
        };

        let average = ((2.5 - avg_swr) * 15.0).max(0.0).trunc() as i32;
        let coverage = (good_ratio * 40.0).max(0.0).trunc() as i32;

        let mut bonus = if min_swr <= 1.2 {
            5
        } else if min_swr <= 1.5 {
            2
        } else {
            0
        };
        if good_ratio >= 0.7 {
            bonus += 3;
        }

        RatingBreakdown {
            base,
            average,
            coverage,
            bonus,
        }
    }

    /// Rate whatever points the sweep gathered, complete or not.
    pub fn rate(&self, result: &SweepResult) -> Rating {
        let summary = match &result.summary {
            Some(summary) => summary,
            None => {
                return Rating {
                    score: 0,
                    grade: Grade::F,
                    analysis: "No measurements available".to_string(),
                    breakdown: RatingBreakdown::default(),
                    stats: None,
                    recommendations: Vec::new(),
                }
            }
        };

        let stats = RatingStats {
            min_swr: summary.min_swr,
            avg_swr: summary.avg_swr,
            max_swr: summary.max_swr,
            total_points: summary.total_points,
            excellent_points: result.swr_values().filter(|s| *s <= EXCELLENT_SWR).count(),
            good_points: summary.good_points,
            acceptable_points: result.swr_values().filter(|s| *s <= ACCEPTABLE_SWR).count(),
        };

        let breakdown = self.score(stats.min_swr, stats.avg_swr, stats.good_ratio());
        let score = breakdown.score();
        let grade = Grade::from_score(score);
        let recommendations = recommendations(score, &stats);

        let mut analysis = String::new();
        let _ = writeln!(analysis, "Minimum SWR: {:.2}", stats.min_swr);
        let _ = writeln!(analysis, "Average SWR: {:.2}", stats.avg_swr);
        let _ = writeln!(analysis, "Maximum SWR: {:.2}", stats.max_swr);
        let _ = writeln!(
            analysis,
            "Resonance frequency: {:.3} MHz",
            summary.resonance_mhz
        );
        match summary.bandwidth_mhz {
            Some(bw) => {
                let _ = writeln!(analysis, "3 dB bandwidth (SWR <= 2.0): {:.3} MHz", bw);
            }
            None => {
                let _ = writeln!(analysis, "3 dB bandwidth (SWR <= 2.0): none");
            }
        }
        let _ = writeln!(
            analysis,
            "Frequency range: {:.3} - {:.3} MHz",
            result.start_mhz, result.stop_mhz
        );
        for (label, count, share) in [
            ("Excellent (<=1.5)", stats.excellent_points, stats.excellent_ratio()),
            ("Good (<=2.0)", stats.good_points, stats.good_ratio()),
            ("Acceptable (<=3.0)", stats.acceptable_points, stats.acceptable_ratio()),
        ] {
            let _ = writeln!(
                analysis,
                "{}: {}/{} ({:.1}%)",
                label,
                count,
                stats.total_points,
                share * 100.0
            );
        }
        if result.status != SweepStatus::Complete {
            let _ = writeln!(
                analysis,
                "Sweep status: {} ({} of {} points)",
                result.status.as_str(),
                result.len(),
                result.requested_points
            );
            if let Some(failure) = &result.failure {
                let _ = writeln!(analysis, "Failure: {}", failure.message);
            }
        }
        if !recommendations.is_empty() {
            let _ = writeln!(analysis, "Recommendations:");
            for rec in &recommendations {
                let _ = writeln!(analysis, "- {}", rec);
            }
        }

        log::debug!(
            "[RatingEngine] score={} grade={} breakdown={:?}",
            score,
            grade,
            breakdown
        );

        Rating {
            score,
            grade,
            analysis: analysis.trim_end().to_string(),
            breakdown,
            stats: Some(stats),
            recommendations,
        }
    }
}

fn recommendations(score: u8, stats: &RatingStats) -> Vec<String> {
    let mut recs = Vec::new();

    recs.push(
        if score >= 85 {
            "Excellent antenna performance; no adjustments needed."
        } else if score >= 70 {
            "Good antenna performance; minor tuning could improve bandwidth."
        } else if score >= 50 {
            "Acceptable performance; consider adjusting antenna length or matching network."
        } else {
            "Poor performance; antenna requires significant adjustment or redesign."
        }
        .to_string(),
    );

    if stats.min_swr > GOOD_SWR {
        recs.push("Check antenna resonance; length may need adjustment.".to_string());
    }
    if stats.good_ratio() < 0.5 {
        recs.push("Consider adding a matching network to improve bandwidth.".to_string());
    }
    if stats.avg_swr > ACCEPTABLE_SWR {
        recs.push("Check all connections and ensure proper grounding.".to_string());
    }

    recs
}
