// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Regression classification.
//!
//! A record is scored as its deviation from the baseline median in units of
//! MAD. The score is compared against a symmetric threshold, with the sign
//! flipped for benchmarks where a higher value is better. Classification is a
//! pure function of (record, baseline, direction, config), so re-running it
//! during compaction or an audit always reproduces the stored verdict.

use serde::{Deserialize, Serialize};

use crate::baseline::Baseline;
use crate::config::DetectionConfig;
use crate::record::{Direction, Record, Verdict};

/// Verdict plus the score that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Final verdict.
    pub verdict: Verdict,
    /// Deviation in MADs, positive when the value rose. `None` on cold start.
    pub score: Option<f64>,
}

impl Classification {
    /// Classification for a record with no baseline to compare against.
    pub fn cold_start() -> Self {
        Self {
            verdict: Verdict::Pass,
            score: None,
        }
    }
}

/// Applies the threshold policy of a [`DetectionConfig`].
#[derive(Debug, Clone, Default)]
pub struct Detector {
    config: DetectionConfig,
}

impl Detector {
    /// Create a detector.
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    /// Configuration in use.
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Divisor used to normalize deviations against `baseline`.
    pub fn noise_floor(&self, baseline: &Baseline) -> f64 {
        let floor = self
            .config
            .epsilon_floor
            .max(self.config.relative_epsilon * baseline.median.abs());
        baseline.mad.max(floor)
    }

    /// Classify `record` against `baseline`.
    ///
    /// Without a baseline the record passes unconditionally. A record whose
    /// own error bar (`range`) is wider than its deviation is capped at Pass.
    pub fn classify(
        &self,
        record: &Record,
        baseline: Option<&Baseline>,
        direction: Direction,
    ) -> Classification {
        let Some(baseline) = baseline else {
            return Classification::cold_start();
        };

        let deviation = record.value - baseline.median;
        let score = deviation / self.noise_floor(baseline);

        // Positive means "worse" from here on.
        let worse = match direction {
            Direction::LowerIsBetter => score,
            Direction::HigherIsBetter => -score,
        };

        let verdict = if record.range > deviation.abs() {
            Verdict::Pass
        } else if worse > self.config.threshold {
            Verdict::Regression
        } else if worse < -self.config.threshold {
            Verdict::Improvement
        } else {
            Verdict::Pass
        };

        Classification {
            verdict,
            score: Some(score),
        }
    }
}
