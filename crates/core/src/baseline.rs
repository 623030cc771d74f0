// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Rolling baseline estimation.
//!
//! The baseline of a series is the median of its recent accepted history,
//! with the median absolute deviation (MAD) as the noise estimate. Both are
//! insensitive to a single wild measurement from a noisy CI host, so no
//! separate outlier filter is needed.

use serde::{Deserialize, Serialize};

use crate::config::DetectionConfig;
use crate::record::{Record, RecordId};

/// Robust summary of recent history for one key.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
    /// Median value of the window.
    pub median: f64,
    /// Median absolute deviation from `median`.
    pub mad: f64,
    /// Number of records the window held.
    pub samples: usize,
}

impl Baseline {
    /// Summarize a non-empty set of values. Returns `None` when empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let median = median(values)?;
        let deviations: Vec<f64> = values.iter().map(|v| (v - median).abs()).collect();
        let mad = self::median(&deviations)?;
        Some(Self {
            median,
            mad,
            samples: values.len(),
        })
    }
}

/// Median of `values`; the mean of the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Estimate the baseline against which record `excluding` is classified.
///
/// `records` must be the series in order. Only the prefix before `excluding`
/// is consulted (the whole series if the id is absent), restricted to
/// Pass/Improvement records, and at most `config.window` of the most recent
/// ones. Returns `None` (no baseline) below `config.min_samples`; the caller
/// then classifies unconditionally as Pass.
pub fn estimate(
    records: &[Record],
    excluding: RecordId,
    config: &DetectionConfig,
) -> Option<Baseline> {
    let prefix = match records.iter().position(|r| r.id == excluding) {
        Some(pos) => &records[..pos],
        None => records,
    };

    let mut window: Vec<f64> = prefix
        .iter()
        .rev()
        .filter(|r| r.id != excluding && r.verdict.is_baseline_eligible())
        .take(config.window)
        .map(|r| r.value)
        .collect();
    window.reverse();

    if window.len() < config.min_samples {
        tracing::trace!(
            eligible = window.len(),
            min_samples = config.min_samples,
            "not enough history for a baseline"
        );
        return None;
    }

    Baseline::from_values(&window)
}
