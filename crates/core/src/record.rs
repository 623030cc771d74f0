// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Measurement record model.
//!
//! A [`MeasurementReport`] is what a reporter (a CI job) submits. Once the
//! history store accepts it, it becomes a [`Record`] with a sequence number
//! and a [`Verdict`]. Records are grouped into independent time series by
//! [`BenchmarkKey`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};

/// Sequence number of a record inside its series.
///
/// Assigned in insertion order; breaks ties between equal timestamps.
pub type RecordId = u64;

/// Identity of one independent benchmark time series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BenchmarkKey {
    /// Tool (suite) identifier, the top-level grouping of persisted history.
    pub tool: String,
    /// Benchmark case name within the tool.
    pub name: String,
}

impl BenchmarkKey {
    /// Create a new key.
    pub fn new(tool: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for BenchmarkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.tool, self.name)
    }
}

/// Classification of a record relative to its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// Accepted but not yet classified.
    #[default]
    Pending,
    /// Within noise of the baseline.
    Pass,
    /// Worse than the baseline beyond the threshold.
    Regression,
    /// Better than the baseline beyond the threshold.
    Improvement,
}

impl Verdict {
    /// Whether a record with this verdict may feed a baseline.
    ///
    /// Pending records are unclassified and Regression records would drag the
    /// baseline toward a sustained regression.
    pub fn is_baseline_eligible(self) -> bool {
        matches!(self, Self::Pass | Self::Improvement)
    }

    /// Whether the verdict should be brought to someone's attention.
    pub fn is_flagged(self) -> bool {
        matches!(self, Self::Regression | Self::Improvement)
    }

    /// Lowercase name, as persisted.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Pass => "pass",
            Self::Regression => "regression",
            Self::Improvement => "improvement",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which direction of change counts as worse for a benchmark.
///
/// Declared per key in configuration, never inferred from values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Latency, time per iteration, memory: a higher value is a regression.
    #[default]
    LowerIsBetter,
    /// Throughput, operations per second: a lower value is a regression.
    HigherIsBetter,
}

/// One measurement as submitted by a reporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementReport {
    /// Tool (suite) identifier.
    pub tool: String,
    /// Benchmark case name.
    pub name: String,
    /// Source-control revision the measurement was taken at.
    pub commit_id: String,
    /// Wall-clock instant supplied by the reporter.
    pub timestamp: DateTime<Utc>,
    /// Measured quantity.
    pub value: f64,
    /// Reported uncertainty of `value`, zero when unknown.
    #[serde(default)]
    pub range: f64,
    /// Unit of `value`; must match the series.
    pub unit: String,
    /// Opaque commit metadata (author, message, url) carried into history.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub commit: Map<String, Value>,
    /// Benchmark harness that produced the value (e.g. `cargo`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harness: Option<String>,
}

impl MeasurementReport {
    /// Create a report with no range and no commit metadata.
    pub fn new(
        key: &BenchmarkKey,
        commit_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        value: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            tool: key.tool.clone(),
            name: key.name.clone(),
            commit_id: commit_id.into(),
            timestamp,
            value,
            range: 0.0,
            unit: unit.into(),
            commit: Map::new(),
            harness: None,
        }
    }

    /// Set the reported uncertainty.
    pub fn with_range(mut self, range: f64) -> Self {
        self.range = range;
        self
    }

    /// Set the harness name.
    pub fn with_harness(mut self, harness: impl Into<String>) -> Self {
        self.harness = Some(harness.into());
        self
    }

    /// Key of the series this report belongs to.
    pub fn key(&self) -> BenchmarkKey {
        BenchmarkKey::new(self.tool.clone(), self.name.clone())
    }

    /// Reject reports that must never reach history.
    pub fn validate(&self) -> Result<()> {
        if self.tool.trim().is_empty() {
            return Err(Error::invalid_record("tool identifier is empty"));
        }
        if self.name.trim().is_empty() {
            return Err(Error::invalid_record("benchmark name is empty"));
        }
        if self.commit_id.trim().is_empty() {
            return Err(Error::invalid_record("commit id is empty"));
        }
        if self.unit.trim().is_empty() {
            return Err(Error::invalid_record("unit is empty"));
        }
        if !self.value.is_finite() {
            return Err(Error::invalid_record(format!(
                "value must be finite, got {}",
                self.value
            )));
        }
        if !self.range.is_finite() || self.range < 0.0 {
            return Err(Error::invalid_record(format!(
                "range must be a finite non-negative number, got {}",
                self.range
            )));
        }
        Ok(())
    }
}

/// A stored measurement.
///
/// Measurement fields never change after ingestion; `verdict` and `score` are
/// attached exactly once by the detection pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Sequence number within the series.
    pub id: RecordId,
    /// Source-control revision.
    pub commit_id: String,
    /// Reporter-supplied instant.
    pub timestamp: DateTime<Utc>,
    /// Measured quantity.
    pub value: f64,
    /// Reported uncertainty.
    pub range: f64,
    /// Unit of `value`.
    pub unit: String,
    /// Classification result.
    pub verdict: Verdict,
    /// Normalized deviation from the baseline, when one existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Opaque commit metadata supplied with the report.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub commit: Map<String, Value>,
    /// Harness that produced the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub harness: Option<String>,
}

impl Record {
    /// Build an unclassified record from an accepted report.
    pub fn from_report(id: RecordId, report: MeasurementReport) -> Self {
        Self {
            id,
            commit_id: report.commit_id,
            timestamp: report.timestamp,
            value: report.value,
            range: report.range,
            unit: report.unit,
            verdict: Verdict::Pending,
            score: None,
            commit: report.commit,
            harness: report.harness,
        }
    }

    /// Whether a report re-submits this exact measurement.
    ///
    /// Values compare bitwise so that `0.0` and `-0.0` stay distinct and the
    /// check never depends on floating-point tolerance.
    pub fn is_same_measurement(&self, commit_id: &str, value: f64) -> bool {
        self.commit_id == commit_id && self.value.to_bits() == value.to_bits()
    }

    /// Ordering key inside a series: timestamp, then insertion order.
    pub fn order_key(&self) -> (DateTime<Utc>, RecordId) {
        (self.timestamp, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn report(value: f64, range: f64) -> MeasurementReport {
        let key = BenchmarkKey::new("cargo", "Block import/ERC20 transfers");
        MeasurementReport::new(
            &key,
            "e019531d",
            Utc.timestamp_millis_opt(1_756_326_405_126).unwrap(),
            value,
            "ns/iter",
        )
        .with_range(range)
    }

    #[test]
    fn test_key_display() {
        let key = BenchmarkKey::new("Benchmark", "Block import/ERC20 transfers");
        assert_eq!(key.to_string(), "Benchmark::Block import/ERC20 transfers");
    }

    #[test]
    fn test_validate_accepts_zero_range() {
        assert!(report(158_292_890_627.0, 0.0).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_finite_value() {
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = report(value, 0.0).validate().unwrap_err();
            assert!(matches!(err, Error::InvalidRecord(_)));
        }
    }

    #[test]
    fn test_validate_rejects_negative_range() {
        let err = report(10.0, -1.0).validate().unwrap_err();
        assert!(err.to_string().contains("range"));
    }

    #[test]
    fn test_validate_rejects_empty_commit() {
        let mut r = report(10.0, 0.0);
        r.commit_id = "  ".to_string();
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_same_measurement_is_bitwise() {
        let record = Record::from_report(0, report(0.0, 0.0));
        assert!(record.is_same_measurement("e019531d", 0.0));
        assert!(!record.is_same_measurement("e019531d", -0.0));
        assert!(!record.is_same_measurement("other", 0.0));
    }

    #[test]
    fn test_from_report_starts_pending() {
        let record = Record::from_report(7, report(12.0, 1.0));
        assert_eq!(record.id, 7);
        assert_eq!(record.verdict, Verdict::Pending);
        assert!(record.score.is_none());
    }

    #[test]
    fn test_verdict_serialization() {
        assert_eq!(
            serde_json::to_string(&Verdict::Regression).unwrap(),
            "\"regression\""
        );
        let d: Direction = serde_json::from_str("\"higher_is_better\"").unwrap();
        assert_eq!(d, Direction::HigherIsBetter);
    }

    #[test]
    fn test_report_deserializes_camel_case() {
        let json = serde_json::json!({
            "tool": "cargo",
            "name": "parse",
            "commitId": "abc",
            "timestamp": "2025-08-27T19:25:22Z",
            "value": 12.5,
            "unit": "ns/iter"
        });
        let r: MeasurementReport = serde_json::from_value(json).unwrap();
        assert_eq!(r.commit_id, "abc");
        assert_eq!(r.range, 0.0);
        assert!(r.commit.is_empty());
    }
}
