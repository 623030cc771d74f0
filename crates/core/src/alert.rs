// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Verdict notification contract.
//!
//! The history store hands every fresh verdict to an [`AlertSink`]. Sinks are
//! fire-and-forget: delivery failures are theirs to log and retry, and they
//! never reach back into history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::baseline::Baseline;
use crate::record::{BenchmarkKey, Record, Verdict};

/// Payload describing one classified record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerdictEvent {
    /// Series the record belongs to.
    pub key: BenchmarkKey,
    /// Commit the measurement was taken at.
    pub commit_id: String,
    /// Classification result.
    pub verdict: Verdict,
    /// Deviation in MADs, absent on cold start.
    pub score: Option<f64>,
    /// Baseline the record was compared against, absent on cold start.
    pub baseline: Option<Baseline>,
    /// Measured value.
    pub value: f64,
    /// Unit of `value`.
    pub unit: String,
    /// Reporter-supplied instant of the measurement.
    pub timestamp: DateTime<Utc>,
}

impl VerdictEvent {
    /// Build an event for a classified record.
    pub fn new(key: &BenchmarkKey, record: &Record, baseline: Option<Baseline>) -> Self {
        Self {
            key: key.clone(),
            commit_id: record.commit_id.clone(),
            verdict: record.verdict,
            score: record.score,
            baseline,
            value: record.value,
            unit: record.unit.clone(),
            timestamp: record.timestamp,
        }
    }
}

/// Receiver of verdict events.
///
/// `dispatch` is called while the series lock is held, so implementations
/// must return promptly and hand slow work (network I/O) to a background
/// task.
pub trait AlertSink: Send + Sync {
    /// Deliver an event. Never fails from the caller's point of view.
    fn dispatch(&self, event: &VerdictEvent);
}

impl<T: AlertSink + ?Sized> AlertSink for Arc<T> {
    fn dispatch(&self, event: &VerdictEvent) {
        (**self).dispatch(event)
    }
}

impl<T: AlertSink + ?Sized> AlertSink for Box<T> {
    fn dispatch(&self, event: &VerdictEvent) {
        (**self).dispatch(event)
    }
}

/// Sink that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl AlertSink for NullSink {
    fn dispatch(&self, _event: &VerdictEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MeasurementReport;
    use chrono::TimeZone;

    #[test]
    fn test_event_payload_shape() {
        let key = BenchmarkKey::new("cargo", "parse");
        let report = MeasurementReport::new(
            &key,
            "e019531d",
            Utc.with_ymd_and_hms(2025, 8, 27, 19, 25, 22).unwrap(),
            140.0,
            "ns/iter",
        );
        let mut record = Record::from_report(0, report);
        record.verdict = Verdict::Regression;
        record.score = Some(40.0);
        let baseline = Baseline::from_values(&[100.0, 102.0, 98.0]).unwrap();

        let event = VerdictEvent::new(&key, &record, Some(baseline));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["key"]["tool"], "cargo");
        assert_eq!(json["key"]["name"], "parse");
        assert_eq!(json["commitId"], "e019531d");
        assert_eq!(json["verdict"], "regression");
        assert_eq!(json["score"], 40.0);
        assert_eq!(json["baseline"]["median"], 100.0);
        assert_eq!(json["baseline"]["mad"], 2.0);
    }
}
