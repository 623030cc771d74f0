// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Verdict events as structured log lines.

use benchwatch_core::{AlertSink, Verdict, VerdictEvent};
use tracing::{info, warn};

/// Sink writing one `tracing` event per verdict: WARN for regressions and
/// INFO for everything else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl AlertSink for LogSink {
    fn dispatch(&self, event: &VerdictEvent) {
        let median = event.baseline.map(|b| b.median);
        if event.verdict == Verdict::Regression {
            warn!(
                target: "benchwatch::alert",
                key = %event.key,
                commit_id = %event.commit_id,
                value = event.value,
                unit = %event.unit,
                baseline = ?median,
                score = ?event.score,
                "benchmark regressed"
            );
        } else {
            info!(
                target: "benchwatch::alert",
                key = %event.key,
                commit_id = %event.commit_id,
                verdict = %event.verdict,
                value = event.value,
                unit = %event.unit,
                baseline = ?median,
                score = ?event.score,
                "benchmark classified"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use benchwatch_core::{Baseline, BenchmarkKey, MeasurementReport, Record};
    use chrono::Utc;
    use std::fmt;
    use std::sync::{Arc, Mutex};
    use tracing::field::{Field, Visit};
    use tracing::{Event, Level, Subscriber};
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    /// Level, target and message of every event seen.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<(Level, String, String)>>>);

    struct MessageVisitor(String);

    impl Visit for MessageVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
            if field.name() == "message" {
                self.0 = format!("{value:?}");
            }
        }
    }

    impl<S: Subscriber> Layer<S> for Captured {
        fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
            let mut visitor = MessageVisitor(String::new());
            event.record(&mut visitor);
            let meta = event.metadata();
            self.0
                .lock()
                .unwrap()
                .push((*meta.level(), meta.target().to_string(), visitor.0));
        }
    }

    fn dispatch_captured(verdict: Verdict) -> Vec<(Level, String, String)> {
        let key = BenchmarkKey::new("cargo", "parse");
        let mut record =
            Record::from_report(0, MeasurementReport::new(&key, "abc", Utc::now(), 140.0, "ns"));
        record.verdict = verdict;
        let event = VerdictEvent::new(&key, &record, Baseline::from_values(&[100.0, 101.0, 99.0]));

        let captured = Captured::default();
        let subscriber = tracing_subscriber::registry().with(captured.clone());
        tracing::subscriber::with_default(subscriber, || LogSink.dispatch(&event));
        let lines = captured.0.lock().unwrap().clone();
        lines
    }

    #[test]
    fn test_regression_logs_at_warn() {
        let lines = dispatch_captured(Verdict::Regression);
        assert_eq!(lines.len(), 1);
        let (level, target, message) = &lines[0];
        assert_eq!(*level, Level::WARN);
        assert_eq!(target, "benchwatch::alert");
        assert_eq!(message, "benchmark regressed");
    }

    #[test]
    fn test_other_verdicts_log_at_info() {
        for verdict in [Verdict::Pass, Verdict::Improvement] {
            let lines = dispatch_captured(verdict);
            assert_eq!(lines.len(), 1, "{verdict}");
            let (level, target, message) = &lines[0];
            assert_eq!(*level, Level::INFO, "{verdict}");
            assert_eq!(target, "benchwatch::alert");
            assert_eq!(message, "benchmark classified");
        }
    }
}
