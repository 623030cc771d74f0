// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! The benchmark history store.
//!
//! Each [`BenchmarkKey`] owns its series behind an async mutex. Everything
//! that touches one key (ingestion, baseline estimation, classification,
//! persistence, retention) runs inside that key's critical section, so
//! classification always sees a committed prefix of the series. Keys are held
//! in a sharded concurrent map and never wait on each other.

use benchwatch_core::baseline;
use benchwatch_core::{
    AlertSink, BenchmarkKey, DetectionConfig, Detector, DirectionPolicy, Error,
    MeasurementReport, NullSink, Record, RecordId, Result, Verdict, VerdictEvent,
};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::backend::HistoryBackend;
use crate::series::Series;

type SeriesHandle = Arc<Mutex<Series>>;

/// Result of a single `append`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendOutcome {
    /// The stored record, with its verdict attached.
    pub record: Record,
    /// True when the report re-submitted an existing measurement.
    pub is_duplicate: bool,
}

/// Result of a bulk import.
#[derive(Debug)]
pub struct ImportReport {
    /// Outcomes of the reports applied, in order.
    pub outcomes: Vec<AppendOutcome>,
    /// First failure, if the batch stopped early: (index in batch, error).
    pub failure: Option<(usize, Error)>,
}

impl ImportReport {
    /// Number of reports that created a new record.
    pub fn inserted(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.is_duplicate).count()
    }

    /// Number of reports that were duplicates.
    pub fn duplicates(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_duplicate).count()
    }

    /// Number of newly inserted records classified as regressions.
    pub fn regressions(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| !o.is_duplicate && o.record.verdict == Verdict::Regression)
            .count()
    }
}

/// Snapshot of one series for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct SeriesSummary {
    /// Series key.
    pub key: BenchmarkKey,
    /// Established unit.
    pub unit: Option<String>,
    /// Number of records.
    pub len: usize,
    /// Most recent record.
    pub latest: Option<Record>,
}

/// Builder for [`HistoryStore`].
pub struct HistoryStoreBuilder {
    backend: Arc<dyn HistoryBackend>,
    detection: DetectionConfig,
    directions: DirectionPolicy,
    sink: Arc<dyn AlertSink>,
}

impl HistoryStoreBuilder {
    /// Detection thresholds (default: [`DetectionConfig::default`]).
    pub fn detection(mut self, config: DetectionConfig) -> Self {
        self.detection = config;
        self
    }

    /// Per-key direction declarations (default: everything lower-is-better).
    pub fn directions(mut self, directions: DirectionPolicy) -> Self {
        self.directions = directions;
        self
    }

    /// Receiver of verdict events (default: [`NullSink`]).
    pub fn sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Validate the configuration and load persisted history.
    pub async fn open(self) -> Result<HistoryStore> {
        self.detection.validate()?;

        let loaded = self.backend.load().await?;
        let series = DashMap::new();
        let mut records = 0usize;
        for (key, history) in loaded {
            records += history.len();
            let direction = self.directions.direction_for(&key);
            let s = Series::from_records(key.clone(), direction, history);
            series.insert(key, Arc::new(Mutex::new(s)));
        }
        info!(series = series.len(), records, "history store opened");

        Ok(HistoryStore {
            series,
            backend: self.backend,
            detector: Detector::new(self.detection),
            directions: self.directions,
            sink: self.sink,
        })
    }
}

/// Append-only benchmark history with regression detection on ingestion.
pub struct HistoryStore {
    series: DashMap<BenchmarkKey, SeriesHandle>,
    backend: Arc<dyn HistoryBackend>,
    detector: Detector,
    directions: DirectionPolicy,
    sink: Arc<dyn AlertSink>,
}

impl std::fmt::Debug for HistoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryStore")
            .field("series", &self.series.len())
            .field("detection", self.detector.config())
            .finish_non_exhaustive()
    }
}

impl HistoryStore {
    /// Start building a store over `backend`.
    pub fn builder(backend: Arc<dyn HistoryBackend>) -> HistoryStoreBuilder {
        HistoryStoreBuilder {
            backend,
            detection: DetectionConfig::default(),
            directions: DirectionPolicy::default(),
            sink: Arc::new(NullSink),
        }
    }

    /// Detection configuration in use.
    pub fn detection(&self) -> &DetectionConfig {
        self.detector.config()
    }

    fn handle(&self, key: &BenchmarkKey) -> Option<SeriesHandle> {
        self.series.get(key).map(|entry| entry.value().clone())
    }

    fn handle_or_create(&self, key: &BenchmarkKey) -> SeriesHandle {
        self.series
            .entry(key.clone())
            .or_insert_with(|| {
                let direction = self.directions.direction_for(key);
                debug!(key = %key, ?direction, "new series");
                Arc::new(Mutex::new(Series::new(key.clone(), direction)))
            })
            .value()
            .clone()
    }

    /// Ingest one measurement.
    ///
    /// Returns only after the record is classified and durably committed.
    /// A re-submitted (commit, value) pair returns the stored record without
    /// running detection again.
    pub async fn append(&self, report: MeasurementReport) -> Result<AppendOutcome> {
        if let Err(e) = report.validate() {
            warn!(tool = %report.tool, name = %report.name, commit_id = %report.commit_id, error = %e, "rejected report");
            return Err(e);
        }
        let key = report.key();
        let handle = self.handle_or_create(&key);
        let mut series = handle.lock().await;

        if let Err(e) = series.check_unit(&report.unit) {
            warn!(key = %key, commit_id = %report.commit_id, error = %e, "rejected report");
            return Err(e);
        }

        if let Some(existing) = series.find_duplicate(&report.commit_id, report.value) {
            debug!(key = %key, commit_id = %report.commit_id, record_id = existing.id, "duplicate report");
            return Ok(AppendOutcome {
                record: existing.clone(),
                is_duplicate: true,
            });
        }

        let id = series.insert(report);
        let estimate = baseline::estimate(series.records(), id, self.detector.config());
        let classification = match series.get(id) {
            Some(record) => self
                .detector
                .classify(record, estimate.as_ref(), series.direction()),
            None => {
                return Err(Error::RecordNotFound {
                    key,
                    record_id: id,
                })
            }
        };

        let record = match series.set_verdict(id, classification.verdict, classification.score) {
            Ok(record) => record.clone(),
            Err(e) => {
                error!(key = %key, record_id = id, error = %e, "classification invariant violated");
                series.remove(id);
                return Err(e);
            }
        };

        if let Err(e) = self.backend.commit(&key, &record).await {
            error!(key = %key, commit_id = %record.commit_id, error = %e, "commit failed, rolling back");
            series.remove(id);
            return Err(e);
        }

        match record.verdict {
            Verdict::Regression => warn!(
                key = %key,
                commit_id = %record.commit_id,
                value = record.value,
                score = ?record.score,
                "regression detected"
            ),
            verdict => info!(
                key = %key,
                commit_id = %record.commit_id,
                value = record.value,
                %verdict,
                "record classified"
            ),
        }

        self.sink.dispatch(&VerdictEvent::new(&key, &record, estimate));

        Ok(AppendOutcome {
            record,
            is_duplicate: false,
        })
    }

    /// Backfill one key from an ordered batch.
    ///
    /// Each report goes through [`append`](Self::append) in order, so the batch
    /// is idempotent and may be replayed. The batch stops at the first error.
    pub async fn import(
        &self,
        key: &BenchmarkKey,
        reports: impl IntoIterator<Item = MeasurementReport>,
    ) -> ImportReport {
        let mut outcomes = Vec::new();
        for (index, report) in reports.into_iter().enumerate() {
            if report.tool != key.tool || report.name != key.name {
                let error = Error::invalid_record(format!(
                    "report for {} in a batch for {key}",
                    report.key()
                ));
                return ImportReport {
                    outcomes,
                    failure: Some((index, error)),
                };
            }
            match self.append(report).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(error) => {
                    warn!(key = %key, index, applied = outcomes.len(), error = %error, "import stopped");
                    return ImportReport {
                        outcomes,
                        failure: Some((index, error)),
                    };
                }
            }
        }
        info!(key = %key, applied = outcomes.len(), "import finished");
        ImportReport {
            outcomes,
            failure: None,
        }
    }

    /// Most recent `n` records of `key`, oldest first.
    pub async fn read_window(&self, key: &BenchmarkKey, n: usize) -> Vec<Record> {
        match self.handle(key) {
            Some(handle) => handle.lock().await.window(n),
            None => Vec::new(),
        }
    }

    /// Attach a verdict to a Pending record and persist it.
    ///
    /// `AlreadyClassified` means two writers raced on one record, which per-key
    /// serialization rules out; it is logged as an error and returned.
    pub async fn set_verdict(
        &self,
        key: &BenchmarkKey,
        record_id: RecordId,
        verdict: Verdict,
    ) -> Result<Record> {
        let handle = self.handle(key).ok_or_else(|| Error::RecordNotFound {
            key: key.clone(),
            record_id,
        })?;
        let mut series = handle.lock().await;

        let record = match series.set_verdict(record_id, verdict, None) {
            Ok(record) => record.clone(),
            Err(e) => {
                if matches!(e, Error::AlreadyClassified { .. }) {
                    error!(key = %key, record_id, error = %e, "double classification attempted");
                }
                return Err(e);
            }
        };

        if let Err(e) = self.backend.update_verdict(key, &record).await {
            series.reset_verdict(record_id);
            return Err(e);
        }
        Ok(record)
    }

    /// Operator retention pass: drop the oldest records of `key`, keeping at
    /// least `keep` and always the current baseline window. Returns the
    /// removed records.
    pub async fn compact(&self, key: &BenchmarkKey, keep: usize) -> Result<Vec<Record>> {
        let Some(handle) = self.handle(key) else {
            return Ok(Vec::new());
        };
        let mut series = handle.lock().await;
        let removed = series.compact(keep, self.detector.config().window);
        if removed.is_empty() {
            return Ok(removed);
        }
        if let Err(e) = self.backend.remove(key, &removed).await {
            error!(key = %key, error = %e, "compaction failed to persist, restoring");
            series.restore(removed);
            return Err(e);
        }
        info!(key = %key, removed = removed.len(), kept = series.len(), "series compacted");
        Ok(removed)
    }

    /// All records of `key`, in order.
    pub async fn series(&self, key: &BenchmarkKey) -> Option<Vec<Record>> {
        match self.handle(key) {
            Some(handle) => Some(handle.lock().await.records().to_vec()),
            None => None,
        }
    }

    /// Every known key, sorted.
    pub fn keys(&self) -> Vec<BenchmarkKey> {
        let mut keys: Vec<_> = self.series.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Summary of every non-empty series, sorted by key.
    pub async fn summaries(&self) -> Vec<SeriesSummary> {
        let mut summaries = Vec::new();
        for key in self.keys() {
            let Some(handle) = self.handle(&key) else {
                continue;
            };
            let series = handle.lock().await;
            if series.is_empty() {
                continue;
            }
            summaries.push(SeriesSummary {
                key,
                unit: series.unit().map(str::to_string),
                len: series.len(),
                latest: series.latest().cloned(),
            });
        }
        summaries
    }
}
