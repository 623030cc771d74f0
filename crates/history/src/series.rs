// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! One benchmark time series.
//!
//! A [`Series`] is owned by the store behind a per-key lock; nothing here is
//! synchronized on its own.

use benchwatch_core::{
    BenchmarkKey, Direction, Error, MeasurementReport, Record, RecordId, Result, Verdict,
};

/// Ordered records of one key plus the unit they share.
#[derive(Debug, Clone)]
pub struct Series {
    key: BenchmarkKey,
    unit: Option<String>,
    direction: Direction,
    records: Vec<Record>,
    next_id: RecordId,
}

impl Series {
    /// Create an empty series.
    pub fn new(key: BenchmarkKey, direction: Direction) -> Self {
        Self {
            key,
            unit: None,
            direction,
            records: Vec::new(),
            next_id: 0,
        }
    }

    /// Rebuild a series from persisted records.
    ///
    /// Records are re-sorted by (timestamp, id). The unit of the most recent
    /// record becomes the established unit; older records in another unit are
    /// kept but reported.
    pub fn from_records(key: BenchmarkKey, direction: Direction, mut records: Vec<Record>) -> Self {
        records.sort_by_key(Record::order_key);
        let unit = records.last().map(|r| r.unit.clone());
        if let Some(unit) = &unit {
            let foreign = records.iter().filter(|r| &r.unit != unit).count();
            if foreign > 0 {
                tracing::warn!(
                    key = %key,
                    unit = %unit,
                    foreign,
                    "persisted history mixes units; keeping the most recent one"
                );
            }
        }
        let next_id = records.iter().map(|r| r.id + 1).max().unwrap_or(0);
        Self {
            key,
            unit,
            direction,
            records,
            next_id,
        }
    }

    /// Key of this series.
    pub fn key(&self) -> &BenchmarkKey {
        &self.key
    }

    /// Established unit, `None` while empty.
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Declared direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Records in order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the series holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Most recent record.
    pub fn latest(&self) -> Option<&Record> {
        self.records.last()
    }

    /// Record by id.
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Fail with `UnitMismatch` if `unit` differs from the established unit.
    pub fn check_unit(&self, unit: &str) -> Result<()> {
        match &self.unit {
            Some(expected) if expected != unit => Err(Error::UnitMismatch {
                key: self.key.clone(),
                expected: expected.clone(),
                actual: unit.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Existing record with the same commit and bitwise-equal value.
    pub fn find_duplicate(&self, commit_id: &str, value: f64) -> Option<&Record> {
        self.records
            .iter()
            .find(|r| r.is_same_measurement(commit_id, value))
    }

    /// Insert an accepted report as a Pending record at its ordered position.
    pub fn insert(&mut self, report: MeasurementReport) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        if self.unit.is_none() {
            self.unit = Some(report.unit.clone());
        }
        let record = Record::from_report(id, report);
        let pos = self
            .records
            .partition_point(|r| r.order_key() <= record.order_key());
        self.records.insert(pos, record);
        id
    }

    /// Remove a record, used to roll back an insert that failed to commit.
    pub fn remove(&mut self, id: RecordId) -> Option<Record> {
        let pos = self.records.iter().position(|r| r.id == id)?;
        let record = self.records.remove(pos);
        if self.records.is_empty() {
            self.unit = None;
        }
        Some(record)
    }

    /// Attach a verdict to a Pending record.
    pub fn set_verdict(
        &mut self,
        id: RecordId,
        verdict: Verdict,
        score: Option<f64>,
    ) -> Result<&Record> {
        if verdict == Verdict::Pending {
            return Err(Error::InvalidVerdict(
                "pending is not a classification result".to_string(),
            ));
        }
        let key = &self.key;
        let record = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::RecordNotFound {
                key: key.clone(),
                record_id: id,
            })?;
        if record.verdict != Verdict::Pending {
            return Err(Error::AlreadyClassified {
                key: key.clone(),
                record_id: id,
                verdict: record.verdict,
            });
        }
        record.verdict = verdict;
        record.score = score;
        Ok(record)
    }

    /// Put a record back to Pending after its verdict failed to persist.
    pub(crate) fn reset_verdict(&mut self, id: RecordId) {
        if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
            record.verdict = Verdict::Pending;
            record.score = None;
        }
    }

    /// Most recent `n` records in chronological order.
    pub fn window(&self, n: usize) -> Vec<Record> {
        let start = self.records.len().saturating_sub(n);
        self.records[start..].to_vec()
    }

    /// Number of trailing records that must survive compaction so that the
    /// last `window` baseline-eligible records stay in history.
    pub fn retention_floor(&self, window: usize) -> usize {
        if window == 0 {
            return 0;
        }
        let mut eligible = 0;
        let mut earliest = None;
        for (pos, record) in self.records.iter().enumerate().rev() {
            if record.verdict.is_baseline_eligible() {
                eligible += 1;
                earliest = Some(pos);
                if eligible == window {
                    break;
                }
            }
        }
        earliest.map_or(0, |pos| self.records.len() - pos)
    }

    /// Drop the oldest records, keeping at least `keep` and never cutting
    /// into the baseline window. Returns the removed records.
    pub fn compact(&mut self, keep: usize, window: usize) -> Vec<Record> {
        let keep = keep.max(self.retention_floor(window));
        let cut = self.records.len().saturating_sub(keep);
        self.records.drain(..cut).collect()
    }

    /// Re-insert records removed by a compaction that failed to persist.
    pub(crate) fn restore(&mut self, removed: Vec<Record>) {
        self.records.extend(removed);
        self.records.sort_by_key(Record::order_key);
    }
}
