// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Persisted history document.
//!
//! The on-disk shape is the one CI benchmark dashboards already publish:
//! an object whose `entries` map each tool to an ordered list of commit
//! entries, every entry carrying the benches measured at that commit.
//!
//! ```text
//! { "lastUpdate": 1756326406960,
//!   "repoUrl": "https://github.com/org/repo",
//!   "entries": { "Benchmark": [ { "commit": { "id": "e019531d", ... },
//!                                 "date": 1756326405126,
//!                                 "tool": "cargo",
//!                                 "benches": [ { "name": "...", "value": 1,
//!                                                "range": "± 4", "unit": "ns/iter" } ] } ] } }
//! ```
//!
//! Every level keeps the fields it does not understand in an `extra` map so
//! that rewriting a document never drops data written by a newer (or older)
//! producer.

use benchwatch_core::{BenchmarkKey, MeasurementReport, Record, Verdict};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// The whole persisted history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDocument {
    /// Milliseconds since the epoch of the last write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<i64>,
    /// Repository the history belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,
    /// Tool identifier to ordered commit entries.
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<Entry>>,
    /// Unknown top-level fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Benches measured for one commit in one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Commit the run was for.
    pub commit: CommitInfo,
    /// Milliseconds since the epoch when the run reported.
    pub date: i64,
    /// Harness that produced the benches (e.g. `cargo`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
    /// Measurements.
    #[serde(default)]
    pub benches: Vec<Bench>,
    /// Unknown entry fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Commit metadata. Only `id` is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitInfo {
    /// Revision identifier.
    pub id: String,
    /// Author, committer, message, url, timestamp and anything else.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One measurement inside an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bench {
    /// Benchmark case name.
    pub name: String,
    /// Measured value, kept as written.
    pub value: Number,
    /// Uncertainty, either a number or a string such as `"± 475209743"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<Value>,
    /// Unit of `value`.
    pub unit: String,
    /// Classification, absent on history written before detection existed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verdict: Option<Verdict>,
    /// Score at classification time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Unknown bench fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bench {
    /// Value as a float.
    pub fn value_f64(&self) -> f64 {
        self.value.as_f64().unwrap_or(f64::NAN)
    }

    /// Range as a float, 0 when absent or unparseable.
    pub fn range_f64(&self) -> f64 {
        match &self.range {
            Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Some(Value::String(s)) => parse_range(s).unwrap_or(0.0),
            _ => 0.0,
        }
    }

    fn matches(&self, name: &str, value: f64) -> bool {
        self.name == name && self.value_f64().to_bits() == value.to_bits()
    }
}

/// Parse a range string like `"± 475209743"`, `"+/- 1.5"` or `"3"`.
pub fn parse_range(text: &str) -> Option<f64> {
    let trimmed = text
        .trim()
        .trim_start_matches('±')
        .trim_start_matches("+/-")
        .trim();
    trimmed.parse::<f64>().ok().filter(|r| r.is_finite())
}

/// Render a range the way dashboards display it.
pub fn format_range(range: f64) -> String {
    format!("± {}", range)
}

/// Integral values are written without a fractional part so that nanosecond
/// counts look the way harnesses print them.
fn number_from(value: f64) -> Number {
    const MAX_EXACT: f64 = 9_007_199_254_740_992.0;
    if value.fract() == 0.0 && value.abs() < MAX_EXACT {
        if value >= 0.0 {
            return Number::from(value as u64);
        }
        return Number::from(value as i64);
    }
    Number::from_f64(value).unwrap_or_else(|| Number::from(0))
}

fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
}

impl HistoryDocument {
    /// Convert every bench into a record, grouped by key in document order.
    ///
    /// Record ids are assigned per key in that order. Benches without a
    /// verdict are legacy history and load as [`Verdict::Pass`].
    pub fn to_series(&self) -> BTreeMap<BenchmarkKey, Vec<Record>> {
        let mut series: BTreeMap<BenchmarkKey, Vec<Record>> = BTreeMap::new();
        for (tool, entries) in &self.entries {
            for entry in entries {
                for bench in &entry.benches {
                    let key = BenchmarkKey::new(tool.clone(), bench.name.clone());
                    let records = series.entry(key).or_default();
                    records.push(Record {
                        id: records.len() as u64,
                        commit_id: entry.commit.id.clone(),
                        timestamp: millis_to_datetime(entry.date),
                        value: bench.value_f64(),
                        range: bench.range_f64(),
                        unit: bench.unit.clone(),
                        verdict: bench.verdict.unwrap_or(Verdict::Pass),
                        score: bench.score,
                        commit: entry.commit.extra.clone(),
                        harness: entry.tool.clone(),
                    });
                }
            }
        }
        series
    }

    /// Convert every bench back into a report, grouped by key in document
    /// order, for replaying a document through ingestion.
    pub fn to_reports(&self) -> BTreeMap<BenchmarkKey, Vec<MeasurementReport>> {
        let mut reports: BTreeMap<BenchmarkKey, Vec<MeasurementReport>> = BTreeMap::new();
        for (tool, entries) in &self.entries {
            for entry in entries {
                for bench in &entry.benches {
                    let key = BenchmarkKey::new(tool.clone(), bench.name.clone());
                    let mut report = MeasurementReport::new(
                        &key,
                        entry.commit.id.clone(),
                        millis_to_datetime(entry.date),
                        bench.value_f64(),
                        bench.unit.clone(),
                    )
                    .with_range(bench.range_f64());
                    report.commit = entry.commit.extra.clone();
                    report.harness = entry.tool.clone();
                    reports.entry(key).or_default().push(report);
                }
            }
        }
        reports
    }

    /// Add a classified record.
    ///
    /// Benches of the same run (same commit and report time) share an entry;
    /// anything else opens a new entry at the end of the tool's list.
    pub fn append(&mut self, key: &BenchmarkKey, record: &Record) {
        let date = record.timestamp.timestamp_millis();
        let bench = Bench {
            name: key.name.clone(),
            value: number_from(record.value),
            range: Some(Value::String(format_range(record.range))),
            unit: record.unit.clone(),
            verdict: Some(record.verdict),
            score: record.score,
            extra: Map::new(),
        };

        let entries = self.entries.entry(key.tool.clone()).or_default();
        let shared = entries.iter_mut().rev().find(|e| {
            e.commit.id == record.commit_id
                && e.date == date
                && !e.benches.iter().any(|b| b.name == key.name)
        });

        match shared {
            Some(entry) => entry.benches.push(bench),
            None => entries.push(Entry {
                commit: CommitInfo {
                    id: record.commit_id.clone(),
                    extra: record.commit.clone(),
                },
                date,
                tool: record.harness.clone(),
                benches: vec![bench],
                extra: Map::new(),
            }),
        }
    }

    /// Rewrite the verdict and score of the bench matching `record`.
    /// Returns false when no bench matches.
    pub fn update_verdict(&mut self, key: &BenchmarkKey, record: &Record) -> bool {
        match self.find_bench_mut(key, record) {
            Some(bench) => {
                bench.verdict = Some(record.verdict);
                bench.score = record.score;
                true
            }
            None => false,
        }
    }

    /// Remove the bench matching `record`, dropping its entry once empty.
    /// Returns false when no bench matches.
    pub fn remove(&mut self, key: &BenchmarkKey, record: &Record) -> bool {
        let Some(entries) = self.entries.get_mut(&key.tool) else {
            return false;
        };
        let date = record.timestamp.timestamp_millis();
        let mut removed = false;
        for entry in entries
            .iter_mut()
            .filter(|e| e.commit.id == record.commit_id && e.date == date)
        {
            if let Some(pos) = entry
                .benches
                .iter()
                .position(|b| b.matches(&key.name, record.value))
            {
                entry.benches.remove(pos);
                removed = true;
                break;
            }
        }
        entries.retain(|e| !e.benches.is_empty());
        if entries.is_empty() {
            self.entries.remove(&key.tool);
        }
        removed
    }

    /// Stamp the document with the current time.
    pub fn touch(&mut self) {
        self.last_update = Some(Utc::now().timestamp_millis());
    }

    fn find_bench_mut(&mut self, key: &BenchmarkKey, record: &Record) -> Option<&mut Bench> {
        let date = record.timestamp.timestamp_millis();
        self.entries
            .get_mut(&key.tool)?
            .iter_mut()
            .filter(|e| e.commit.id == record.commit_id && e.date == date)
            .flat_map(|e| e.benches.iter_mut())
            .find(|b| b.matches(&key.name, record.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> HistoryDocument {
        serde_json::from_value(json!({
            "lastUpdate": 1756326406960i64,
            "repoUrl": "https://github.com/emirongrr/ethrex",
            "entries": {
                "Benchmark": [{
                    "commit": {
                        "author": { "name": "Avila Gastón", "username": "avilagaston9" },
                        "distinct": true,
                        "id": "e019531dfdc25fb92e0413213d72eb9e7c2171f4",
                        "message": "feat(l2): deposit rich accounts by default (#4184)",
                        "timestamp": "2025-08-27T19:25:22Z"
                    },
                    "date": 1756326405126i64,
                    "tool": "cargo",
                    "benches": [{
                        "name": "Block import/Block import ERC20 transfers",
                        "value": 158292890627u64,
                        "range": "± 475209743",
                        "unit": "ns/iter"
                    }]
                }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_parse_range_forms() {
        assert_eq!(parse_range("± 475209743"), Some(475_209_743.0));
        assert_eq!(parse_range("+/- 1.5"), Some(1.5));
        assert_eq!(parse_range("3"), Some(3.0));
        assert_eq!(parse_range("n/a"), None);
    }

    #[test]
    fn test_legacy_bench_loads_as_pass() {
        let series = sample().to_series();
        let key = BenchmarkKey::new("Benchmark", "Block import/Block import ERC20 transfers");
        let records = &series[&key];
        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!(r.verdict, Verdict::Pass);
        assert_eq!(r.value, 158_292_890_627.0);
        assert_eq!(r.range, 475_209_743.0);
        assert_eq!(r.timestamp.timestamp_millis(), 1_756_326_405_126);
        assert_eq!(r.harness.as_deref(), Some("cargo"));
        assert_eq!(r.commit["distinct"], json!(true));
    }

    #[test]
    fn test_unknown_fields_survive_round_trip() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value["schemaVersion"] = json!(2);
        value["entries"]["Benchmark"][0]["runner"] = json!("ubuntu-latest");
        value["entries"]["Benchmark"][0]["benches"][0]["extra"] = json!("x");

        let doc: HistoryDocument = serde_json::from_value(value.clone()).unwrap();
        let back = serde_json::to_value(&doc).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn test_integral_value_written_without_fraction() {
        let doc = sample();
        let text = serde_json::to_string(&doc).unwrap();
        assert!(text.contains("\"value\":158292890627,"));
        assert!(text.contains("\"range\":\"± 475209743\""));
    }

    #[test]
    fn test_append_groups_benches_of_one_run() {
        let mut doc = HistoryDocument::default();
        let ts = Utc.timestamp_millis_opt(1_000).unwrap();
        for name in ["parse", "render"] {
            let key = BenchmarkKey::new("cargo", name);
            let mut record =
                Record::from_report(0, MeasurementReport::new(&key, "abc", ts, 12.0, "ns"));
            record.verdict = Verdict::Pass;
            doc.append(&key, &record);
        }
        let entries = &doc.entries["cargo"];
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].benches.len(), 2);
        assert_eq!(entries[0].benches[0].verdict, Some(Verdict::Pass));
    }

    #[test]
    fn test_append_rerun_opens_new_entry() {
        let mut doc = HistoryDocument::default();
        let key = BenchmarkKey::new("cargo", "parse");
        let ts = Utc.timestamp_millis_opt(1_000).unwrap();
        let first = Record::from_report(0, MeasurementReport::new(&key, "abc", ts, 12.0, "ns"));
        let second = Record::from_report(1, MeasurementReport::new(&key, "abc", ts, 13.0, "ns"));
        doc.append(&key, &first);
        doc.append(&key, &second);
        assert_eq!(doc.entries["cargo"].len(), 2);
    }

    #[test]
    fn test_remove_drops_empty_entries() {
        let mut doc = sample();
        let key = BenchmarkKey::new("Benchmark", "Block import/Block import ERC20 transfers");
        let record = doc.to_series()[&key][0].clone();
        assert!(doc.remove(&key, &record));
        assert!(doc.entries.is_empty());
        assert!(!doc.remove(&key, &record));
    }

    #[test]
    fn test_to_reports_carries_metadata() {
        let reports = sample().to_reports();
        let key = BenchmarkKey::new("Benchmark", "Block import/Block import ERC20 transfers");
        let report = &reports[&key][0];
        assert_eq!(report.commit_id, "e019531dfdc25fb92e0413213d72eb9e7c2171f4");
        assert_eq!(report.range, 475_209_743.0);
        assert_eq!(report.harness.as_deref(), Some("cargo"));
        assert!(report.commit.contains_key("message"));
        assert!(report.validate().is_ok());
    }

    #[test]
    fn test_update_verdict() {
        let mut doc = sample();
        let key = BenchmarkKey::new("Benchmark", "Block import/Block import ERC20 transfers");
        let mut record = doc.to_series()[&key][0].clone();
        record.verdict = Verdict::Regression;
        record.score = Some(9.0);
        assert!(doc.update_verdict(&key, &record));
        let bench = &doc.entries["Benchmark"][0].benches[0];
        assert_eq!(bench.verdict, Some(Verdict::Regression));
        assert_eq!(bench.score, Some(9.0));
    }
}
