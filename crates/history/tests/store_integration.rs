// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! End-to-end behaviour of the history store over real backends.

use async_trait::async_trait;
use benchwatch_core::{
    AlertSink, BenchmarkKey, DetectionConfig, Direction, DirectionOverride, DirectionPolicy,
    MeasurementReport, Record, Result, Verdict, VerdictEvent,
};
use benchwatch_history::{io, FileBackend, HistoryBackend, HistoryStore, MemoryBackend};
use chrono::{DateTime, Duration, TimeZone, Utc};
use mockall::mock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Notify;

mock! {
    pub Sink {}

    impl AlertSink for Sink {
        fn dispatch(&self, event: &VerdictEvent);
    }
}

fn at(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, 27, 19, 0, 0).unwrap() + Duration::minutes(minute)
}

fn report(key: &BenchmarkKey, commit: &str, minute: i64, value: f64) -> MeasurementReport {
    MeasurementReport::new(key, commit, at(minute), value, "ns/iter")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_appends_to_one_key_are_all_stored() {
    let store = Arc::new(
        HistoryStore::builder(Arc::new(MemoryBackend::new()))
            .open()
            .await
            .unwrap(),
    );
    let key = BenchmarkKey::new("cargo", "block_import");

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let store = store.clone();
            let report = report(&key, &format!("commit{i}"), i, 100.0 + (i % 4) as f64);
            tokio::spawn(async move { store.append(report).await })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        let outcome = result.unwrap().unwrap();
        assert!(!outcome.is_duplicate);
        assert_ne!(outcome.record.verdict, Verdict::Pending);
    }

    let records = store.series(&key).await.unwrap();
    assert_eq!(records.len(), 32);
    let mut ids: Vec<_> = records.iter().map(|r| r.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 32);
    assert!(records.windows(2).all(|w| w[0].order_key() <= w[1].order_key()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_duplicates_store_one_record() {
    let store = Arc::new(
        HistoryStore::builder(Arc::new(MemoryBackend::new()))
            .open()
            .await
            .unwrap(),
    );
    let key = BenchmarkKey::new("cargo", "parse");

    let appends = (0..8).map(|_| {
        let store = store.clone();
        let report = report(&key, "same", 0, 42.0);
        async move { store.append(report).await.unwrap() }
    });
    let outcomes = futures::future::join_all(appends).await;

    assert_eq!(outcomes.iter().filter(|o| !o.is_duplicate).count(), 1);
    assert_eq!(store.series(&key).await.unwrap().len(), 1);
}

/// Memory backend whose commits for one key wait until released.
struct StallingBackend {
    inner: MemoryBackend,
    stalled: BenchmarkKey,
    entered: Notify,
    release: Notify,
}

#[async_trait]
impl HistoryBackend for StallingBackend {
    async fn load(&self) -> Result<BTreeMap<BenchmarkKey, Vec<Record>>> {
        self.inner.load().await
    }

    async fn commit(&self, key: &BenchmarkKey, record: &Record) -> Result<()> {
        if *key == self.stalled {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.commit(key, record).await
    }

    async fn update_verdict(&self, key: &BenchmarkKey, record: &Record) -> Result<()> {
        self.inner.update_verdict(key, record).await
    }

    async fn remove(&self, key: &BenchmarkKey, records: &[Record]) -> Result<()> {
        self.inner.remove(key, records).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn slow_commit_on_one_key_does_not_block_others() {
    let slow = BenchmarkKey::new("cargo", "slow");
    let fast = BenchmarkKey::new("cargo", "fast");
    let backend = Arc::new(StallingBackend {
        inner: MemoryBackend::new(),
        stalled: slow.clone(),
        entered: Notify::new(),
        release: Notify::new(),
    });
    let store = Arc::new(
        HistoryStore::builder(backend.clone())
            .open()
            .await
            .unwrap(),
    );

    let stalled = {
        let store = store.clone();
        let report = report(&slow, "c0", 0, 100.0);
        tokio::spawn(async move { store.append(report).await })
    };
    backend.entered.notified().await;

    for i in 0..3 {
        let outcome = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            store.append(report(&fast, &format!("c{i}"), i, 100.0)),
        )
        .await
        .expect("append on an idle key waited for a stalled one")
        .unwrap();
        assert!(!outcome.is_duplicate);
    }
    assert!(!stalled.is_finished());

    backend.release.notify_one();
    let outcome = stalled.await.unwrap().unwrap();
    assert_eq!(outcome.record.commit_id, "c0");
    assert_eq!(store.series(&fast).await.unwrap().len(), 3);
    assert_eq!(store.series(&slow).await.unwrap().len(), 1);
}

#[tokio::test]
async fn sink_sees_each_new_record_once() {
    let mut sink = MockSink::new();
    sink.expect_dispatch()
        .withf(|event: &VerdictEvent| event.verdict != Verdict::Regression)
        .times(5)
        .return_const(());
    sink.expect_dispatch()
        .withf(|event: &VerdictEvent| {
            event.verdict == Verdict::Regression && event.commit_id == "slow"
        })
        .times(1)
        .return_const(());

    let store = HistoryStore::builder(Arc::new(MemoryBackend::new()))
        .sink(Arc::new(sink))
        .open()
        .await
        .unwrap();
    let key = BenchmarkKey::new("cargo", "parse");

    for (i, value) in [100.0, 102.0, 98.0, 101.0, 99.0].iter().enumerate() {
        store
            .append(report(&key, &format!("c{i}"), i as i64, *value))
            .await
            .unwrap();
    }
    // re-submission does not dispatch again
    store.append(report(&key, "c0", 0, 100.0)).await.unwrap();

    let slow = store
        .append(report(&key, "slow", 10, 140.0).with_range(5.0))
        .await
        .unwrap();
    assert_eq!(slow.record.verdict, Verdict::Regression);
    assert_eq!(slow.record.score, Some(40.0));
}

#[tokio::test]
async fn file_backed_history_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("benchmarks").join("data.js");
    let key = BenchmarkKey::new("cargo", "parse");

    {
        let store = HistoryStore::builder(Arc::new(FileBackend::open(&path).unwrap()))
            .open()
            .await
            .unwrap();
        for (i, value) in [100.0, 102.0, 98.0, 101.0, 99.0].iter().enumerate() {
            store
                .append(report(&key, &format!("c{i}"), i as i64, *value))
                .await
                .unwrap();
        }
    }

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with(io::DATA_PREFIX));
    assert!(text.contains("\"verdict\": \"pass\""));

    let store = HistoryStore::builder(Arc::new(FileBackend::open(&path).unwrap()))
        .open()
        .await
        .unwrap();
    let outcome = store
        .append(report(&key, "slow", 10, 140.0).with_range(5.0))
        .await
        .unwrap();
    assert_eq!(outcome.record.verdict, Verdict::Regression);

    let document = io::read_document(&path).unwrap();
    let benches: usize = document.entries["cargo"].iter().map(|e| e.benches.len()).sum();
    assert_eq!(benches, 6);
}

#[tokio::test]
async fn legacy_history_without_verdicts_feeds_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.js");
    std::fs::write(
        &path,
        r#"window.BENCHMARK_DATA = {
  "lastUpdate": 1756326406960,
  "repoUrl": "https://github.com/example/repo",
  "entries": {
    "Benchmark": [
      { "commit": { "id": "a1" }, "date": 1756326000000, "tool": "cargo",
        "benches": [ { "name": "Block import", "value": 100, "range": "± 1", "unit": "ns/iter" } ] },
      { "commit": { "id": "a2" }, "date": 1756326100000, "tool": "cargo",
        "benches": [ { "name": "Block import", "value": 102, "range": "± 1", "unit": "ns/iter" } ] },
      { "commit": { "id": "a3" }, "date": 1756326200000, "tool": "cargo",
        "benches": [ { "name": "Block import", "value": 98, "range": "± 1", "unit": "ns/iter" } ] },
      { "commit": { "id": "a4" }, "date": 1756326300000, "tool": "cargo",
        "benches": [ { "name": "Block import", "value": 101, "range": "± 1", "unit": "ns/iter" } ] },
      { "commit": { "id": "a5" }, "date": 1756326400000, "tool": "cargo",
        "benches": [ { "name": "Block import", "value": 99, "range": "± 1", "unit": "ns/iter" } ] }
    ]
  }
}
"#,
    )
    .unwrap();

    let store = HistoryStore::builder(Arc::new(FileBackend::open(&path).unwrap()))
        .open()
        .await
        .unwrap();
    let key = BenchmarkKey::new("Benchmark", "Block import");
    assert_eq!(store.series(&key).await.unwrap().len(), 5);

    let late = Utc.timestamp_millis_opt(1_756_326_500_000).unwrap();
    let outcome = store
        .append(MeasurementReport::new(&key, "b1", late, 140.0, "ns/iter").with_range(5.0))
        .await
        .unwrap();
    assert_eq!(outcome.record.verdict, Verdict::Regression);

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("https://github.com/example/repo"));
}

#[tokio::test]
async fn directions_and_thresholds_come_from_configuration() {
    let policy = DirectionPolicy::new(vec![DirectionOverride {
        tool: "criterion".to_string(),
        name: Some("throughput".to_string()),
        direction: Direction::HigherIsBetter,
    }]);
    let store = HistoryStore::builder(Arc::new(MemoryBackend::new()))
        .detection(DetectionConfig::permissive())
        .directions(policy)
        .open()
        .await
        .unwrap();
    let throughput = BenchmarkKey::new("criterion", "throughput");
    let latency = BenchmarkKey::new("criterion", "latency");

    for (i, value) in [100.0, 102.0, 98.0, 101.0, 99.0].iter().enumerate() {
        store
            .append(report(&throughput, &format!("c{i}"), i as i64, *value))
            .await
            .unwrap();
        store
            .append(report(&latency, &format!("c{i}"), i as i64, *value))
            .await
            .unwrap();
    }

    let faster = store.append(report(&throughput, "x", 10, 140.0)).await.unwrap();
    assert_eq!(faster.record.verdict, Verdict::Improvement);
    let slower = store.append(report(&latency, "x", 10, 140.0)).await.unwrap();
    assert_eq!(slower.record.verdict, Verdict::Regression);
}

#[tokio::test]
async fn compaction_never_starves_detection() {
    let store = HistoryStore::builder(Arc::new(MemoryBackend::new()))
        .open()
        .await
        .unwrap();
    let key = BenchmarkKey::new("cargo", "parse");
    for i in 0..30 {
        store
            .append(report(&key, &format!("c{i}"), i, 100.0 + (i % 3) as f64))
            .await
            .unwrap();
    }

    let removed = store.compact(&key, 1).await.unwrap();
    assert_eq!(removed.len(), 20);

    let outcome = store
        .append(report(&key, "slow", 100, 200.0).with_range(1.0))
        .await
        .unwrap();
    assert_eq!(outcome.record.verdict, Verdict::Regression);
    assert!(outcome.record.score.is_some());
}
