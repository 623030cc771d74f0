// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark history with regression detection on ingestion.
//!
//! A [`HistoryStore`] keeps one ordered series per benchmark key. Every
//! appended measurement is classified against a rolling baseline of the
//! series' earlier Pass and Improvement records, persisted through a
//! [`HistoryBackend`], and only then handed to the configured alert sink.
//!
//! # Quick Start
//!
//! ```no_run
//! use benchwatch_core::{BenchmarkKey, MeasurementReport};
//! use benchwatch_history::{FileBackend, HistoryStore};
//! use std::sync::Arc;
//!
//! # async fn run() -> benchwatch_core::Result<()> {
//! let backend = FileBackend::open("benchmarks/data.js")?;
//! let store = HistoryStore::builder(Arc::new(backend)).open().await?;
//!
//! let key = BenchmarkKey::new("cargo", "parse");
//! let report = MeasurementReport::new(&key, "e019531d", chrono::Utc::now(), 158.2, "ns/iter");
//! let outcome = store.append(report).await?;
//! println!("{}: {}", key, outcome.record.verdict);
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`store`] - the store and its operations
//! - [`series`] - one ordered series and its retention rules
//! - [`backend`] - persistence backends
//! - [`format`] - the persisted `data.js` document model
//! - [`io`] - reading and writing documents
//! - [`markdown`] - markdown summaries

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod backend;
pub mod format;
pub mod io;
pub mod markdown;
pub mod series;
pub mod store;

pub use backend::{FileBackend, HistoryBackend, MemoryBackend};
pub use format::HistoryDocument;
pub use series::Series;
pub use store::{AppendOutcome, HistoryStore, HistoryStoreBuilder, ImportReport, SeriesSummary};
