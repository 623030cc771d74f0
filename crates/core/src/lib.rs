// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Core types for Benchwatch.
//!
//! This crate holds everything that does not touch storage or the network:
//!
//! - [`record`] - benchmark keys, reports, stored records and verdicts
//! - [`baseline`] - rolling median/MAD baseline estimation
//! - [`detector`] - regression classification against a baseline
//! - [`alert`] - the verdict event payload and the sink contract
//! - [`config`] - detection thresholds and per-key directions
//! - [`error`] - the shared error type
//!
//! # Quick Start
//!
//! ```
//! use benchwatch_core::{Baseline, BenchmarkKey, Detector, Direction};
//! use benchwatch_core::{MeasurementReport, Record, Verdict};
//!
//! let history = Baseline::from_values(&[100.0, 102.0, 98.0, 101.0, 99.0]).unwrap();
//! let key = BenchmarkKey::new("cargo", "parse");
//! let report = MeasurementReport::new(&key, "abc", chrono::Utc::now(), 140.0, "ns/iter");
//! let record = Record::from_report(5, report);
//!
//! let result = Detector::default().classify(&record, Some(&history), Direction::LowerIsBetter);
//! assert_eq!(result.verdict, Verdict::Regression);
//! ```

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod alert;
pub mod baseline;
pub mod config;
pub mod detector;
pub mod error;
pub mod record;

pub use alert::{AlertSink, NullSink, VerdictEvent};
pub use baseline::Baseline;
pub use config::{DetectionConfig, DirectionOverride, DirectionPolicy};
pub use detector::{Classification, Detector};
pub use error::{Error, Result};
pub use record::{BenchmarkKey, Direction, MeasurementReport, Record, RecordId, Verdict};
