// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Error types shared by every Benchwatch crate.

use crate::record::{BenchmarkKey, RecordId, Verdict};
use thiserror::Error;

/// Errors returned by history and detection operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The report is malformed (non-finite value, negative range, empty id).
    /// Nothing was persisted.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// The report's unit differs from the unit already established for the
    /// series. Unit drift is a reporter bug and needs human correction.
    #[error("unit mismatch for {key}: series uses '{expected}', report uses '{actual}'")]
    UnitMismatch {
        /// Series the report was addressed to.
        key: BenchmarkKey,
        /// Unit established by the first record of the series.
        expected: String,
        /// Unit carried by the rejected report.
        actual: String,
    },

    /// A verdict was attached to a record that had already been classified.
    /// Under per-key serialization this never happens; seeing it means a bug.
    #[error("record {record_id} of {key} is already classified as {verdict}")]
    AlreadyClassified {
        /// Series holding the record.
        key: BenchmarkKey,
        /// Record that was targeted.
        record_id: RecordId,
        /// Verdict the record already carries.
        verdict: Verdict,
    },

    /// No record with this id exists in the series.
    #[error("record {record_id} not found in {key}")]
    RecordNotFound {
        /// Series that was searched.
        key: BenchmarkKey,
        /// Missing record id.
        record_id: RecordId,
    },

    /// Attempted to attach a verdict that is not a classification result.
    #[error("invalid verdict: {0}")]
    InvalidVerdict(String),

    /// Persistence backend failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create an invalid-record error.
    pub fn invalid_record(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether the reporter can fix this by correcting its input.
    pub fn is_caller_error(&self) -> bool {
        matches!(self, Self::InvalidRecord(_) | Self::UnitMismatch { .. })
    }
}

/// Result type for Benchwatch operations.
pub type Result<T> = std::result::Result<T, Error>;
