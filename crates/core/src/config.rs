// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Detection configuration.
//!
//! Every threshold here is a configurable default rather than a constant:
//! the right window and sensitivity depend on how noisy a project's CI hosts
//! are.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::record::{BenchmarkKey, Direction};

/// Parameters of the baseline estimator and the regression detector.
///
/// # Example
/// ```
/// use benchwatch_core::DetectionConfig;
///
/// let config = DetectionConfig::default();
/// assert_eq!(config.window, 10);
/// assert_eq!(config.threshold, 5.0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Maximum number of baseline-eligible records in the rolling window.
    pub window: usize,

    /// Minimum number of baseline-eligible records before detection starts.
    /// Below this, every record is classified Pass (cold start).
    pub min_samples: usize,

    /// Score (in MADs) beyond which a record is a regression or improvement.
    pub threshold: f64,

    /// Absolute lower bound on the MAD used as divisor.
    pub epsilon_floor: f64,

    /// Lower bound on the divisor relative to the baseline median.
    ///
    /// A perfectly stable benchmark has MAD 0; without this floor a change
    /// of a single nanosecond would score in the millions.
    pub relative_epsilon: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            window: 10,
            min_samples: 3,
            threshold: 5.0,
            epsilon_floor: 1e-9,
            relative_epsilon: 0.001,
        }
    }
}

impl DetectionConfig {
    /// Longer window and a higher bar: fewer false positives blocking CI.
    pub fn strict() -> Self {
        Self {
            window: 20,
            min_samples: 5,
            threshold: 8.0,
            ..Self::default()
        }
    }

    /// Shorter window and a lower bar: catches regressions earlier.
    pub fn permissive() -> Self {
        Self {
            window: 5,
            min_samples: 3,
            threshold: 3.0,
            ..Self::default()
        }
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.min_samples == 0 {
            return Err(Error::config("min_samples must be at least 1"));
        }
        if self.window < self.min_samples {
            return Err(Error::config(format!(
                "window ({}) must be >= min_samples ({})",
                self.window, self.min_samples
            )));
        }
        if !self.threshold.is_finite() || self.threshold <= 0.0 {
            return Err(Error::config(format!(
                "threshold must be a positive number, got {}",
                self.threshold
            )));
        }
        if !self.epsilon_floor.is_finite() || self.epsilon_floor <= 0.0 {
            return Err(Error::config(format!(
                "epsilon_floor must be a positive number, got {}",
                self.epsilon_floor
            )));
        }
        if !self.relative_epsilon.is_finite() || self.relative_epsilon < 0.0 {
            return Err(Error::config(format!(
                "relative_epsilon must be non-negative, got {}",
                self.relative_epsilon
            )));
        }
        Ok(())
    }
}

/// Per-key direction declaration.
///
/// `name = None` applies to every benchmark of the tool; an entry naming the
/// benchmark wins over a tool-wide one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionOverride {
    /// Tool the override applies to.
    pub tool: String,
    /// Benchmark name, or every benchmark of the tool when absent.
    #[serde(default)]
    pub name: Option<String>,
    /// Declared direction.
    pub direction: Direction,
}

/// Resolves the declared [`Direction`] of each key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirectionPolicy {
    overrides: Vec<DirectionOverride>,
}

impl DirectionPolicy {
    /// Create a policy from a list of overrides.
    pub fn new(overrides: Vec<DirectionOverride>) -> Self {
        Self { overrides }
    }

    /// Declared direction of `key`, [`Direction::LowerIsBetter`] unless
    /// overridden.
    pub fn direction_for(&self, key: &BenchmarkKey) -> Direction {
        let exact = self
            .overrides
            .iter()
            .find(|o| o.tool == key.tool && o.name.as_deref() == Some(key.name.as_str()));
        let tool_wide = || {
            self.overrides
                .iter()
                .find(|o| o.tool == key.tool && o.name.is_none())
        };
        exact
            .or_else(tool_wide)
            .map(|o| o.direction)
            .unwrap_or_default()
    }
}
