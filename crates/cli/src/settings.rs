// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Layered runtime settings.
//!
//! Sources, lowest priority first: built-in defaults, the TOML file given
//! with `--config` (or `benchwatch.toml` when present), then `BENCHWATCH__*`
//! environment variables. A `.env` file is loaded into the environment
//! before any of them are read.
//!
//! ```toml
//! data_path = "benchmarks/data.js"
//!
//! [detection]
//! window = 20
//! threshold = 6.0
//!
//! [[directions]]
//! tool = "criterion"
//! name = "throughput"
//! direction = "higher_is_better"
//!
//! [webhook]
//! url = "https://hooks.example.org/bench"
//! ```

use benchwatch_adapters::WebhookConfig;
use benchwatch_core::{DetectionConfig, DirectionOverride, DirectionPolicy};
use benchwatch_history::io::DEFAULT_DATA_FILE;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "benchwatch.toml";

/// Prefix of environment overrides, e.g. `BENCHWATCH__DETECTION__THRESHOLD`.
pub const ENV_PREFIX: &str = "BENCHWATCH";

/// Everything the CLI needs to build a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// History document location.
    pub data_path: PathBuf,
    /// Repository URL recorded in the document.
    pub repo_url: Option<String>,
    /// Detection thresholds.
    pub detection: DetectionConfig,
    /// Per-key direction declarations.
    pub directions: Vec<DirectionOverride>,
    /// Webhook delivery, disabled when absent.
    pub webhook: Option<WebhookConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from(DEFAULT_DATA_FILE),
            repo_url: None,
            detection: DetectionConfig::default(),
            directions: Vec::new(),
            webhook: None,
        }
    }
}

impl Settings {
    /// Load settings from every layer.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(env_file) = dotenvy::dotenv() {
            tracing::debug!(path = %env_file.display(), "loaded .env");
        }

        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let settings: Self = Config::builder()
            .add_source(Config::try_from(&Self::default())?)
            .add_source(file)
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        settings
            .detection
            .validate()
            .map_err(|e| ConfigError::Message(e.to_string()))?;
        Ok(settings)
    }

    /// Direction policy built from the declared overrides.
    pub fn direction_policy(&self) -> DirectionPolicy {
        DirectionPolicy::new(self.directions.clone())
    }

    /// Webhook settings, if a URL is configured.
    pub fn webhook(&self) -> Option<&WebhookConfig> {
        self.webhook.as_ref().filter(|w| !w.url.is_empty())
    }
}
