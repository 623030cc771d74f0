// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tracing subscriber setup for the CLI.
//!
//! Logs go to stderr so that stdout stays clean for command output. The
//! filter honors `BENCHWATCH_LOG`, then `RUST_LOG`, then the `-v` count.

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Project-specific filter variable, checked before `RUST_LOG`.
pub const LOG_ENV: &str = "BENCHWATCH_LOG";

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable compact lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Default level for a `-v` count.
pub fn level_for(verbose: u8) -> Level {
    match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Build the filter from the environment, falling back to `verbose`.
/// Unparseable directives are skipped rather than treated as fatal.
pub fn build_env_filter(verbose: u8) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    EnvFilter::new(level_for(verbose).as_str())
}

/// Install the global subscriber.
pub fn init(verbose: u8, format: LogFormat) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_env_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(verbose > 1);

    match format {
        LogFormat::Text => builder.compact().without_time().try_init(),
        LogFormat::Json => builder.json().try_init(),
    }
    .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))
}
