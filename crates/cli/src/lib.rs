// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI for Benchwatch.
//!
//! This crate provides the `benchwatch` command: ingest one measurement from a
//! CI job, backfill history, inspect a series, run retention and render a
//! markdown summary. Ingestion exits with status 2 when the measurement is a
//! regression so that the job can fail.

#![warn(missing_docs, rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod output;
pub mod settings;
pub mod telemetry;

use anyhow::{bail, Context};
use benchwatch_adapters::{Fanout, LogSink, WebhookSink};
use benchwatch_core::{BenchmarkKey, MeasurementReport, Verdict};
use benchwatch_history::{io, markdown, FileBackend, HistoryStore};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use crate::settings::Settings;
use crate::telemetry::LogFormat;

/// Benchwatch CLI.
#[derive(Parser, Debug)]
#[command(name = "benchwatch")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (default: benchwatch.toml when present).
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// History document, overriding `data_path` from the configuration.
    #[arg(short, long, global = true)]
    pub data: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Commands,
}

/// Series selection shared by several commands.
#[derive(Args, Debug, Clone)]
pub struct KeyArgs {
    /// Tool (suite) identifier.
    #[arg(long)]
    pub tool: String,

    /// Benchmark case name.
    #[arg(long)]
    pub name: String,
}

impl KeyArgs {
    /// The selected key.
    pub fn key(&self) -> BenchmarkKey {
        BenchmarkKey::new(self.tool.clone(), self.name.clone())
    }
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Record one measurement, classify it and print the verdict.
    ///
    /// Exits with status 2 when the measurement is a regression.
    Ingest {
        /// Series to append to.
        #[command(flatten)]
        key: KeyArgs,

        /// Commit the measurement was taken at.
        #[arg(long)]
        commit: String,

        /// Measured value.
        #[arg(long, allow_negative_numbers = true)]
        value: f64,

        /// Unit of the value (e.g. ns/iter).
        #[arg(long)]
        unit: String,

        /// Reported uncertainty of the value.
        #[arg(long, default_value_t = 0.0)]
        range: f64,

        /// Measurement time, RFC 3339 (default: now).
        #[arg(long)]
        timestamp: Option<DateTime<Utc>>,

        /// Benchmark harness that produced the value (e.g. cargo).
        #[arg(long)]
        harness: Option<String>,

        /// Print the stored record as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Backfill history from a file.
    ///
    /// With --tool and --name the file is a JSON array of measurements for
    /// that key. Without them it is a history document, replayed in order.
    Import {
        /// File to read.
        file: PathBuf,

        /// Tool of the batch.
        #[arg(long, requires = "name")]
        tool: Option<String>,

        /// Benchmark name of the batch.
        #[arg(long, requires = "tool")]
        name: Option<String>,
    },

    /// Show the most recent records of a series.
    Window {
        /// Series to show.
        #[command(flatten)]
        key: KeyArgs,

        /// Number of records.
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        /// Print records as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Drop old records of a series, never cutting into the baseline window.
    Compact {
        /// Series to compact.
        #[command(flatten)]
        key: KeyArgs,

        /// Minimum number of records to keep.
        #[arg(long)]
        keep: usize,
    },

    /// Markdown summary of the latest verdict of every series.
    Summary {
        /// Write to a file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// How a successful command should end the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Nothing to report.
    Clean,
    /// The ingested measurement is a regression.
    RegressionFound,
}

impl RunStatus {
    /// Process exit code.
    pub fn exit_code(self) -> ExitCode {
        match self {
            Self::Clean => ExitCode::SUCCESS,
            Self::RegressionFound => ExitCode::from(2),
        }
    }
}

/// One row of a single-key import file.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchRow {
    commit_id: String,
    timestamp: DateTime<Utc>,
    value: f64,
    #[serde(default)]
    range: f64,
    unit: String,
    #[serde(default)]
    commit: Map<String, Value>,
    #[serde(default)]
    harness: Option<String>,
}

impl BatchRow {
    fn into_report(self, key: &BenchmarkKey) -> MeasurementReport {
        let mut report =
            MeasurementReport::new(key, self.commit_id, self.timestamp, self.value, self.unit)
                .with_range(self.range);
        report.commit = self.commit;
        report.harness = self.harness;
        report
    }
}

struct Runtime {
    store: HistoryStore,
    webhook: Option<Arc<WebhookSink>>,
}

async fn open_store(cli: &Cli) -> anyhow::Result<Runtime> {
    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    let data_path = cli.data.clone().unwrap_or_else(|| settings.data_path.clone());

    let backend = FileBackend::open(&data_path)
        .with_context(|| format!("opening history at {}", data_path.display()))?;
    if let Some(repo_url) = &settings.repo_url {
        backend.set_repo_url(repo_url.clone()).await;
    }

    let mut sink = Fanout::new().with(Arc::new(LogSink));
    let webhook = match settings.webhook() {
        Some(config) => {
            let webhook = Arc::new(WebhookSink::new(config.clone()).context("configuring webhook")?);
            sink.push(webhook.clone());
            Some(webhook)
        }
        None => None,
    };

    let store = HistoryStore::builder(Arc::new(backend))
        .detection(settings.detection.clone())
        .directions(settings.direction_policy())
        .sink(Arc::new(sink))
        .open()
        .await
        .context("loading history")?;

    Ok(Runtime { store, webhook })
}

/// Run the CLI.
pub async fn run(cli: Cli) -> anyhow::Result<RunStatus> {
    let runtime = open_store(&cli).await?;
    let result = execute(&runtime.store, cli.command).await;
    if let Some(webhook) = &runtime.webhook {
        webhook.flush().await;
    }
    result
}

async fn execute(store: &HistoryStore, command: Commands) -> anyhow::Result<RunStatus> {
    match command {
        Commands::Ingest {
            key,
            commit,
            value,
            unit,
            range,
            timestamp,
            harness,
            json,
        } => {
            let key = key.key();
            let mut report = MeasurementReport::new(
                &key,
                commit,
                timestamp.unwrap_or_else(Utc::now),
                value,
                unit,
            )
            .with_range(range);
            report.harness = harness;

            let outcome = store
                .append(report)
                .await
                .with_context(|| format!("ingesting {key}"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                output::print_outcome(&key, &outcome);
            }

            // a retried report gets the stored verdict, so it fails the job too
            if outcome.record.verdict == Verdict::Regression {
                Ok(RunStatus::RegressionFound)
            } else {
                Ok(RunStatus::Clean)
            }
        }
        Commands::Import { file, tool, name } => {
            let batches = match (tool, name) {
                (Some(tool), Some(name)) => {
                    let key = BenchmarkKey::new(tool, name);
                    let reports = read_batch(&file, &key)?;
                    vec![(key, reports)]
                }
                _ => {
                    let text = std::fs::read_to_string(&file)
                        .with_context(|| format!("reading {}", file.display()))?;
                    io::parse_document(&text)
                        .with_context(|| format!("parsing {}", file.display()))?
                        .to_reports()
                        .into_iter()
                        .collect()
                }
            };
            import_batches(store, batches).await?;
            Ok(RunStatus::Clean)
        }
        Commands::Window { key, count, json } => {
            let key = key.key();
            let records = store.read_window(&key, count).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                output::print_records(&key, &records);
            }
            Ok(RunStatus::Clean)
        }
        Commands::Compact { key, keep } => {
            let key = key.key();
            let removed = store
                .compact(&key, keep)
                .await
                .with_context(|| format!("compacting {key}"))?;
            println!("{}: removed {} records", key, removed.len());
            Ok(RunStatus::Clean)
        }
        Commands::Summary { output } => {
            let summary = markdown::generate_summary(&store.summaries().await)
                .context("rendering summary")?;
            match output {
                Some(path) => {
                    io::write_summary(&path, &summary)
                        .with_context(|| format!("writing {}", path.display()))?;
                    println!("summary written to {}", path.display());
                }
                None => print!("{summary}"),
            }
            Ok(RunStatus::Clean)
        }
    }
}

fn read_batch(file: &Path, key: &BenchmarkKey) -> anyhow::Result<Vec<MeasurementReport>> {
    let text =
        std::fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let rows: Vec<BatchRow> = serde_json::from_str(&text)
        .with_context(|| format!("parsing {} as a measurement array", file.display()))?;
    Ok(rows.into_iter().map(|row| row.into_report(key)).collect())
}

async fn import_batches(
    store: &HistoryStore,
    batches: Vec<(BenchmarkKey, Vec<MeasurementReport>)>,
) -> anyhow::Result<()> {
    let total: usize = batches.iter().map(|(_, reports)| reports.len()).sum();
    let progress = output::import_progress(total as u64);

    let (mut inserted, mut duplicates, mut regressions) = (0, 0, 0);
    for (key, reports) in batches {
        progress.set_message(key.to_string());
        let len = reports.len();
        let report = store.import(&key, reports).await;
        inserted += report.inserted();
        duplicates += report.duplicates();
        regressions += report.regressions();

        if let Some((index, error)) = report.failure {
            progress.abandon();
            bail!(
                "import of {key} stopped at measurement {index} after {} applied: {error}",
                report.outcomes.len()
            );
        }
        progress.inc(len as u64);
    }
    progress.finish_and_clear();

    println!("imported {inserted} new, {duplicates} duplicate, {regressions} regressions");
    Ok(())
}
