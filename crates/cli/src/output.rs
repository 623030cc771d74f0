// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Terminal rendering of records and verdicts.

use benchwatch_core::{BenchmarkKey, Record, Verdict};
use benchwatch_history::AppendOutcome;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};

/// Verdict colored for the terminal.
pub fn verdict_label(verdict: Verdict) -> ColoredString {
    match verdict {
        Verdict::Regression => "REGRESSION".red().bold(),
        Verdict::Improvement => "improvement".green().bold(),
        Verdict::Pass => "pass".normal(),
        Verdict::Pending => "pending".dimmed(),
    }
}

fn score_text(score: Option<f64>) -> String {
    score.map_or_else(|| "cold start".to_string(), |s| format!("score {s:+.2}"))
}

/// One line describing a stored record.
pub fn record_line(record: &Record) -> String {
    format!(
        "#{:<5} {} {:>14} ± {:<10} {:<8} {:<12} {}",
        record.id,
        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
        record.value,
        record.range,
        record.unit,
        verdict_label(record.verdict),
        record.commit_id
    )
}

/// Print the result of an ingestion.
pub fn print_outcome(key: &BenchmarkKey, outcome: &AppendOutcome) {
    let record = &outcome.record;
    if outcome.is_duplicate {
        println!(
            "{} {} @ {} already recorded as {}",
            "=".dimmed(),
            key.to_string().bold(),
            record.commit_id,
            verdict_label(record.verdict)
        );
        return;
    }
    println!(
        "{} {} @ {}: {} {} ({})",
        verdict_label(record.verdict),
        key.to_string().bold(),
        record.commit_id,
        record.value,
        record.unit,
        score_text(record.score)
    );
}

/// Print a window of records.
pub fn print_records(key: &BenchmarkKey, records: &[Record]) {
    println!("{} ({} records)", key.to_string().bold(), records.len());
    for record in records {
        println!("  {}", record_line(record));
    }
}

/// Progress bar for a bulk import.
pub fn import_progress(total: u64) -> ProgressBar {
    let style = ProgressStyle::with_template("{spinner} {msg:24} [{bar:32}] {pos}/{len}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    ProgressBar::new(total).with_style(style)
}
