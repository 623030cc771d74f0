// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Markdown summaries of the stored history.

use benchwatch_core::Verdict;
use std::fmt::{self, Write};

use crate::store::SeriesSummary;

fn score_cell(score: Option<f64>) -> String {
    score.map_or_else(|| "-".to_string(), |s| format!("{s:+.2}"))
}

fn short_commit(commit_id: &str) -> &str {
    commit_id.get(..8).unwrap_or(commit_id)
}

/// Write the markdown summary of `summaries` into `output`.
pub fn render_summary<W: Write>(output: &mut W, summaries: &[SeriesSummary]) -> fmt::Result {
    writeln!(output, "# Benchmark Summary")?;
    writeln!(output)?;
    writeln!(output, "Generated: {}", chrono::Utc::now().to_rfc3339())?;
    writeln!(output)?;
    writeln!(output, "## Latest Verdicts")?;
    writeln!(output)?;
    writeln!(output, "| Benchmark | Commit | Value | Unit | Verdict | Score | Records |")?;
    writeln!(output, "|-----------|--------|-------|------|---------|-------|---------|")?;

    let mut flagged = Vec::new();
    for summary in summaries {
        let Some(latest) = &summary.latest else {
            continue;
        };
        writeln!(
            output,
            "| {} | {} | {} | {} | {} | {} | {} |",
            summary.key,
            short_commit(&latest.commit_id),
            latest.value,
            latest.unit,
            latest.verdict,
            score_cell(latest.score),
            summary.len
        )?;
        if latest.verdict == Verdict::Regression {
            flagged.push(summary);
        }
    }

    if !flagged.is_empty() {
        writeln!(output)?;
        writeln!(output, "## Regressions")?;
        writeln!(output)?;
        for summary in &flagged {
            if let Some(latest) = &summary.latest {
                writeln!(
                    output,
                    "- `{}` at `{}`: {} {} (score {})",
                    summary.key,
                    latest.commit_id,
                    latest.value,
                    latest.unit,
                    score_cell(latest.score)
                )?;
            }
        }
    }

    writeln!(output)?;
    writeln!(output, "---")?;
    writeln!(
        output,
        "Total series: {}, regressions: {}",
        summaries.len(),
        flagged.len()
    )?;
    Ok(())
}

/// Generate a markdown summary of the latest verdict of every series.
pub fn generate_summary(summaries: &[SeriesSummary]) -> Result<String, fmt::Error> {
    let mut output = String::new();
    render_summary(&mut output, summaries)?;
    Ok(output)
}
