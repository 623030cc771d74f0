// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Reading and writing history documents.
//!
//! Documents are stored as a script assignment (`window.BENCHMARK_DATA = {...}`)
//! so a static dashboard can include them directly. Plain JSON is accepted on
//! read as well.

use benchwatch_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::format::HistoryDocument;

/// Default location of the history document.
pub const DEFAULT_DATA_FILE: &str = "benchmarks/data.js";

/// Assignment prefix written in front of the JSON body.
pub const DATA_PREFIX: &str = "window.BENCHMARK_DATA = ";

/// Parse a document, with or without the assignment prefix.
pub fn parse_document(text: &str) -> Result<HistoryDocument> {
    let body = text.trim();
    let body = body.strip_prefix(DATA_PREFIX.trim_end()).unwrap_or(body);
    let body = body.trim_start().trim_start_matches('=').trim();
    let body = body.strip_suffix(';').unwrap_or(body);
    Ok(serde_json::from_str(body)?)
}

/// Render a document with the assignment prefix.
pub fn render_document(document: &HistoryDocument) -> Result<String> {
    let json = serde_json::to_string_pretty(document)?;
    Ok(format!("{DATA_PREFIX}{json}\n"))
}

/// Read a document from disk. A missing file is an empty history.
pub fn read_document(path: impl AsRef<Path>) -> Result<HistoryDocument> {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(text) => parse_document(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "no history file yet, starting empty");
            Ok(HistoryDocument::default())
        }
        Err(e) => Err(Error::Io(e)),
    }
}

/// Temporary sibling used for atomic replacement of `path`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "history".into());
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write a document atomically: a temporary sibling is written first and
/// renamed over `path`, so readers never observe a half-written file.
pub async fn write_document(path: &Path, document: &HistoryDocument) -> Result<()> {
    let rendered = render_document(document)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = temp_path(path);
    tokio::fs::write(&tmp, rendered).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Write a markdown summary next to the history.
pub fn write_summary(path: impl AsRef<Path>, summary: &str) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, summary)?;
    Ok(())
}
