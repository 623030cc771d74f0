// Copyright 2025 Benchwatch Contributors
// SPDX-License-Identifier: Apache-2.0

//! Persistence backends for the history store.
//!
//! The store owns all mutation of history; a backend only makes the store's
//! decisions durable. Two implementations ship with the crate:
//!
//! - [`MemoryBackend`] keeps the document in memory (tests, dry runs)
//! - [`FileBackend`] rewrites a `data.js` document atomically on every change

use async_trait::async_trait;
use benchwatch_core::{BenchmarkKey, Error, Record, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::format::HistoryDocument;
use crate::io;

/// Durable storage for benchmark history.
///
/// Every method is called with the per-key lock of the affected series held,
/// so calls for one key never overlap. Calls for different keys may.
#[async_trait]
pub trait HistoryBackend: Send + Sync + 'static {
    /// Load all persisted series.
    async fn load(&self) -> Result<BTreeMap<BenchmarkKey, Vec<Record>>>;

    /// Persist a newly classified record.
    async fn commit(&self, key: &BenchmarkKey, record: &Record) -> Result<()>;

    /// Persist a verdict attached to an already stored record.
    async fn update_verdict(&self, key: &BenchmarkKey, record: &Record) -> Result<()>;

    /// Delete records dropped by a retention pass.
    async fn remove(&self, key: &BenchmarkKey, records: &[Record]) -> Result<()>;
}

fn apply_removals(document: &mut HistoryDocument, key: &BenchmarkKey, records: &[Record]) {
    for record in records {
        if !document.remove(key, record) {
            tracing::warn!(
                key = %key,
                commit_id = %record.commit_id,
                "compacted record was not present in the persisted document"
            );
        }
    }
}

/// Backend holding the document in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    document: Mutex<HistoryDocument>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend seeded with an existing document.
    pub fn with_document(document: HistoryDocument) -> Self {
        Self {
            document: Mutex::new(document),
        }
    }

    /// Copy of the current document.
    pub async fn document(&self) -> HistoryDocument {
        self.document.lock().await.clone()
    }
}

#[async_trait]
impl HistoryBackend for MemoryBackend {
    async fn load(&self) -> Result<BTreeMap<BenchmarkKey, Vec<Record>>> {
        Ok(self.document.lock().await.to_series())
    }

    async fn commit(&self, key: &BenchmarkKey, record: &Record) -> Result<()> {
        let mut document = self.document.lock().await;
        document.append(key, record);
        document.touch();
        Ok(())
    }

    async fn update_verdict(&self, key: &BenchmarkKey, record: &Record) -> Result<()> {
        let mut document = self.document.lock().await;
        if !document.update_verdict(key, record) {
            return Err(Error::storage(format!(
                "record {} of {key} is not persisted",
                record.id
            )));
        }
        document.touch();
        Ok(())
    }

    async fn remove(&self, key: &BenchmarkKey, records: &[Record]) -> Result<()> {
        let mut document = self.document.lock().await;
        apply_removals(&mut document, key, records);
        document.touch();
        Ok(())
    }
}

/// Backend persisting a single history document on disk.
///
/// The parsed document stays in memory and is mutated in place, so fields
/// this crate does not understand are written back untouched. Writes to the
/// file are serialized by the backend; a failed write leaves the in-memory
/// document as it was.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    document: Mutex<HistoryDocument>,
}

impl FileBackend {
    /// Open (or prepare to create) the document at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let document = io::read_document(&path)?;
        tracing::info!(
            path = %path.display(),
            tools = document.entries.len(),
            "opened history document"
        );
        Ok(Self {
            path,
            document: Mutex::new(document),
        })
    }

    /// Location of the document.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set the repository URL recorded in the document, persisted with the
    /// next write.
    pub async fn set_repo_url(&self, repo_url: impl Into<String>) {
        self.document.lock().await.repo_url = Some(repo_url.into());
    }

    async fn mutate<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut HistoryDocument) -> Result<()> + Send,
    {
        let mut document = self.document.lock().await;
        let mut next = document.clone();
        change(&mut next)?;
        next.touch();
        io::write_document(&self.path, &next).await.map_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "failed to write history");
            Error::storage(format!("writing {}: {e}", self.path.display()))
        })?;
        *document = next;
        Ok(())
    }
}

#[async_trait]
impl HistoryBackend for FileBackend {
    async fn load(&self) -> Result<BTreeMap<BenchmarkKey, Vec<Record>>> {
        Ok(self.document.lock().await.to_series())
    }

    async fn commit(&self, key: &BenchmarkKey, record: &Record) -> Result<()> {
        self.mutate(|document| {
            document.append(key, record);
            Ok(())
        })
        .await
    }

    async fn update_verdict(&self, key: &BenchmarkKey, record: &Record) -> Result<()> {
        self.mutate(|document| {
            if document.update_verdict(key, record) {
                Ok(())
            } else {
                Err(Error::storage(format!(
                    "record {} of {key} is not persisted",
                    record.id
                )))
            }
        })
        .await
    }

    async fn remove(&self, key: &BenchmarkKey, records: &[Record]) -> Result<()> {
        self.mutate(|document| {
            apply_removals(document, key, records);
            Ok(())
        })
        .await
    }
}
