//! In-memory repository for tests and dry runs

use super::store::{AddressRepository, UpsertBatch};
use super::types::{partition_valid, stored_row, RowFailure, StoredRow, UpsertResult, SUPERSEDED};
use crate::error::{Error, Result};
use crate::record::EnrichedAddressRecord;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

type Rows = Arc<Mutex<BTreeMap<String, StoredRow>>>;

/// `AddressRepository` over a shared map.
///
/// Commits can be made to fail on demand.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    rows: Rows,
    fail_next: Arc<AtomicBool>,
    fail_labels: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail
    pub fn fail_next_commit(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Make every commit of batches with this label fail
    pub fn fail_commit_for(&self, label: impl Into<String>) {
        if let Ok(mut labels) = self.fail_labels.lock() {
            labels.insert(label.into());
        }
    }

    /// Copy of every persisted row
    pub fn snapshot(&self) -> BTreeMap<String, StoredRow> {
        self.rows.lock().map(|rows| rows.clone()).unwrap_or_default()
    }
}

fn poisoned() -> Error {
    Error::upsert("in-memory store lock poisoned")
}

#[async_trait]
impl AddressRepository for InMemoryRepository {
    fn describe(&self) -> String {
        "in-memory".to_string()
    }

    async fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn check(&self) -> Result<()> {
        Ok(())
    }

    async fn begin_batch(&self, label: &str) -> Result<Box<dyn UpsertBatch>> {
        let fail = self.fail_next.swap(false, Ordering::SeqCst)
            || self
                .fail_labels
                .lock()
                .map_err(|_| poisoned())?
                .contains(label);

        Ok(Box::new(MemoryBatch {
            rows: Arc::clone(&self.rows),
            label: label.to_string(),
            staged: Vec::new(),
            failed: Vec::new(),
            fail,
        }))
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.rows.lock().map_err(|_| poisoned())?.len())
    }

    async fn fetch(&self, source_id: &str) -> Result<Option<StoredRow>> {
        Ok(self
            .rows
            .lock()
            .map_err(|_| poisoned())?
            .get(source_id)
            .cloned())
    }
}

struct MemoryBatch {
    rows: Rows,
    label: String,
    staged: Vec<(String, StoredRow)>,
    failed: Vec<RowFailure>,
    fail: bool,
}

#[async_trait]
impl UpsertBatch for MemoryBatch {
    async fn stage(&mut self, records: &[EnrichedAddressRecord]) -> Result<Vec<RowFailure>> {
        let (valid, failed) = partition_valid(records);
        self.staged.extend(
            valid
                .into_iter()
                .map(|r| (r.source_id().to_string(), stored_row(r))),
        );
        self.failed.extend(failed.iter().cloned());
        Ok(failed)
    }

    fn staged(&self) -> usize {
        self.staged.len()
    }

    async fn commit(self: Box<Self>) -> Result<UpsertResult> {
        if self.fail {
            return Err(Error::upsert("injected commit failure"));
        }

        // Last staged row wins within the batch
        let mut seen = HashSet::new();
        let mut latest = Vec::with_capacity(self.staged.len());
        let mut superseded = Vec::new();
        for (key, row) in self.staged.into_iter().rev() {
            if seen.insert(key.clone()) {
                latest.push((key, row));
            } else {
                superseded.push(RowFailure::new(key, SUPERSEDED));
            }
        }
        latest.reverse();
        superseded.reverse();

        let mut rows = self.rows.lock().map_err(|_| poisoned())?;
        let mut failed = self.failed;
        failed.extend(superseded);
        let mut result = UpsertResult {
            failed,
            ..UpsertResult::default()
        };
        for (key, row) in latest {
            if rows.insert(key, row).is_some() {
                result.updated += 1;
            } else {
                result.inserted += 1;
            }
        }

        debug!(label = %self.label, inserted = result.inserted, updated = result.updated, "Committed in-memory batch");
        Ok(result)
    }

    async fn abort(self: Box<Self>) {
        debug!(label = %self.label, staged = self.staged.len(), "Aborted in-memory batch");
    }
}
