//! Repository and batch traits

use super::types::{RowFailure, StoredRow, UpsertResult};
use crate::error::Result;
use crate::record::EnrichedAddressRecord;
use async_trait::async_trait;

/// Upsert store keyed by `source_id`
#[async_trait]
pub trait AddressRepository: Send + Sync {
    /// Human-readable target, secrets masked
    fn describe(&self) -> String;

    /// Create the target table if it does not exist
    async fn ensure_schema(&self) -> Result<()>;

    /// Verify the store is reachable
    async fn check(&self) -> Result<()>;

    /// Start a batch. Nothing staged in it is visible until `commit`.
    async fn begin_batch(&self, label: &str) -> Result<Box<dyn UpsertBatch>>;

    /// Number of persisted rows
    async fn count(&self) -> Result<usize>;

    /// Persisted row for a key
    async fn fetch(&self, source_id: &str) -> Result<Option<StoredRow>>;

    /// Upsert records as one batch
    async fn upsert(&self, records: &[EnrichedAddressRecord]) -> Result<UpsertResult> {
        let mut batch = self.begin_batch("upsert").await?;
        if let Err(e) = batch.stage(records).await {
            batch.abort().await;
            return Err(e);
        }
        batch.commit().await
    }
}

/// Rows staged for one atomic commit.
///
/// Duplicate keys collapse to the last staged row; `commit` reports the
/// earlier ones as failures. `commit` and `abort` consume the batch.
#[async_trait]
pub trait UpsertBatch: Send {
    /// Stage a chunk. Returns the rows rejected by validation; they are
    /// also reported in the commit result.
    async fn stage(&mut self, records: &[EnrichedAddressRecord]) -> Result<Vec<RowFailure>>;

    /// Rows staged so far
    fn staged(&self) -> usize;

    /// Merge every staged row into the target in one transaction
    async fn commit(self: Box<Self>) -> Result<UpsertResult>;

    /// Discard every staged row
    async fn abort(self: Box<Self>);
}
