use crate::models::ChunkRecord;
use anyhow::Result;

/// Trait for the durable vector collection.
///
/// Upserts are idempotent by chunk id, which is what lets retried or
/// partially repeated writes converge. Handles are not safe for concurrent
/// multi-writer use from one process; callers serialize access.
#[async_trait::async_trait]
pub trait VectorStore: Send + Sync {
    /// Insert or replace a batch of records keyed by id
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Drop and recreate the collection, discarding every record
    async fn recreate(&self) -> Result<()>;
}
