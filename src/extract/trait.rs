use anyhow::Result;
use async_trait::async_trait;

/// Trait for turning raw document bytes into plain text.
///
/// Implementations work on in-memory bytes so archive entries and loose
/// files go through the same path. Failures are per-document; callers skip
/// the document and move on.
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Extract text content from a document's bytes
    async fn extract(&self, name: &str, data: Vec<u8>) -> Result<String>;
}
