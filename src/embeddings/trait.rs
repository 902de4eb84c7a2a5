use anyhow::Result;
use std::time::Duration;

/// Trait for embedding providers that turn batches of text into vectors
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, returning exactly one vector per input.
    ///
    /// Callers must keep batches at or below `max_batch_size`; the provider
    /// enforces the limit server-side.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Largest batch one call may carry
    fn max_batch_size(&self) -> usize;

    /// Get the dimension of embeddings produced by this provider
    fn dimension(&self) -> usize;

    /// Poll the provider for reachability, bounded by `timeout`.
    ///
    /// Called once per run before any embedding work is dispatched.
    /// Individual embed calls are not retried internally.
    async fn wait_ready(&self, timeout: Duration) -> Result<()>;
}
