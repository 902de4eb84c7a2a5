use crate::models::ChunkRecord;
use crate::store::VectorStore;
use anyhow::{Context, Result};
use meilisearch_sdk::{client::Client, indexes::Index};
use tracing::info;

/// Meilisearch implementation of the VectorStore trait.
///
/// Records land as documents with primary key `id`; `add_documents` with an
/// existing id replaces the document, which gives upsert semantics.
pub struct MeilisearchStore {
    client: Client,
    index: Index,
    index_name: String,
}

impl MeilisearchStore {
    /// Create a new Meilisearch store, creating the index if needed
    pub async fn new(url: &str, api_key: Option<&str>, index_name: &str) -> Result<Self> {
        let client = if let Some(key) = api_key {
            Client::new(url, Some(key.to_string()))?
        } else {
            Client::new(url, None::<String>)?
        };

        let create_result = client.create_index(index_name, Some("id")).await;
        if let Err(e) = create_result {
            let error_msg = e.to_string();
            if !error_msg.contains("already exists") && !error_msg.contains("index_already_exists") {
                return Err(e).context("Failed to create index");
            }
        }

        let index = client.index(index_name);

        Ok(Self {
            client,
            index,
            index_name: index_name.to_string(),
        })
    }

    /// Get a reference to the underlying index
    pub fn index(&self) -> &Index {
        &self.index
    }
}

#[async_trait::async_trait]
impl VectorStore for MeilisearchStore {
    async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        self.index
            .add_documents(records, Some("id"))
            .await
            .context("Failed to upsert chunk records into Meilisearch")?;
        Ok(())
    }

    async fn recreate(&self) -> Result<()> {
        info!("recreating index '{}'", self.index_name);
        let _ = self.client.delete_index(&self.index_name).await;
        self.client
            .create_index(&self.index_name, Some("id"))
            .await
            .context("Failed to recreate index")?;
        Ok(())
    }
}
