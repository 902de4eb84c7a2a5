use crate::embeddings::EmbeddingProvider;
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_MAX_BATCH: usize = 512;

/// Text Embeddings Inference (TEI) provider from Hugging Face.
///
/// Talks to the `/embed` endpoint of a TEI server. The server enforces
/// `--max-client-batch-size`; `max_batch_size` mirrors that limit so callers
/// can sub-batch.
pub struct TeiEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    dimension: AtomicUsize, // updated from the first response if the model differs
    max_batch: usize,
}

impl TeiEmbeddingProvider {
    /// Create a new TEI embedding provider
    /// Default URL: http://127.0.0.1:8000
    pub fn new(base_url: Option<&str>, dimension: Option<usize>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or("http://127.0.0.1:8000").to_string(),
            dimension: AtomicUsize::new(dimension.unwrap_or(768)),
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    fn embed_url(&self) -> String {
        format!("{}/embed", self.base_url)
    }

    fn host_and_port(&self) -> Result<(String, u16)> {
        let url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid TEI url: {}", self.base_url))?;
        let host = url
            .host_str()
            .with_context(|| format!("TEI url has no host: {}", self.base_url))?
            .to_string();
        let port = url.port_or_known_default().unwrap_or(80);
        Ok((host, port))
    }
}

#[derive(Serialize)]
struct TeiEmbeddingRequest<'a> {
    inputs: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    truncate: Option<bool>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for TeiEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = TeiEmbeddingRequest {
            inputs: texts,
            truncate: Some(true),
        };

        let response = self
            .client
            .post(self.embed_url())
            .json(&request)
            .send()
            .await
            .context("Failed to connect to TEI server")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("TEI API returned error {}: {}", status, error_text);
        }

        // TEI returns a bare array of arrays, one embedding per input
        let embeddings: Vec<Vec<f32>> = response
            .json()
            .await
            .context("Failed to parse TEI embedding response")?;

        if embeddings.len() != texts.len() {
            anyhow::bail!(
                "TEI returned {} embeddings for {} inputs",
                embeddings.len(),
                texts.len()
            );
        }

        if let Some(first) = embeddings.first() {
            let actual = first.len();
            if actual == 0 {
                anyhow::bail!("TEI returned an empty embedding (dimension 0)");
            }
            let expected = self.dimension.load(Ordering::Relaxed);
            if actual != expected {
                debug!("TEI embedding dimension is {} (expected {}), updating", actual, expected);
                self.dimension.store(actual, Ordering::Relaxed);
            }
        }

        Ok(embeddings)
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch
    }

    fn dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let (host, port) = self.host_and_port()?;
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match tokio::time::timeout(
                Duration::from_secs(1),
                tokio::net::TcpStream::connect((host.as_str(), port)),
            )
            .await
            {
                Ok(Ok(_)) => {
                    info!("TEI server ready at {}", self.base_url);
                    return Ok(());
                }
                _ => {
                    if tokio::time::Instant::now() >= deadline {
                        anyhow::bail!(
                            "TEI server at {} not reachable within {:?}",
                            self.base_url,
                            timeout
                        );
                    }
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }
}
