use crate::chunker::TextSplitter;
use crate::embeddings::EmbeddingProvider;
use crate::extract::ExtractorFactory;
use crate::manifest::{fingerprint, Manifest};
use crate::models::{file_name, ChunkRecord, SourceDocument, WorkItem, WorkerReport};
use crate::staging::Staging;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Entries read from a zip per blocking pass, bounding resident bytes
const ZIP_READ_BATCH: usize = 1024;

/// Processes one work item end to end: extract, chunk, embed, stage.
///
/// All records for the item are accumulated in memory and flushed in one
/// write, keeping the embedding provider busy instead of interleaving I/O.
/// Workers never touch the vector store; finalize performs the upserts.
pub struct EmbedWorker {
    id: usize,
    embedder: Arc<dyn EmbeddingProvider>,
    splitter: TextSplitter,
    staging: Staging,
    request_batch: usize,
}

impl EmbedWorker {
    pub fn new(
        id: usize,
        embedder: Arc<dyn EmbeddingProvider>,
        splitter: TextSplitter,
        staging: Staging,
        request_batch: usize,
    ) -> Self {
        let request_batch = request_batch.min(embedder.max_batch_size()).max(1);
        Self {
            id,
            embedder,
            splitter,
            staging,
            request_batch,
        }
    }

    /// Process a work item and stage its output. Returns the chunk count.
    pub async fn process(&self, item: WorkItem) -> Result<WorkerReport> {
        if item.document_count() == 0 {
            anyhow::bail!("worker-{}: refusing empty work item", self.id);
        }

        let sources = item.source_paths();
        let mut records: Vec<ChunkRecord> = Vec::new();

        match &item {
            WorkItem::Files { paths } => self.embed_files(paths, &mut records).await?,
            WorkItem::ZipEntries { archive, entries } => {
                self.embed_zip_entries(archive, entries, &mut records).await?
            }
        }

        self.staging
            .write_records(self.id, &records)
            .await
            .with_context(|| format!("worker-{}: failed to stage records", self.id))?;
        self.write_partial_manifest(&sources).await?;

        debug!("worker-{}: done, {} chunks staged", self.id, records.len());
        Ok(WorkerReport {
            worker_id: self.id,
            chunks: records.len(),
        })
    }

    async fn embed_files(&self, paths: &[PathBuf], records: &mut Vec<ChunkRecord>) -> Result<()> {
        for path in paths {
            let source = file_name(path);
            debug!("worker-{}: processing {}", self.id, source);

            let data = match tokio::fs::read(path).await {
                Ok(data) => data,
                Err(e) => {
                    warn!("worker-{}: cannot read {}: {}, skipping", self.id, path.display(), e);
                    continue;
                }
            };

            if let Some(doc) = self.extract_document(&source, None, data).await {
                self.chunk_and_embed(&[doc], records).await?;
            }
        }
        Ok(())
    }

    /// Embed a slice of zip entries. Entries are read in bounded batches so
    /// a worker never holds more than one batch of raw bytes.
    async fn embed_zip_entries(
        &self,
        archive: &Path,
        entries: &[String],
        records: &mut Vec<ChunkRecord>,
    ) -> Result<()> {
        let source = file_name(archive);
        debug!(
            "worker-{}: processing {} entries from {}",
            self.id,
            entries.len(),
            source
        );

        for batch in entries.chunks(ZIP_READ_BATCH) {
            let archive_path = archive.to_path_buf();
            let names: Vec<String> = batch.to_vec();
            let contents = tokio::task::spawn_blocking(move || read_zip_entries(&archive_path, &names))
                .await
                .context("Zip read task failed")??;

            let mut docs = Vec::new();
            for (name, data) in contents {
                let Some(data) = data else {
                    debug!("worker-{}: unreadable entry {} in {}, skipping", self.id, name, source);
                    continue;
                };
                if let Some(doc) = self.extract_document(&source, Some(name), data).await {
                    docs.push(doc);
                }
            }
            self.chunk_and_embed(&docs, records).await?;
            debug!(
                "worker-{}: {} chunks accumulated from {}",
                self.id,
                records.len(),
                source
            );
        }
        Ok(())
    }

    /// Extract text for one document; failures and blank content skip it
    async fn extract_document(
        &self,
        source: &str,
        entry: Option<String>,
        data: Vec<u8>,
    ) -> Option<SourceDocument> {
        let name = entry.as_deref().unwrap_or(source);
        let extractor = ExtractorFactory::for_name(name);
        match extractor.extract(name, data).await {
            Ok(text) if text.trim().is_empty() => None,
            Ok(text) => Some(SourceDocument::new(source, entry, text)),
            Err(e) => {
                warn!("worker-{}: extraction failed for {}: {}, skipping", self.id, name, e);
                None
            }
        }
    }

    /// Chunk documents and embed the chunks in provider-bounded sub-batches
    async fn chunk_and_embed(&self, docs: &[SourceDocument], records: &mut Vec<ChunkRecord>) -> Result<()> {
        let chunks: Vec<_> = docs.iter().flat_map(|d| self.splitter.split_document(d)).collect();
        if chunks.is_empty() {
            return Ok(());
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
        for sub_batch in texts.chunks(self.request_batch) {
            let batch_embeddings = self
                .embedder
                .embed_batch(sub_batch)
                .await
                .with_context(|| format!("worker-{}: embedding request failed", self.id))?;
            embeddings.extend(batch_embeddings);
        }

        if embeddings.len() != chunks.len() {
            anyhow::bail!(
                "worker-{}: got {} embeddings for {} chunks",
                self.id,
                embeddings.len(),
                chunks.len()
            );
        }

        for (chunk, embedding) in chunks.into_iter().zip(embeddings) {
            records.push(ChunkRecord {
                id: chunk.id,
                embedding,
                text: chunk.text,
                metadata: chunk.metadata,
            });
        }
        Ok(())
    }

    /// Record fingerprints for this item's source files in a private manifest.
    /// A file that vanished since the scan gets no entry and is re-selected
    /// on the next run.
    async fn write_partial_manifest(&self, sources: &[PathBuf]) -> Result<()> {
        let mut manifest = Manifest::new();
        for path in sources {
            match fingerprint(path) {
                Ok(fp) => manifest.insert(file_name(path), fp),
                Err(e) => warn!("worker-{}: cannot fingerprint {}: {}", self.id, path.display(), e),
            }
        }
        self.staging.write_partial_manifest(self.id, &manifest).await
    }
}

/// Read the named entries' bytes from an archive; unreadable entries map to None
fn read_zip_entries(path: &Path, names: &[String]) -> Result<Vec<(String, Option<Vec<u8>>)>> {
    use std::fs::File;
    use std::io::Read;
    use zip::ZipArchive;

    let file = File::open(path).with_context(|| format!("Failed to open ZIP file: {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("Failed to read ZIP archive: {}", path.display()))?;

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let data = match archive.by_name(name) {
            Ok(mut entry) => {
                let mut buf = Vec::with_capacity(entry.size() as usize);
                match entry.read_to_end(&mut buf) {
                    Ok(_) => Some(buf),
                    Err(_) => None,
                }
            }
            Err(_) => None,
        };
        out.push((name.clone(), data));
    }
    Ok(out)
}
