use crate::chunker::TextSplitter;
use crate::config::Config;
use crate::embeddings::EmbeddingProvider;
use crate::finalize::{self, FinalizeOutcome};
use crate::manifest::{manifest_path, Manifest};
use crate::models::{file_name, WorkItem, WorkerReport};
use crate::planner;
use crate::scanner::{self, ScanOutcome};
use crate::staging::Staging;
use crate::store::VectorStore;
use crate::worker::EmbedWorker;
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Observational progress callback, invoked at phase boundaries and on
/// every worker completion
pub type StatusFn = Arc<dyn Fn(&str) + Send + Sync>;

/// Invoked once after a successful finalize, e.g. to reload a searcher
pub type ReloadFn = Box<dyn FnOnce() + Send>;

/// Orchestrates scan, embed, and finalize phases.
///
/// At most one run is active per pipeline: the run lock is held for the
/// whole of `reindex`, so a concurrent call blocks until the in-flight run
/// finishes rather than interleaving. There is no mid-run cancellation; the
/// only bounded wait is the embedding-provider startup probe.
pub struct IndexPipeline {
    config: Config,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<Mutex<Box<dyn VectorStore>>>,
    run_lock: Mutex<()>,
}

impl IndexPipeline {
    pub fn new(config: Config, embedder: Arc<dyn EmbeddingProvider>, store: Box<dyn VectorStore>) -> Self {
        Self {
            config,
            embedder,
            store: Arc::new(Mutex::new(store)),
            run_lock: Mutex::new(()),
        }
    }

    /// Run the full indexing pipeline. Returns a human-readable summary.
    ///
    /// `force` discards the existing index and manifest and reprocesses
    /// everything; otherwise only files whose fingerprint changed or is
    /// absent are processed.
    pub async fn reindex(
        &self,
        force: bool,
        on_status: Option<StatusFn>,
        on_reload: Option<ReloadFn>,
    ) -> Result<String> {
        let status: StatusFn = on_status.unwrap_or_else(|| Arc::new(|_| {}));
        let _guard = self.run_lock.lock().await;

        let docs_dir = self.config.docs_dir();
        let index_dir = self.config.index_dir();

        info!("=== scan ===");
        status("scanning documents...");
        let manifest = Manifest::load(&manifest_path(&index_dir));
        let outcome = scanner::scan(&docs_dir, &manifest, force)?;
        if outcome.to_index.is_empty() {
            return Ok(empty_result(&outcome, &docs_dir));
        }

        let slots = self.config.parallelism.total_slots();
        let plan = planner::plan(&outcome.to_index, slots).await?;
        let dispatched = plan.items.len();

        status("waiting for embedding service...");
        let timeout = Duration::from_secs(self.config.tei.startup_timeout_secs);
        self.embedder
            .wait_ready(timeout)
            .await
            .context("Embedding service did not become reachable")?;

        info!("=== embed ===");
        status(&format!(
            "embedding {} documents across {} work items...",
            plan.document_count, dispatched
        ));
        let failed = self.dispatch(plan.items, slots, &status, &index_dir).await;

        info!("=== finalize ===");
        status("finalizing index...");
        let failed_sources: HashSet<String> = failed
            .iter()
            .flat_map(|item| item.source_paths())
            .map(|p| file_name(&p))
            .collect();
        let report = finalize::finalize(
            force,
            &docs_dir,
            &index_dir,
            &self.store,
            &failed_sources,
            self.config.store.upsert_batch,
        )
        .await?;

        if let Some(reload) = on_reload {
            info!("=== reload ===");
            status("reloading search index...");
            reload();
        }

        info!("=== done ===");
        Ok(summary(report, failed.len(), dispatched))
    }

    /// Fan work items out to at most `slots` concurrent workers, collecting
    /// results as they complete. A failed unit is kept for manifest
    /// attribution; siblings keep running.
    async fn dispatch(
        &self,
        items: Vec<WorkItem>,
        slots: usize,
        status: &StatusFn,
        index_dir: &Path,
    ) -> Vec<WorkItem> {
        let staging = Staging::new(index_dir);
        // leftovers from an interrupted run must not leak into this merge
        if let Err(e) = staging.clear() {
            warn!("could not clear staging area: {}", e);
        }

        let splitter = TextSplitter::new(self.config.chunking.chunk_size, self.config.chunking.chunk_overlap);

        let mut results = stream::iter(items.into_iter().enumerate().map(|(id, item)| {
            let worker = EmbedWorker::new(
                id,
                self.embedder.clone(),
                splitter.clone(),
                staging.clone(),
                self.config.tei.request_batch,
            );
            async move {
                let result = worker.process(item.clone()).await;
                (item, result)
            }
        }))
        .buffer_unordered(slots.max(1));

        let mut total = 0usize;
        let mut failed = Vec::new();
        while let Some((item, result)) = results.next().await {
            match result {
                Ok(WorkerReport { worker_id, chunks }) => {
                    total += chunks;
                    status(&format!("worker-{} done: {} chunks (total: {})", worker_id, chunks, total));
                }
                Err(e) => {
                    warn!("work item failed: {:#}", e);
                    failed.push(item);
                }
            }
        }
        failed
    }
}

fn empty_result(outcome: &ScanOutcome, docs_dir: &Path) -> String {
    if outcome.store_is_empty() {
        format!(
            "No documents found in {}. Add files to the document store first.",
            docs_dir.display()
        )
    } else {
        "All documents already indexed. Add new files or run reindex --force to rebuild.".to_string()
    }
}

fn summary(report: FinalizeOutcome, failed_units: usize, dispatched: usize) -> String {
    let mut text = report.summary();
    if failed_units > 0 {
        text.push_str(&format!(
            " {} of {} work item(s) failed; re-running reindex will retry their files.",
            failed_units, dispatched
        ));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ChunkingConfig, MeilisearchConfig, ParallelismConfig, StoreConfig, TeiConfig};
    use crate::models::ChunkRecord;
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    /// Embedder that fails any batch containing the poison marker
    struct StubEmbedder {
        reachable: bool,
    }

    #[async_trait::async_trait]
    impl EmbeddingProvider for StubEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            if texts.iter().any(|t| t.contains("poison")) {
                anyhow::bail!("stub embedder refused a poisoned batch");
            }
            Ok(texts.iter().map(|t| vec![t.len() as f32, 2.0]).collect())
        }

        fn max_batch_size(&self) -> usize {
            256
        }

        fn dimension(&self) -> usize {
            2
        }

        async fn wait_ready(&self, _timeout: Duration) -> Result<()> {
            if self.reachable {
                Ok(())
            } else {
                anyhow::bail!("stub embedder is unreachable")
            }
        }
    }

    #[derive(Default, Clone)]
    struct StubStore {
        records: Arc<std::sync::Mutex<HashMap<String, ChunkRecord>>>,
    }

    #[async_trait::async_trait]
    impl VectorStore for StubStore {
        async fn upsert(&self, records: &[ChunkRecord]) -> Result<()> {
            let mut map = self.records.lock().unwrap();
            for r in records {
                map.insert(r.id.clone(), r.clone());
            }
            Ok(())
        }

        async fn recreate(&self) -> Result<()> {
            self.records.lock().unwrap().clear();
            Ok(())
        }
    }

    struct Fixture {
        docs: TempDir,
        index: TempDir,
        stub: StubStore,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                docs: TempDir::new().unwrap(),
                index: TempDir::new().unwrap(),
                stub: StubStore::default(),
            }
        }

        fn config(&self, workers: usize, worker_concurrency: usize) -> Config {
            Config {
                store: StoreConfig {
                    docs_dir: self.docs.path().to_string_lossy().to_string(),
                    index_dir: self.index.path().to_string_lossy().to_string(),
                    upsert_batch: 5_000,
                },
                meilisearch: MeilisearchConfig {
                    url: "http://127.0.0.1:7700".to_string(),
                    api_key: None,
                    index_name: "unused".to_string(),
                },
                tei: TeiConfig {
                    url: "http://127.0.0.1:8000".to_string(),
                    startup_timeout_secs: 1,
                    request_batch: 256,
                },
                chunking: ChunkingConfig::default(),
                parallelism: ParallelismConfig {
                    workers,
                    worker_concurrency,
                },
            }
        }

        fn pipeline(&self, workers: usize, worker_concurrency: usize, reachable: bool) -> IndexPipeline {
            IndexPipeline::new(
                self.config(workers, worker_concurrency),
                Arc::new(StubEmbedder { reachable }),
                Box::new(self.stub.clone()),
            )
        }

        fn write_doc(&self, name: &str, content: &str) {
            std::fs::write(self.docs.path().join(name), content).unwrap();
        }

        fn stored_count(&self) -> usize {
            self.stub.records.lock().unwrap().len()
        }
    }

    #[tokio::test]
    async fn test_reindex_empty_store() {
        let fx = Fixture::new();
        let pipeline = fx.pipeline(2, 1, true);

        let summary = pipeline.reindex(false, None, None).await.unwrap();
        assert!(summary.starts_with("No documents found in"));
    }

    #[tokio::test]
    async fn test_reindex_then_noop_second_run() {
        let fx = Fixture::new();
        fx.write_doc("a.txt", "alpha");
        fx.write_doc("b.txt", "beta");
        let pipeline = fx.pipeline(2, 1, true);

        let summary = pipeline.reindex(false, None, None).await.unwrap();
        assert_eq!(summary, "Indexed 2 chunks from 2 file(s).");
        assert_eq!(fx.stored_count(), 2);

        let second = pipeline.reindex(false, None, None).await.unwrap();
        assert!(second.starts_with("All documents already indexed"));
        assert_eq!(fx.stored_count(), 2);
    }

    #[tokio::test]
    async fn test_reindex_picks_up_changed_file() {
        let fx = Fixture::new();
        fx.write_doc("a.txt", "alpha");
        let pipeline = fx.pipeline(2, 1, true);
        pipeline.reindex(false, None, None).await.unwrap();

        fx.write_doc("a.txt", "alpha but longer now");
        let summary = pipeline.reindex(false, None, None).await.unwrap();
        assert_eq!(summary, "Indexed 1 chunks from 1 file(s).");
    }

    #[tokio::test]
    async fn test_reindex_force_rebuilds() {
        let fx = Fixture::new();
        fx.write_doc("a.txt", "alpha");
        let pipeline = fx.pipeline(2, 1, true);
        pipeline.reindex(false, None, None).await.unwrap();

        // force reprocesses despite matching fingerprints
        let summary = pipeline.reindex(true, None, None).await.unwrap();
        assert_eq!(summary, "Indexed 1 chunks from 1 file(s).");
        assert_eq!(fx.stored_count(), 1);
    }

    #[tokio::test]
    async fn test_degraded_success_and_retry() {
        let fx = Fixture::new();
        fx.write_doc("good.txt", "fine content");
        fx.write_doc("bad.txt", "poison content");
        // 2 slots so each file is its own unit
        let pipeline = fx.pipeline(2, 1, true);

        let summary = pipeline.reindex(false, None, None).await.unwrap();
        assert_eq!(
            summary,
            "Indexed 1 chunks from 1 file(s). 1 of 2 work item(s) failed; re-running reindex will retry their files."
        );

        // the failed file stays out of the manifest, so a later run with a
        // healthy embedder picks up exactly that file
        fx.write_doc("bad.txt", "healed content");
        let second = pipeline.reindex(false, None, None).await.unwrap();
        assert_eq!(second, "Indexed 1 chunks from 2 file(s).");
        assert_eq!(fx.stored_count(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_embedder_stops_before_finalize() {
        let fx = Fixture::new();
        fx.write_doc("a.txt", "alpha");
        let pipeline = fx.pipeline(2, 1, false);

        let result = pipeline.reindex(false, None, None).await;
        assert!(result.is_err());
        // nothing staged, nothing stored, no manifest written
        assert_eq!(fx.stored_count(), 0);
        assert!(Manifest::load(&manifest_path(fx.index.path())).is_empty());
    }

    #[tokio::test]
    async fn test_status_messages_and_reload_hook() {
        let fx = Fixture::new();
        fx.write_doc("a.txt", "alpha");
        let pipeline = fx.pipeline(2, 1, true);

        let statuses: Arc<std::sync::Mutex<Vec<String>>> = Arc::default();
        let statuses_clone = statuses.clone();
        let status: StatusFn = Arc::new(move |s: &str| statuses_clone.lock().unwrap().push(s.to_string()));
        let reloaded = Arc::new(AtomicBool::new(false));
        let reloaded_clone = reloaded.clone();
        let reload: ReloadFn = Box::new(move || reloaded_clone.store(true, Ordering::SeqCst));

        pipeline.reindex(false, Some(status), Some(reload)).await.unwrap();

        assert!(reloaded.load(Ordering::SeqCst));
        let seen = statuses.lock().unwrap();
        assert!(seen.iter().any(|s| s.contains("scanning documents")));
        assert!(seen.iter().any(|s| s.contains("embedding 1 documents")));
        assert!(seen.iter().any(|s| s.starts_with("worker-") && s.contains("done")));
        assert!(seen.iter().any(|s| s.contains("finalizing index")));
        assert!(seen.iter().any(|s| s.contains("reloading search index")));
    }

    #[tokio::test]
    async fn test_zip_heavy_store_end_to_end() {
        let fx = Fixture::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            fx.write_doc(name, &format!("{} content", name));
        }
        let zip_path = fx.docs.path().join("corpus.zip");
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut zip = ZipWriter::new(file);
        for i in 0..250 {
            zip.start_file(format!("doc-{:03}.txt", i), FileOptions::default()).unwrap();
            zip.write_all(format!("document number {}", i).as_bytes()).unwrap();
        }
        zip.finish().unwrap();

        // 4 slots: three single-file slices plus four zip-entry slices
        let pipeline = fx.pipeline(4, 1, true);
        let summary = pipeline.reindex(false, None, None).await.unwrap();
        assert_eq!(summary, "Indexed 253 chunks from 4 file(s).");
        assert_eq!(fx.stored_count(), 253);

        let second = pipeline.reindex(false, None, None).await.unwrap();
        assert!(second.starts_with("All documents already indexed"));
    }
}
