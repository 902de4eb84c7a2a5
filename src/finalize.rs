use crate::manifest::{manifest_path, Manifest};
use crate::models::file_name;
use crate::scanner;
use crate::staging::Staging;
use crate::store::VectorStore;
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

/// Counts from the convergence pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalizeOutcome {
    /// Chunks merged into the vector store this run
    pub chunks: usize,
    /// Files the authoritative manifest now covers
    pub files: usize,
}

impl FinalizeOutcome {
    pub fn summary(&self) -> String {
        format!("Indexed {} chunks from {} file(s).", self.chunks, self.files)
    }
}

/// Single-writer convergence of all workers' partial output.
///
/// On `force` the collection is dropped and recreated before any upsert, so
/// the rebuilt index holds exactly what this run staged. Every staged record
/// file is merged with the same batched-upsert discipline, then one
/// authoritative manifest is written covering every file currently present:
/// fingerprints from this run's partial manifests win, files untouched this
/// run keep their previous entry, and files owned by failed units are
/// withheld so the next run retries them. Staging is removed only after a
/// successful merge; re-running over unchanged staging converges to the
/// same collection and manifest state.
pub async fn finalize(
    force: bool,
    docs_dir: &Path,
    index_dir: &Path,
    store: &Arc<Mutex<Box<dyn VectorStore>>>,
    failed_sources: &HashSet<String>,
    upsert_batch: usize,
) -> Result<FinalizeOutcome> {
    let staging = Staging::new(index_dir);
    let upsert_batch = upsert_batch.max(1);

    if force {
        store.lock().await.recreate().await?;
    }

    let record_files = staging.record_files()?;
    info!("merging {} staged record file(s)", record_files.len());

    let mut total = 0;
    for path in &record_files {
        let records = Staging::read_records(path)?;
        for batch in records.chunks(upsert_batch) {
            store.lock().await.upsert(batch).await?;
        }
        total += records.len();
        info!("{}: {} chunks (total: {})", file_name(path), records.len(), total);
    }

    let previous = if force {
        Manifest::new()
    } else {
        Manifest::load(&manifest_path(index_dir))
    };
    let partials = staging.merged_partial_manifests()?;

    let mut authoritative = Manifest::new();
    for path in scanner::list_files(docs_dir)? {
        let name = file_name(&path);
        if failed_sources.contains(&name) {
            continue;
        }
        if let Some(fp) = partials.get(&name) {
            authoritative.insert(name, fp);
        } else if let Some(fp) = previous.get(&name) {
            authoritative.insert(name, fp);
        }
    }
    authoritative
        .save(&manifest_path(index_dir))
        .context("Failed to write authoritative manifest")?;

    staging.clear()?;

    let outcome = FinalizeOutcome {
        chunks: total,
        files: authoritative.len(),
    };
    info!("{}", outcome.summary());
    Ok(outcome)
}
