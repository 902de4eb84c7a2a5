use crate::manifest::Manifest;
use crate::models::ChunkRecord;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Worker-scoped staging area under the index directory.
///
/// Each worker owns a private output partition named by its worker id, so
/// concurrent units never write to the same file. Finalize is the only
/// reader and sweeps the whole directory away after a successful merge.
#[derive(Debug, Clone)]
pub struct Staging {
    dir: PathBuf,
}

impl Staging {
    pub fn new(index_dir: &Path) -> Self {
        Self {
            dir: index_dir.join("pending"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn records_path(&self, worker_id: usize) -> PathBuf {
        self.dir.join(format!("worker-{}.json", worker_id))
    }

    fn partial_manifest_path(&self, worker_id: usize) -> PathBuf {
        self.dir.join(format!("manifest-worker-{}.json", worker_id))
    }

    /// Serialize one worker's accumulated records in a single write
    pub async fn write_records(&self, worker_id: usize, records: &[ChunkRecord]) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create staging dir: {}", self.dir.display()))?;
        let json = serde_json::to_vec(records).context("Failed to serialize chunk records")?;
        let path = self.records_path(worker_id);
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write staged records: {}", path.display()))?;
        debug!("worker-{} staged {} records to {}", worker_id, records.len(), path.display());
        Ok(())
    }

    /// Write one worker's partial manifest beside its records
    pub async fn write_partial_manifest(&self, worker_id: usize, manifest: &Manifest) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create staging dir: {}", self.dir.display()))?;
        let entries: BTreeMap<&str, &str> = manifest.iter().collect();
        let json = serde_json::to_vec_pretty(&entries).context("Failed to serialize partial manifest")?;
        let path = self.partial_manifest_path(worker_id);
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write partial manifest: {}", path.display()))?;
        Ok(())
    }

    /// Sorted list of staged record files, empty if nothing was staged
    pub fn record_files(&self) -> Result<Vec<PathBuf>> {
        self.list_with_prefix("worker-")
    }

    /// Sorted list of partial manifest files
    pub fn partial_manifest_files(&self) -> Result<Vec<PathBuf>> {
        self.list_with_prefix("manifest-worker-")
    }

    fn list_with_prefix(&self, prefix: &str) -> Result<Vec<PathBuf>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read staging dir: {}", self.dir.display()))?
        {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            // "worker-" also prefixes "manifest-worker-" files on the name
            // alone, so match on the full shape
            if prefix == "worker-" && name.starts_with("manifest-") {
                continue;
            }
            if name.starts_with(prefix) && name.ends_with(".json") {
                files.push(entry.path());
            }
        }
        files.sort();
        Ok(files)
    }

    /// Read one staged record file back
    pub fn read_records(path: &Path) -> Result<Vec<ChunkRecord>> {
        let content = std::fs::read(path)
            .with_context(|| format!("Failed to read staged records: {}", path.display()))?;
        serde_json::from_slice(&content)
            .with_context(|| format!("Failed to parse staged records: {}", path.display()))
    }

    /// Merge every partial manifest into one, later workers winning
    pub fn merged_partial_manifests(&self) -> Result<Manifest> {
        let mut merged = Manifest::new();
        for path in self.partial_manifest_files()? {
            merged.merge(Manifest::load(&path));
        }
        Ok(merged)
    }

    /// Remove the staging directory and everything in it
    pub fn clear(&self) -> Result<()> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)
                .with_context(|| format!("Failed to remove staging dir: {}", self.dir.display()))?;
        }
        Ok(())
    }
}
