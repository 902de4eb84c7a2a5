use crate::manifest::{fingerprint, Manifest};
use crate::models::file_name;
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Result of diffing the document store against the manifest
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    /// Files needing indexing, in name order
    pub to_index: Vec<PathBuf>,
    /// Every file currently in the store
    pub total_files: usize,
}

impl ScanOutcome {
    /// Nothing in the store at all, as opposed to everything already indexed
    pub fn store_is_empty(&self) -> bool {
        self.total_files == 0
    }
}

/// Diff the current document listing against the manifest.
///
/// `force` bypasses the diff and selects everything. Neither the manifest
/// nor the store is mutated. Files whose fingerprint cannot be computed are
/// selected, never skipped.
pub fn scan(docs_dir: &Path, manifest: &Manifest, force: bool) -> Result<ScanOutcome> {
    let all_files = list_files(docs_dir)?;
    let total_files = all_files.len();
    let to_index: Vec<PathBuf> = all_files
        .into_iter()
        .filter(|path| {
            if force {
                return true;
            }
            let name = file_name(path);
            match fingerprint(path) {
                Ok(fp) => manifest.get(&name) != Some(fp.as_str()),
                Err(e) => {
                    debug!("could not fingerprint {}: {}", path.display(), e);
                    true
                }
            }
        })
        .collect();

    info!(
        "{} file(s) to index, {} already indexed",
        to_index.len(),
        total_files - to_index.len()
    );
    for path in &to_index {
        debug!("selected {}", path.display());
    }

    Ok(ScanOutcome { to_index, total_files })
}

/// Name-ordered listing of the document store's top level.
/// A missing directory is an empty store, not an error.
pub fn list_files(docs_dir: &Path) -> Result<Vec<PathBuf>> {
    if !docs_dir.exists() {
        return Ok(Vec::new());
    }

    let mut files: Vec<PathBuf> = WalkDir::new(docs_dir)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();
    Ok(files)
}
