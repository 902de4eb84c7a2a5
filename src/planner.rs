use crate::models::WorkItem;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// The planned fan-out for one run
#[derive(Debug, Clone)]
pub struct Plan {
    pub items: Vec<WorkItem>,
    /// Aggregate document count (files + archive entries), an upper bound
    /// for progress display; unreadable or blank entries are dropped later
    pub document_count: usize,
}

/// Partition the worklist into at most `slots` items per input class.
///
/// Regular files are sliced by ceiling division. Each zip archive has its
/// entries enumerated and sliced the same way, so one large archive spreads
/// across the pool instead of serializing on a single worker.
pub async fn plan(files: &[PathBuf], slots: usize) -> Result<Plan> {
    let slots = slots.max(1);
    let mut items = Vec::new();
    let mut document_count = 0;

    let (zips, regular): (Vec<&PathBuf>, Vec<&PathBuf>) = files
        .iter()
        .partition(|p| matches!(p.extension().and_then(|e| e.to_str()), Some(ext) if ext.eq_ignore_ascii_case("zip")));

    if !regular.is_empty() {
        document_count += regular.len();
        let paths: Vec<PathBuf> = regular.into_iter().cloned().collect();
        for slice in slice_ceil(&paths, slots) {
            items.push(WorkItem::Files { paths: slice });
        }
    }

    for zip_path in zips {
        let path = zip_path.clone();
        let entries = tokio::task::spawn_blocking(move || list_zip_entries(&path))
            .await
            .context("Zip enumeration task failed")??;
        document_count += entries.len();
        info!(
            "{}: {} entries across {} slots",
            zip_path.display(),
            entries.len(),
            slots
        );
        for slice in slice_ceil(&entries, slots) {
            items.push(WorkItem::ZipEntries {
                archive: zip_path.clone(),
                entries: slice,
            });
        }
    }

    Ok(Plan { items, document_count })
}

/// Slice `items` into at most `slots` near-equal runs via ceiling division
fn slice_ceil<T: Clone>(items: &[T], slots: usize) -> Vec<Vec<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let chunk_size = items.len().div_ceil(slots);
    items.chunks(chunk_size).map(|c| c.to_vec()).collect()
}

/// Enumerate file entries of a zip archive, skipping directories
pub(crate) fn list_zip_entries(path: &Path) -> Result<Vec<String>> {
    use std::fs::File;
    use zip::ZipArchive;

    let file = File::open(path).with_context(|| format!("Failed to open ZIP file: {}", path.display()))?;
    let mut archive =
        ZipArchive::new(file).with_context(|| format!("Failed to read ZIP archive: {}", path.display()))?;

    let mut entries = Vec::new();
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .with_context(|| format!("Failed to read entry {} in {}", i, path.display()))?;
        if !entry.is_dir() {
            entries.push(entry.name().to_string());
        }
    }
    Ok(entries)
}
