use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::UNIX_EPOCH;
use tracing::debug;

/// Compute the change fingerprint for a file: `mtime_ns:size`.
///
/// Deliberately hash-free. A touched-but-identical file re-indexes (false
/// negative), but a file whose mtime or size changed is never skipped.
pub fn fingerprint(path: &Path) -> Result<String> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat file: {}", path.display()))?;
    let mtime_ns = meta
        .modified()
        .with_context(|| format!("No modification time for: {}", path.display()))?
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    Ok(format!("{}:{}", mtime_ns, meta.len()))
}

/// Durable mapping of file name to fingerprint.
///
/// Reads are permissive: a missing or corrupt manifest is treated as empty.
/// Only finalize writes the authoritative copy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: BTreeMap<String, String>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a manifest from disk, treating any failure as an empty manifest
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<BTreeMap<String, String>>(&content) {
                Ok(entries) => Self { entries },
                Err(e) => {
                    debug!("manifest at {} unreadable ({}), treating as empty", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    /// Write the manifest as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&self.entries).context("Failed to serialize manifest")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write manifest: {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name).map(|s| s.as_str())
    }

    pub fn insert(&mut self, name: impl Into<String>, fingerprint: impl Into<String>) {
        self.entries.insert(name.into(), fingerprint.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Absorb another manifest, its entries winning on conflict
    pub fn merge(&mut self, other: Manifest) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Path of the authoritative manifest under the index directory
pub fn manifest_path(index_dir: &Path) -> std::path::PathBuf {
    index_dir.join("manifest.json")
}
