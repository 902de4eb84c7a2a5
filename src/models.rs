use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A single unit of text ready for chunking: a source file or one archive entry
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Name of the source file in the document store
    pub source: String,
    /// Entry name inside the archive, if the document came from one
    pub filename: Option<String>,
    /// Extracted text content
    pub text: String,
}

impl SourceDocument {
    pub fn new(source: impl Into<String>, filename: Option<String>, text: String) -> Self {
        Self {
            source: source.into(),
            filename,
            text,
        }
    }

    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            source: self.source.clone(),
            filename: self.filename.clone(),
        }
    }
}

/// Provenance carried by every chunk into the vector store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

/// One embedded chunk as staged by a worker and upserted at finalize
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Unit of distributable work produced by the planner
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkItem {
    /// A slice of regular files, processed one per document
    Files { paths: Vec<PathBuf> },
    /// A slice of entry names from a single zip archive
    ZipEntries { archive: PathBuf, entries: Vec<String> },
}

impl WorkItem {
    /// Source files this item covers, used to attribute manifest entries
    /// and to withhold them when the unit fails
    pub fn source_paths(&self) -> Vec<PathBuf> {
        match self {
            WorkItem::Files { paths } => paths.clone(),
            WorkItem::ZipEntries { archive, .. } => vec![archive.clone()],
        }
    }

    /// Number of documents in this item (upper bound; blank entries are dropped later)
    pub fn document_count(&self) -> usize {
        match self {
            WorkItem::Files { paths } => paths.len(),
            WorkItem::ZipEntries { entries, .. } => entries.len(),
        }
    }
}

/// Returned by each worker on success
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub worker_id: usize,
    pub chunks: usize,
}

pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_work_item_source_paths() {
        let item = WorkItem::Files {
            paths: vec![PathBuf::from("/docs/a.txt"), PathBuf::from("/docs/b.txt")],
        };
        assert_eq!(item.source_paths().len(), 2);
        assert_eq!(item.document_count(), 2);

        let item = WorkItem::ZipEntries {
            archive: PathBuf::from("/docs/big.zip"),
            entries: vec!["one.txt".to_string(), "two.txt".to_string()],
        };
        assert_eq!(item.source_paths(), vec![PathBuf::from("/docs/big.zip")]);
        assert_eq!(item.document_count(), 2);
    }

    #[test]
    fn test_work_item_serialization() {
        let item = WorkItem::ZipEntries {
            archive: PathBuf::from("/docs/big.zip"),
            entries: vec!["a".to_string()],
        };
        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("\"type\":\"zip_entries\""));
        let back: WorkItem = serde_json::from_str(&json).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn test_chunk_record_roundtrip() {
        let record = ChunkRecord {
            id: "chunk_abc".to_string(),
            embedding: vec![0.1, 0.2],
            text: "hello".to_string(),
            metadata: ChunkMetadata {
                source: "a.txt".to_string(),
                filename: None,
            },
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("filename"));
        let back: ChunkRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, record.id);
        assert_eq!(back.metadata, record.metadata);
    }

    #[test]
    fn test_file_name_fallback() {
        assert_eq!(file_name(Path::new("/docs/report.pdf")), "report.pdf");
        assert_eq!(file_name(Path::new("relative.txt")), "relative.txt");
    }
}
