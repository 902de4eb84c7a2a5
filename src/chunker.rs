use crate::models::{ChunkMetadata, SourceDocument};

/// One bounded text slice with its stable identifier
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Deterministic fixed-size splitter with overlap.
///
/// Windows are measured in characters and stepped by `chunk_size - overlap`,
/// so re-splitting identical input always reproduces the identical chunk and
/// id set. That stability is what makes upserts idempotent.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    overlap: usize,
}

impl TextSplitter {
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        // step must stay positive
        let overlap = overlap.min(chunk_size - 1);
        Self { chunk_size, overlap }
    }

    /// Split raw text into overlapping windows
    pub fn split(&self, text: &str) -> Vec<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = trimmed.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![trimmed.to_string()];
        }

        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }
        chunks
    }

    /// Split a document into identified chunks ready for embedding
    pub fn split_document(&self, doc: &SourceDocument) -> Vec<Chunk> {
        let metadata = doc.metadata();
        self.split(&doc.text)
            .into_iter()
            .enumerate()
            .map(|(ordinal, text)| Chunk {
                id: chunk_id(&doc.source, doc.filename.as_deref(), ordinal, &text),
                text,
                metadata: metadata.clone(),
            })
            .collect()
    }
}

/// Stable chunk identifier derived from provenance, position and content
pub fn chunk_id(source: &str, filename: Option<&str>, ordinal: usize, content: &str) -> String {
    let combined = format!("{}:{}:{}:{}", source, filename.unwrap_or(""), ordinal, content);
    let hash = blake3::hash(combined.as_bytes());
    format!("chunk_{}", &hash.to_hex()[..32])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(text: &str) -> SourceDocument {
        SourceDocument::new("a.txt", None, text.to_string())
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        let splitter = TextSplitter::new(512, 64);
        let chunks = splitter.split("short text");
        assert_eq!(chunks, vec!["short text".to_string()]);
    }

    #[test]
    fn test_blank_text_yields_nothing() {
        let splitter = TextSplitter::new(512, 64);
        assert!(splitter.split("").is_empty());
        assert!(splitter.split("   \n\t ").is_empty());
    }

    #[test]
    fn test_windows_overlap_and_cover() {
        let splitter = TextSplitter::new(10, 3);
        let text = "abcdefghijklmnopqrstuvwxyz";
        let chunks = splitter.split(text);

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        // consecutive windows share the overlap
        for pair in chunks.windows(2) {
            let tail: String = pair[0].chars().rev().take(3).collect::<Vec<_>>().into_iter().rev().collect();
            assert!(pair[1].starts_with(&tail));
        }
        // every character of the input appears in some window
        assert!(chunks.concat().contains("xyz"));
        assert!(chunks[0].starts_with("abc"));
    }

    #[test]
    fn test_split_is_deterministic() {
        let splitter = TextSplitter::new(10, 3);
        let text = "the quick brown fox jumps over the lazy dog";
        let first: Vec<Chunk> = splitter.split_document(&doc(text));
        let second: Vec<Chunk> = splitter.split_document(&doc(text));

        let first_ids: Vec<&str> = first.iter().map(|c| c.id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn test_ids_distinguish_source_and_position() {
        let id_a = chunk_id("a.txt", None, 0, "same content");
        let id_b = chunk_id("b.txt", None, 0, "same content");
        let id_c = chunk_id("a.txt", None, 1, "same content");
        let id_d = chunk_id("a.txt", Some("entry.txt"), 0, "same content");

        assert_ne!(id_a, id_b);
        assert_ne!(id_a, id_c);
        assert_ne!(id_a, id_d);
        assert!(id_a.starts_with("chunk_"));
        assert_eq!(id_a.len(), "chunk_".len() + 32);
    }

    #[test]
    fn test_overlap_clamped_below_chunk_size() {
        // would loop forever if the step could reach zero
        let splitter = TextSplitter::new(5, 5);
        let chunks = splitter.split("abcdefghij");
        assert!(chunks.len() >= 2);
    }

    #[test]
    fn test_document_chunks_carry_metadata() {
        let splitter = TextSplitter::new(512, 64);
        let document = SourceDocument::new("big.zip", Some("inner/a.txt".to_string()), "hello world".to_string());
        let chunks = splitter.split_document(&document);

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.source, "big.zip");
        assert_eq!(chunks[0].metadata.filename.as_deref(), Some("inner/a.txt"));
    }
}
