pub mod pdf;
pub mod plain;
pub mod r#trait;

pub use pdf::PdfExtractor;
pub use plain::PlainTextExtractor;
pub use r#trait::DocumentExtractor;

use std::path::Path;
use std::sync::Arc;

/// Factory for picking an extractor from a document name's extension
pub struct ExtractorFactory;

impl ExtractorFactory {
    /// Select an extractor for a file or archive-entry name
    pub fn for_name(name: &str) -> Arc<dyn DocumentExtractor> {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|s| s.to_lowercase());

        match extension.as_deref() {
            Some("pdf") => Arc::new(PdfExtractor::new()),
            _ => Arc::new(PlainTextExtractor::new()),
        }
    }
}
