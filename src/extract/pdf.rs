use crate::extract::DocumentExtractor;
use anyhow::{Context, Result};
use async_trait::async_trait;

/// PDF extractor working on in-memory bytes
pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentExtractor for PdfExtractor {
    async fn extract(&self, name: &str, data: Vec<u8>) -> Result<String> {
        let name = name.to_string();
        let text = tokio::task::spawn_blocking(move || -> Result<String> {
            use lopdf::Document;

            // lopdf first: quieter than pdf-extract on malformed pages
            let doc = Document::load_mem(&data)
                .with_context(|| format!("Failed to load PDF: {}", name))?;

            let mut text_content = String::new();
            for page_num in doc.get_pages().keys() {
                if let Ok(page_text) = doc.extract_text(&[*page_num]) {
                    text_content.push_str(&page_text);
                    text_content.push('\n');
                }
            }

            if text_content.trim().is_empty() {
                // Fallback: pdf-extract sometimes recovers text lopdf misses
                match pdf_extract::extract_text_from_mem(&data) {
                    Ok(text) => Ok(text.trim().to_string()),
                    Err(_) => Ok(String::new()),
                }
            } else {
                Ok(text_content.trim().to_string())
            }
        })
        .await?
        .map_err(anyhow::Error::from)?;

        Ok(text)
    }
}
