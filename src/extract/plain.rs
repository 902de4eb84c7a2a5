use crate::extract::DocumentExtractor;
use anyhow::Result;
use async_trait::async_trait;

/// Default extractor: decode bytes as UTF-8, replacing invalid sequences
pub struct PlainTextExtractor;

impl PlainTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PlainTextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentExtractor for PlainTextExtractor {
    async fn extract(&self, _name: &str, data: Vec<u8>) -> Result<String> {
        Ok(String::from_utf8_lossy(&data).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plain_utf8() {
        let extractor = PlainTextExtractor::new();
        let text = extractor.extract("a.txt", "héllo wörld".as_bytes().to_vec()).await.unwrap();
        assert_eq!(text, "héllo wörld");
    }

    #[tokio::test]
    async fn test_plain_invalid_utf8_is_replaced() {
        let extractor = PlainTextExtractor::new();
        let text = extractor.extract("a.txt", vec![0x68, 0x69, 0xFF, 0xFE]).await.unwrap();
        assert!(text.starts_with("hi"));
        assert!(text.contains('\u{FFFD}'));
    }
}
