pub mod tei;
pub mod r#trait;

pub use r#trait::EmbeddingProvider;
pub use tei::TeiEmbeddingProvider;
