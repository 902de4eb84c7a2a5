pub mod meili;
pub mod r#trait;

pub use meili::MeilisearchStore;
pub use r#trait::VectorStore;
