pub mod chunker;
pub mod config;
pub mod embeddings;
pub mod extract;
pub mod finalize;
pub mod manifest;
pub mod models;
pub mod pipeline;
pub mod planner;
pub mod scanner;
pub mod staging;
pub mod store;
pub mod worker;

pub use config::Config;
pub use embeddings::EmbeddingProvider;
pub use models::{ChunkRecord, WorkItem, WorkerReport};
pub use pipeline::{IndexPipeline, ReloadFn, StatusFn};
pub use store::VectorStore;
