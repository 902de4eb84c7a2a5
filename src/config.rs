use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration loaded from settings.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub meilisearch: MeilisearchConfig,
    pub tei: TeiConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub parallelism: ParallelismConfig,
}

/// Where documents live and where the pipeline keeps its own state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Flat directory of source files; archives are .zip
    pub docs_dir: String,
    /// Holds the manifest and the per-run staging area
    pub index_dir: String,
    #[serde(default = "default_upsert_batch")]
    pub upsert_batch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeilisearchConfig {
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    pub index_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeiConfig {
    pub url: String,
    #[serde(default = "default_tei_timeout_secs")]
    pub startup_timeout_secs: u64,
    /// Chunks per HTTP request; the provider max batch size caps this
    #[serde(default = "default_tei_request_batch")]
    pub request_batch: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelismConfig {
    /// Worker processes in the deployment this config models
    pub workers: usize,
    /// Concurrent work items per worker
    pub worker_concurrency: usize,
}

fn default_upsert_batch() -> usize {
    5_000
}

fn default_tei_timeout_secs() -> u64 {
    120
}

fn default_tei_request_batch() -> usize {
    256
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 64,
        }
    }
}

impl Default for ParallelismConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            worker_concurrency: 4,
        }
    }
}

impl ParallelismConfig {
    /// Total work-item slots across the pool
    pub fn total_slots(&self) -> usize {
        (self.workers * self.worker_concurrency).max(1)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Load configuration from default location or return defaults
    pub fn load() -> Result<Self> {
        let default_paths = [
            PathBuf::from("config/settings.toml"),
            PathBuf::from("./config/settings.toml"),
            PathBuf::from("~/.config/ragmill/settings.toml"),
        ];

        for path in &default_paths {
            let expanded = PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string());
            if expanded.exists() {
                return Self::from_file(expanded);
            }
        }

        Ok(Self::default())
    }

    /// Get Meilisearch API key from config or environment variable
    pub fn meilisearch_api_key(&self) -> Option<String> {
        self.meilisearch
            .api_key
            .clone()
            .or_else(|| std::env::var("MEILI_MASTER_KEY").ok())
    }

    /// Document store directory with ~ expanded
    pub fn docs_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.store.docs_dir).to_string())
    }

    /// Index state directory with ~ expanded
    pub fn index_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.store.index_dir).to_string())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                docs_dir: "/data/rag/docs".to_string(),
                index_dir: "/data/rag/index".to_string(),
                upsert_batch: default_upsert_batch(),
            },
            meilisearch: MeilisearchConfig {
                url: "http://127.0.0.1:7700".to_string(),
                api_key: None,
                index_name: "ragmill".to_string(),
            },
            tei: TeiConfig {
                url: "http://127.0.0.1:8000".to_string(),
                startup_timeout_secs: default_tei_timeout_secs(),
                request_batch: default_tei_request_batch(),
            },
            chunking: ChunkingConfig::default(),
            parallelism: ParallelismConfig::default(),
        }
    }
}
