use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use ragmill::{
    config::Config,
    embeddings::TeiEmbeddingProvider,
    pipeline::{IndexPipeline, StatusFn},
    store::MeilisearchStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ragmill-index")]
#[command(about = "Index the document store into the vector index")]
#[command(version)]
struct Cli {
    /// Discard the existing index and manifest and reprocess everything
    #[arg(long)]
    force: bool,

    /// Config file path (defaults to config/settings.toml)
    #[arg(long)]
    config: Option<String>,

    /// Meilisearch URL (overrides config)
    #[arg(long)]
    meili_url: Option<String>,

    /// Meilisearch API key (overrides config and env)
    #[arg(long)]
    meili_key: Option<String>,

    /// TEI embedding server URL (overrides config)
    #[arg(long)]
    tei_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_default(),
    };
    if let Some(url) = cli.meili_url {
        config.meilisearch.url = url;
    }
    if let Some(key) = cli.meili_key {
        config.meilisearch.api_key = Some(key);
    }
    if let Some(url) = cli.tei_url {
        config.tei.url = url;
    }

    let embedder = Arc::new(TeiEmbeddingProvider::new(Some(&config.tei.url), None));
    let store = MeilisearchStore::new(
        &config.meilisearch.url,
        config.meilisearch_api_key().as_deref(),
        &config.meilisearch.index_name,
    )
    .await
    .context("Failed to create Meilisearch store")?;

    let pipeline = IndexPipeline::new(config, embedder, Box::new(store));

    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}").unwrap());
    pb.enable_steady_tick(Duration::from_millis(120));
    let pb_status = pb.clone();
    let status: StatusFn = Arc::new(move |s: &str| pb_status.set_message(s.to_string()));

    let summary = pipeline.reindex(cli.force, Some(status), None).await?;
    pb.finish_and_clear();

    println!("{}", summary);
    Ok(())
}
