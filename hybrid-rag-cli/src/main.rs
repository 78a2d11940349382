//! `hybrid-rag`: ingest articles into Qdrant and retrieve context for questions.

mod cli;
mod telemetry;

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use hybrid_rag::qdrant::QdrantVectorStore;
use hybrid_rag::{
    Bm25Encoder, EmbeddingService, IngestionPipeline, RagConfig, RetrievalMatch, RetrievalRunner,
    VectorStore, dense_provider_from_config,
};
use tracing::info;

use crate::cli::{Cli, Command};

/// Overrides `store.url` from the config file.
const QDRANT_URL_ENV: &str = "HYBRID_RAG_QDRANT_URL";

fn load_config(cli: &Cli) -> anyhow::Result<RagConfig> {
    let mut config = match &cli.config {
        Some(path) => RagConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => RagConfig::default(),
    };
    if let Ok(url) = std::env::var(QDRANT_URL_ENV) {
        config.store.url = url;
    }
    config.validate()?;
    Ok(config)
}

fn embedding_service(config: &RagConfig) -> anyhow::Result<Arc<EmbeddingService>> {
    let dense = dense_provider_from_config(&config.embedding)?;
    let sparse = Arc::new(Bm25Encoder::for_model(&config.embedding.sparse_model)?);
    let service = EmbeddingService::new(
        dense,
        Some(sparse),
        config.embedding.dense_dimensions,
        config.embedding.batch_size,
    )?;
    Ok(Arc::new(service))
}

fn vector_store(config: &RagConfig) -> anyhow::Result<Arc<dyn VectorStore>> {
    let store = QdrantVectorStore::new(&config.store.url)
        .with_context(|| format!("connecting to Qdrant at {}", config.store.url))?;
    Ok(Arc::new(store))
}

fn print_matches(matches: &[RetrievalMatch], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(matches)?);
        return Ok(());
    }
    for (rank, m) in matches.iter().enumerate() {
        let field = |key: &str| m.metadata.get(key).and_then(|v| v.as_str()).unwrap_or("-");
        println!(
            "{}. [{:.4}] {} ({}, {})",
            rank + 1,
            m.score,
            field("title"),
            field("author"),
            field("source")
        );
        println!("   {}", m.text.replace('\n', " "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    telemetry::init(cli.verbose, cli.log_format);

    let config = load_config(&cli)?;

    match &cli.command {
        Command::Config => {
            print!("{}", config.to_yaml()?);
        }
        Command::Ingest { csv } => {
            let pipeline = IngestionPipeline::builder()
                .config(config.clone())
                .embeddings(embedding_service(&config)?)
                .vector_store(vector_store(&config)?)
                .build()?;
            let report = pipeline
                .ingest_csv(csv)
                .await
                .with_context(|| format!("ingesting {}", csv.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Query { text, json } => {
            let runner = RetrievalRunner::from_config(
                embedding_service(&config)?,
                vector_store(&config)?,
                &config,
            );
            let matches = runner.retrieve(text).await?;
            info!(count = matches.len(), "query finished");
            print_matches(&matches, *json)?;
        }
    }
    Ok(())
}
