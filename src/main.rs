// src/main.rs
// Quorum debate server.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use quorum::api::http::create_router;
use quorum::config::CONFIG;
use quorum::debate::orchestrator::Orchestrator;
use quorum::debate::registry::DebateRegistry;
use quorum::providers::embeddings::{EmbeddingProvider, OpenAiEmbeddings};
use quorum::providers::ProviderRegistry;
use quorum::quality::{
    ContradictionDetector, EmbeddingService, HealthScorer, LoopDetector, QualityPipeline,
};
use quorum::state::AppState;
use quorum::store::{QdrantIndex, SqliteStore, VectorIndex};

#[derive(Parser)]
#[command(name = "quorum", about = "Multi-LLM debate orchestration server")]
struct Cli {
    /// Bind address
    #[arg(long, env = "HOST")]
    host: Option<String>,

    /// Bind port
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Qdrant endpoint for embedding search
    #[arg(long, env = "QDRANT_URL")]
    qdrant_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let log_level = if CONFIG.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let host = cli.host.unwrap_or_else(|| CONFIG.host.clone());
    let port = cli.port.unwrap_or(CONFIG.port);
    let database_url = cli.database_url.unwrap_or_else(|| CONFIG.database_url.clone());
    let qdrant_url = cli.qdrant_url.unwrap_or_else(|| CONFIG.qdrant_url.clone());

    // Storage
    let store = SqliteStore::connect(&database_url).await?;

    // Providers
    let providers = Arc::new(ProviderRegistry::from_env());
    let families = providers.available_families();
    if families.is_empty() {
        anyhow::bail!("No chat providers configured - check API keys");
    }
    info!(
        "Chat providers configured: {}",
        families
            .iter()
            .map(|f| f.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let embedding_provider: Arc<dyn EmbeddingProvider> = Arc::new(
        OpenAiEmbeddings::from_env().context("Embedding provider requires OPENAI_API_KEY")?,
    );

    // Vector index
    let vector_index: Arc<dyn VectorIndex> = Arc::new(
        QdrantIndex::new(
            &qdrant_url,
            &CONFIG.qdrant_collection,
            embedding_provider.dimensions(),
        )
        .await?,
    );
    info!("Vector index ready at {qdrant_url}");

    // Quality pipeline
    let embeddings = Arc::new(EmbeddingService::new(
        embedding_provider,
        vector_index,
        store.clone(),
    ));
    let pipeline = Arc::new(QualityPipeline::new(
        store.clone(),
        embeddings.clone(),
        ContradictionDetector::new(embeddings.clone(), providers.clone(), store.clone()),
        LoopDetector::new(providers.clone(), store.clone()),
        HealthScorer::new(embeddings.clone(), store.clone()),
    ));

    // Orchestrator
    let registry = Arc::new(DebateRegistry::new());
    let orchestrator = Arc::new(Orchestrator::new(registry, providers, pipeline));

    let app = create_router(AppState::new(orchestrator, store));

    let addr = format!("{host}:{port}");
    info!("Quorum listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
