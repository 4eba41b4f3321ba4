mod adapters;
mod config;
mod db;
mod errors;
mod gap_detector;
mod jd_matching;
mod llm_client;
mod models;
mod orchestrator;
mod quality_engine;
mod repository;
mod result;
mod routes;
mod semantic_evaluator;
mod similarity;
mod state;
mod structural_rules;
mod suggestion_generator;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::adapters::embedding::{EmbeddingAdapter, EmbeddingProvider, HttpEmbeddingProvider};
use crate::adapters::llm_judge::{ClaudeJudge, DisabledJudge, LlmJudge};
use crate::adapters::vector_store::{PgVectorStore, VectorStore};
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (panics on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let target = env!("CARGO_PKG_NAME").replace('-', "_");
            EnvFilter::new(format!("{target}={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting CV/JD evaluation engine v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone());
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let vector_store: Arc<dyn VectorStore> = Arc::new(PgVectorStore::new(db.clone()));

    let judge: Arc<dyn LlmJudge> = if config.llm_judge_enabled {
        Arc::new(ClaudeJudge::new(llm.clone()))
    } else {
        Arc::new(DisabledJudge)
    };

    let embedding_provider: Option<Arc<dyn EmbeddingProvider>> = match &config.embedding_api_url {
        Some(url) => {
            info!("Embedding provider configured: {} ({})", config.embedding_model, url);
            Some(Arc::new(HttpEmbeddingProvider::new(
                url.clone(),
                config.embedding_api_key.clone().unwrap_or_default(),
                config.embedding_model.clone(),
                config.embedding_dimension,
            )))
        }
        None => {
            info!("No EMBEDDING_API_URL configured; embedding adapter runs as a no-op");
            None
        }
    };
    let embedding = Arc::new(EmbeddingAdapter::new(db.clone(), embedding_provider));

    // Build app state
    let state = AppState {
        db,
        llm,
        config: config.clone(),
        vector_store,
        judge,
        embedding,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
