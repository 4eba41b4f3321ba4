use std::sync::Arc;

use sqlx::PgPool;

use crate::adapters::embedding::EmbeddingAdapter;
use crate::adapters::llm_judge::LlmJudge;
use crate::adapters::vector_store::VectorStore;
use crate::config::Config;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub llm: LlmClient,
    pub config: Config,
    pub vector_store: Arc<dyn VectorStore>,
    pub judge: Arc<dyn LlmJudge>,
    pub embedding: Arc<EmbeddingAdapter>,
}
