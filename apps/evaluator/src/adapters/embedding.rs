//! Embedding Adapter (§4.3) — idempotent embed-if-missing for CV chunks and
//! JD rule chunks.

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("provider error: {0}")]
    Provider(String),

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Counts returned for telemetry only; callers must not read vectors
/// directly (§4.3).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct EmbedCounts {
    pub embedded: usize,
    pub skipped: usize,
}

impl std::ops::AddAssign for EmbedCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.embedded += rhs.embedded;
        self.skipped += rhs.skipped;
    }
}

/// Embeds a batch of texts into vectors of a fixed declared dimension.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
    fn dimension(&self) -> usize;
}

struct PendingChunk {
    id: Uuid,
    content: String,
}

/// Embeds CV chunks and JD rule chunks, idempotently and in batches.
///
/// If `provider` is `None` the adapter is a no-op returning zero counts,
/// matching the "offline or test environments" contract in §4.3.
pub struct EmbeddingAdapter {
    pool: PgPool,
    provider: Option<std::sync::Arc<dyn EmbeddingProvider>>,
    batch_size: usize,
}

impl EmbeddingAdapter {
    pub fn new(pool: PgPool, provider: Option<std::sync::Arc<dyn EmbeddingProvider>>) -> Self {
        Self {
            pool,
            provider,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub async fn embed_cv_chunks(&self, cv_id: Uuid) -> Result<EmbedCounts, AppError> {
        let Some(provider) = self.provider.as_ref() else {
            return Ok(EmbedCounts::default());
        };

        let pending: Vec<PendingChunk> = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT cc.id, cc.content
            FROM cv_chunks cc
            JOIN cv_sections cs ON cs.id = cc.section_id
            WHERE cs.cv_id = $1 AND cc.embedding IS NULL
            ORDER BY cs.section_order ASC, cc.chunk_order ASC
            "#,
        )
        .bind(cv_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?
        .into_iter()
        .map(|(id, content)| PendingChunk { id, content })
        .collect();

        let already_embedded: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM cv_chunks cc
            JOIN cv_sections cs ON cs.id = cc.section_id
            WHERE cs.cv_id = $1 AND cc.embedding IS NOT NULL
            "#,
        )
        .bind(cv_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        self.embed_pending(provider.as_ref(), pending, already_embedded as usize, |id, vector| {
            sqlx::query("UPDATE cv_chunks SET embedding = $1 WHERE id = $2 AND embedding IS NULL")
                .bind(vector)
                .bind(id)
        })
        .await
    }

    pub async fn embed_jd_rule_chunks(&self, jd_id: Uuid) -> Result<EmbedCounts, AppError> {
        let Some(provider) = self.provider.as_ref() else {
            return Ok(EmbedCounts::default());
        };

        let pending: Vec<PendingChunk> = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT rc.id, rc.content
            FROM jd_rule_chunks rc
            JOIN jd_rules r ON r.id = rc.rule_id
            WHERE r.jd_id = $1 AND rc.embedding IS NULL
            ORDER BY r.rule_order ASC, rc.chunk_order ASC
            "#,
        )
        .bind(jd_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?
        .into_iter()
        .map(|(id, content)| PendingChunk { id, content })
        .collect();

        let already_embedded: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM jd_rule_chunks rc
            JOIN jd_rules r ON r.id = rc.rule_id
            WHERE r.jd_id = $1 AND rc.embedding IS NOT NULL
            "#,
        )
        .bind(jd_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        self.embed_pending(provider.as_ref(), pending, already_embedded as usize, |id, vector| {
            sqlx::query(
                "UPDATE jd_rule_chunks SET embedding = $1 WHERE id = $2 AND embedding IS NULL",
            )
            .bind(vector)
            .bind(id)
        })
        .await
    }

    /// Shared batching/validation/write loop for both chunk kinds.
    ///
    /// Each batch's vectors are validated against the declared dimension
    /// before any write; on mismatch the whole batch is dropped without
    /// writes (failed chunks remain missing and are retried on the next
    /// invocation — re-invocation after partial failure resumes without
    /// duplication because the write is conditioned on `embedding IS NULL`).
    async fn embed_pending<'q, F>(
        &self,
        provider: &dyn EmbeddingProvider,
        pending: Vec<PendingChunk>,
        already_embedded: usize,
        make_update: F,
    ) -> Result<EmbedCounts, AppError>
    where
        F: Fn(Uuid, pgvector::Vector) -> sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>,
    {
        let mut counts = EmbedCounts {
            embedded: 0,
            skipped: already_embedded,
        };

        for batch in pending.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();

            let vectors = match provider.embed_batch(&texts).await {
                Ok(v) => v,
                Err(e) => {
                    warn!("embedding batch failed, skipping without writes: {e}");
                    continue;
                }
            };

            if vectors.len() != batch.len() {
                warn!(
                    "embedding provider returned {} vectors for {} inputs, dropping batch",
                    vectors.len(),
                    batch.len()
                );
                continue;
            }

            let expected_dim = provider.dimension();
            if let Some(bad) = vectors.iter().find(|v| v.len() != expected_dim) {
                warn!(
                    "embedding dimension mismatch: expected {}, got {}, dropping batch",
                    expected_dim,
                    bad.len()
                );
                continue;
            }

            for (chunk, vector) in batch.iter().zip(vectors.into_iter()) {
                let pg_vector = pgvector::Vector::from(vector);
                make_update(chunk.id, pg_vector)
                    .execute(&self.pool)
                    .await
                    .map_err(AppError::from)?;
                counts.embedded += 1;
            }
        }

        info!(
            "embedding pass complete: embedded={} skipped={}",
            counts.embedded, counts.skipped
        );
        Ok(counts)
    }
}

#[derive(serde::Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(serde::Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(serde::Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// HTTP embedding provider. Vendor-agnostic: any provider speaking the
/// `{model, input} -> {data: [{embedding}]}` shape (Voyage AI, OpenAI, and
/// compatible gateways all do) can be plugged in via `EMBEDDING_API_URL`.
pub struct HttpEmbeddingProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    dimension: usize,
}

impl HttpEmbeddingProvider {
    pub fn new(api_url: String, api_key: String, model: String, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("Failed to build HTTP client"),
            api_url,
            api_key,
            model,
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: texts,
            })
            .send()
            .await
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingError::Provider(format!("status {status}: {body}")));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Provider(e.to_string()))?;

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub struct FakeProvider {
        pub dim: usize,
        pub calls: AtomicUsize,
    }

    impl FakeProvider {
        pub fn new(dim: usize) -> Self {
            Self {
                dim,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FakeProvider {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|_| vec![0.1f32; self.dim]).collect())
        }

        fn dimension(&self) -> usize {
            self.dim
        }
    }

    #[test]
    fn embed_counts_add_assign() {
        let mut a = EmbedCounts {
            embedded: 2,
            skipped: 1,
        };
        a += EmbedCounts {
            embedded: 3,
            skipped: 0,
        };
        assert_eq!(a.embedded, 5);
        assert_eq!(a.skipped, 1);
    }
}
