//! Vector Store Adapter (§4.2) — executes top-K cosine-distance queries
//! keyed on rule-chunk embedding × CV id.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::cv::SectionType;

/// Bounded parallelism for fanning individual `top_k` queries out across a
/// batch, when the caller does not use a single batched SQL statement (§5:
/// "topK parallelism budget, default 8").
pub const TOP_K_PARALLELISM: usize = 8;

#[derive(Debug, Clone)]
pub struct RawCandidate {
    pub cv_chunk_id: Uuid,
    pub section_id: Uuid,
    pub section_type: SectionType,
    pub chunk_order: i32,
    pub content: String,
    pub cosine_distance: f64,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Returns up to `k` candidates for the query embedding against CV
    /// `cv_id`, sorted by cosine distance ascending with the SQL-level
    /// tie-break `(sectionId asc, chunkOrder asc, chunkId asc)` (§4.2).
    async fn top_k(
        &self,
        query_id: Uuid,
        query_embedding: &pgvector::Vector,
        cv_id: Uuid,
        k: i64,
    ) -> Result<Vec<RawCandidate>, AppError>;

    /// Batch form. Must produce the same result as independently calling
    /// `top_k` for each id (§4.2); the default implementation fans the
    /// individual queries out with bounded concurrency, which satisfies
    /// that equivalence trivially since each query is independent.
    async fn top_k_batch(
        &self,
        queries: &[(Uuid, pgvector::Vector)],
        cv_id: Uuid,
        k: i64,
    ) -> Result<HashMap<Uuid, Vec<RawCandidate>>, AppError> {
        let results: Vec<(Uuid, Result<Vec<RawCandidate>, AppError>)> = stream::iter(queries)
            .map(|(id, emb)| async move {
                let candidates = self.top_k(*id, emb, cv_id, k).await;
                (*id, candidates)
            })
            .buffer_unordered(TOP_K_PARALLELISM)
            .collect()
            .await;

        let mut out = HashMap::with_capacity(results.len());
        for (id, candidates) in results {
            out.insert(id, candidates?);
        }
        Ok(out)
    }
}

/// Postgres/`pgvector` implementation. Joins `cv_chunks` to `cv_sections` so
/// the result can be annotated with section type for the similarity
/// contract's weighting and tie-break.
pub struct PgVectorStore {
    pool: PgPool,
}

impl PgVectorStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    async fn top_k(
        &self,
        _query_id: Uuid,
        query_embedding: &pgvector::Vector,
        cv_id: Uuid,
        k: i64,
    ) -> Result<Vec<RawCandidate>, AppError> {
        let rows = sqlx::query_as::<_, CandidateRow>(
            r#"
            SELECT
                cc.id AS cv_chunk_id,
                cs.id AS section_id,
                cs.section_type AS section_type,
                cc.chunk_order AS chunk_order,
                cc.content AS content,
                (cc.embedding <=> $1) AS cosine_distance
            FROM cv_chunks cc
            JOIN cv_sections cs ON cs.id = cc.section_id
            WHERE cs.cv_id = $2 AND cc.embedding IS NOT NULL
            ORDER BY cc.embedding <=> $1, cs.id ASC, cc.chunk_order ASC, cc.id ASC
            LIMIT $3
            "#,
        )
        .bind(query_embedding)
        .bind(cv_id)
        .bind(k)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::VectorStore(e.to_string()))?;

        Ok(rows.into_iter().map(RawCandidate::from).collect())
    }
}

#[derive(sqlx::FromRow)]
struct CandidateRow {
    cv_chunk_id: Uuid,
    section_id: Uuid,
    section_type: SectionType,
    chunk_order: i32,
    content: String,
    cosine_distance: f64,
}

impl From<CandidateRow> for RawCandidate {
    fn from(row: CandidateRow) -> Self {
        RawCandidate {
            cv_chunk_id: row.cv_chunk_id,
            section_id: row.section_id,
            section_type: row.section_type,
            chunk_order: row.chunk_order,
            content: row.content,
            cosine_distance: row.cosine_distance,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    /// In-memory stand-in used by engine-level tests (§4.5 onward) so they
    /// don't need a live Postgres instance. Returns pre-seeded candidates
    /// per query id, already in vector-store sorted order.
    pub struct FakeVectorStore {
        pub by_query: Mutex<HashMap<Uuid, Vec<RawCandidate>>>,
    }

    impl FakeVectorStore {
        pub fn new(by_query: HashMap<Uuid, Vec<RawCandidate>>) -> Self {
            Self {
                by_query: Mutex::new(by_query),
            }
        }
    }

    #[async_trait]
    impl VectorStore for FakeVectorStore {
        async fn top_k(
            &self,
            query_id: Uuid,
            _query_embedding: &pgvector::Vector,
            _cv_id: Uuid,
            k: i64,
        ) -> Result<Vec<RawCandidate>, AppError> {
            let map = self.by_query.lock().unwrap();
            let mut candidates = map.get(&query_id).cloned().unwrap_or_default();
            candidates.truncate(k as usize);
            Ok(candidates)
        }
    }

    #[tokio::test]
    async fn batch_matches_independent_calls() {
        let id1 = Uuid::new_v4();
        let id2 = Uuid::new_v4();
        let cv_id = Uuid::new_v4();
        let chunk = RawCandidate {
            cv_chunk_id: Uuid::new_v4(),
            section_id: Uuid::new_v4(),
            section_type: SectionType::Skills,
            chunk_order: 0,
            content: "Rust".into(),
            cosine_distance: 0.2,
        };
        let mut seed = HashMap::new();
        seed.insert(id1, vec![chunk.clone()]);
        seed.insert(id2, vec![chunk]);
        let store = FakeVectorStore::new(seed);

        let emb = pgvector::Vector::from(vec![0.0f32; 4]);
        let individual_1 = store.top_k(id1, &emb, cv_id, 5).await.unwrap();
        let individual_2 = store.top_k(id2, &emb, cv_id, 5).await.unwrap();

        let batch = store
            .top_k_batch(&[(id1, emb.clone()), (id2, emb.clone())], cv_id, 5)
            .await
            .unwrap();

        assert_eq!(batch[&id1].len(), individual_1.len());
        assert_eq!(batch[&id2].len(), individual_2.len());
    }
}
