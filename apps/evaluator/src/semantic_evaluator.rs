//! Semantic Evaluator (§4.5) — the shared evidence-gathering core used by
//! both the CV Quality Engine and the JD Matching Engine. Neither engine
//! queries the vector store or classifies bands itself; both funnel
//! through here so a divergence in evidence computation can't exist
//! between them (§9).

use serde::Serialize;
use uuid::Uuid;

use crate::adapters::vector_store::VectorStore;
use crate::errors::AppError;
use crate::models::cv::SectionType;
use crate::models::jd::JdWithRules;
use crate::models::rule_set::QualityRuleWithChunks;
use crate::similarity::{
    aggregate_rule_result, classify_band, compare_candidates, distance_to_similarity,
    sort_candidates, upgrade_eligible, Band, Candidate, MatchStatus, Thresholds,
};

#[derive(Debug, Clone, Copy)]
pub struct EvalConfig {
    pub top_k: i64,
    pub thresholds: Thresholds,
}

/// A single rule chunk's embedding state, already loaded by the caller.
#[derive(Debug, Clone)]
pub struct RuleChunkInput {
    pub chunk_id: Uuid,
    pub embedding: Option<pgvector::Vector>,
}

/// A rule as seen by the shared core, stripped of whichever model type
/// (CV quality rule or JD rule) it originated from.
#[derive(Debug, Clone)]
pub struct RuleEvalInput {
    pub rule_id: Uuid,
    pub rule_key: String,
    pub rule_content: String,
    pub applies_to_sections: Vec<SectionType>,
    pub chunks: Vec<RuleChunkInput>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkEvidence {
    pub rule_chunk_id: Uuid,
    pub candidates: Vec<CandidateView>,
    pub best_match: Option<CandidateView>,
    pub best_band: Band,
}

/// Serializable projection of `Candidate`; the raw type stays internal to
/// the similarity contract.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateView {
    pub chunk_id: Uuid,
    pub section: SectionType,
    pub chunk_order: i32,
    pub similarity: f64,
    pub band: Band,
    pub content: String,
}

impl CandidateView {
    fn new(c: &Candidate, content: String) -> Self {
        CandidateView {
            chunk_id: c.chunk_id,
            section: c.section,
            chunk_order: c.chunk_order,
            similarity: c.similarity,
            band: c.band,
            content,
        }
    }

    fn as_candidate(&self) -> Candidate {
        Candidate {
            chunk_id: self.chunk_id,
            section: self.section,
            chunk_order: self.chunk_order,
            similarity: self.similarity,
            band: self.band,
        }
    }
}

/// Picks the best of several `CandidateView`s using the same total order
/// the similarity contract defines (§4.1), for callers (the JD Matching
/// Engine) that need to compare bests across rule chunks after mutating
/// bands with judge overrides.
pub fn best_view<'a>(
    views: impl IntoIterator<Item = &'a CandidateView>,
    applies_to_sections: &[SectionType],
) -> Option<&'a CandidateView> {
    views.into_iter().min_by(|a, b| {
        compare_candidates(&a.as_candidate(), &b.as_candidate(), applies_to_sections)
    })
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleEvalResult {
    pub rule_id: Uuid,
    pub rule_key: String,
    pub rule_content: String,
    pub chunk_evidence: Vec<ChunkEvidence>,
    pub result: MatchStatus,
    pub best_match: Option<CandidateView>,
    pub candidate_count: usize,
    pub upgraded: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct EvalSummary {
    pub total: usize,
    pub full: usize,
    pub partial: usize,
    pub none: usize,
    pub no_evidence: usize,
}

impl EvalSummary {
    fn record(&mut self, status: MatchStatus) {
        self.total += 1;
        match status {
            MatchStatus::Full => self.full += 1,
            MatchStatus::Partial => self.partial += 1,
            MatchStatus::None => self.none += 1,
            MatchStatus::NoEvidence => self.no_evidence += 1,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalOutput {
    pub results: Vec<RuleEvalResult>,
    pub summary: EvalSummary,
}

/// `evaluateCvQualityRules(cvId, ruleSetKey, config)` (§4.5). The rule set
/// itself is loaded by the CV Quality Engine; this wrapper only adapts the
/// already-loaded rows into the shared core's input shape.
pub async fn evaluate_cv_quality_rules(
    store: &dyn VectorStore,
    cv_id: Uuid,
    rules: &[QualityRuleWithChunks],
    config: &EvalConfig,
) -> Result<EvalOutput, AppError> {
    let inputs: Vec<RuleEvalInput> = rules
        .iter()
        .map(|r| RuleEvalInput {
            rule_id: r.rule.id,
            rule_key: r.rule.rule_key.clone(),
            rule_content: r
                .chunks
                .iter()
                .map(|c| c.content.as_str())
                .collect::<Vec<_>>()
                .join(". "),
            applies_to_sections: r.rule.applies_to_sections.clone(),
            chunks: r
                .chunks
                .iter()
                .map(|c| RuleChunkInput {
                    chunk_id: c.id,
                    embedding: c.embedding.clone(),
                })
                .collect(),
        })
        .collect();

    evaluate_rules(store, cv_id, &inputs, config).await
}

/// `evaluateJdRules(cvId, jdId, config)` (§4.5). Excludes ignored and
/// INFORMATIONAL rules by delegating to `JdWithRules::matchable_rules`.
pub async fn evaluate_jd_rules(
    store: &dyn VectorStore,
    cv_id: Uuid,
    jd: &JdWithRules,
    config: &EvalConfig,
) -> Result<EvalOutput, AppError> {
    let inputs: Vec<RuleEvalInput> = jd
        .matchable_rules()
        .map(|r| RuleEvalInput {
            rule_id: r.rule.id,
            rule_key: r.rule.id.to_string(),
            rule_content: r.rule.content.clone(),
            applies_to_sections: Vec::new(),
            chunks: r
                .chunks
                .iter()
                .map(|c| RuleChunkInput {
                    chunk_id: c.id,
                    embedding: c.embedding.clone(),
                })
                .collect(),
        })
        .collect();

    evaluate_rules(store, cv_id, &inputs, config).await
}

/// The shared core itself: produces ranked candidates, best band, and an
/// aggregated (possibly upgraded) result per rule.
pub async fn evaluate_rules(
    store: &dyn VectorStore,
    cv_id: Uuid,
    rules: &[RuleEvalInput],
    config: &EvalConfig,
) -> Result<EvalOutput, AppError> {
    let mut results = Vec::with_capacity(rules.len());
    let mut summary = EvalSummary::default();

    for rule in rules {
        let result = evaluate_one_rule(store, cv_id, rule, config).await?;
        summary.record(result.result);
        results.push(result);
    }

    Ok(EvalOutput { results, summary })
}

async fn evaluate_one_rule(
    store: &dyn VectorStore,
    cv_id: Uuid,
    rule: &RuleEvalInput,
    config: &EvalConfig,
) -> Result<RuleEvalResult, AppError> {
    let over_fetch = config.top_k * 2;
    let mut chunk_evidence = Vec::with_capacity(rule.chunks.len());
    let mut best_bands = Vec::with_capacity(rule.chunks.len());
    let mut per_chunk_best: Vec<(Candidate, String)> = Vec::new();
    let mut candidate_count = 0usize;
    let mut candidates_at_or_above_low = 0usize;

    for rule_chunk in &rule.chunks {
        let Some(embedding) = rule_chunk.embedding.as_ref() else {
            chunk_evidence.push(ChunkEvidence {
                rule_chunk_id: rule_chunk.chunk_id,
                candidates: Vec::new(),
                best_match: None,
                best_band: Band::NoEvidence,
            });
            best_bands.push(Band::NoEvidence);
            continue;
        };

        let raw = store
            .top_k(rule_chunk.chunk_id, embedding, cv_id, over_fetch)
            .await?;

        let mut content_by_chunk = std::collections::HashMap::with_capacity(raw.len());
        let mut candidates: Vec<Candidate> = raw
            .into_iter()
            .map(|r| {
                let similarity = distance_to_similarity(r.cosine_distance);
                content_by_chunk.insert(r.cv_chunk_id, r.content);
                Candidate {
                    chunk_id: r.cv_chunk_id,
                    section: r.section_type,
                    chunk_order: r.chunk_order,
                    similarity,
                    band: classify_band(similarity, &config.thresholds),
                }
            })
            .filter(|c| c.similarity >= config.thresholds.floor)
            .collect();

        candidate_count += candidates.len();
        candidates_at_or_above_low +=
            candidates.iter().filter(|c| c.similarity >= config.thresholds.low).count();

        sort_candidates(&mut candidates, &rule.applies_to_sections);
        candidates.truncate(config.top_k.max(0) as usize);

        let best = candidates.first().cloned();
        let best_band = best.as_ref().map(|c| c.band).unwrap_or(Band::NoEvidence);
        if let Some(b) = &best {
            let content = content_by_chunk.get(&b.chunk_id).cloned().unwrap_or_default();
            per_chunk_best.push((b.clone(), content));
        }
        best_bands.push(best_band);

        chunk_evidence.push(ChunkEvidence {
            rule_chunk_id: rule_chunk.chunk_id,
            candidates: candidates
                .iter()
                .map(|c| CandidateView::new(c, content_by_chunk.get(&c.chunk_id).cloned().unwrap_or_default()))
                .collect(),
            best_match: best
                .as_ref()
                .map(|c| CandidateView::new(c, content_by_chunk.get(&c.chunk_id).cloned().unwrap_or_default())),
            best_band,
        });
    }

    let mut result = aggregate_rule_result(&best_bands);
    let mut upgraded = false;

    let overall_best = {
        let mut bests = per_chunk_best;
        bests.sort_by(|a, b| compare_candidates(&a.0, &b.0, &rule.applies_to_sections));
        bests.into_iter().next()
    };

    if result == MatchStatus::Partial {
        if let Some((best, _)) = &overall_best {
            if upgrade_eligible(best, &config.thresholds, candidates_at_or_above_low) {
                result = MatchStatus::Full;
                upgraded = true;
            }
        }
    }

    Ok(RuleEvalResult {
        rule_id: rule.rule_id,
        rule_key: rule.rule_key.clone(),
        rule_content: rule.rule_content.clone(),
        chunk_evidence,
        result,
        best_match: overall_best
            .as_ref()
            .map(|(c, content)| CandidateView::new(c, content.clone())),
        candidate_count,
        upgraded,
    })
}
