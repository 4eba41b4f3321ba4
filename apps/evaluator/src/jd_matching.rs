//! JD Matching Engine (§4.7) — turns semantic evidence against a job
//! description into a per-rule match trace, gaps, and suggestions.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::adapters::llm_judge::{JudgeOutcome, JudgeQuestion, JudgeStatus, LlmJudge};
use crate::adapters::vector_store::VectorStore;
use crate::errors::AppError;
use crate::gap_detector::{self, Gap};
use crate::models::cv::SectionType;
use crate::models::jd::{JdRuleType, JdWithRules};
use crate::semantic_evaluator::{self, best_view, CandidateView, EvalConfig};
use crate::similarity::{Band, MatchStatus};
use crate::suggestion_generator::{self, Suggestion};

#[derive(Debug, Clone, Copy)]
pub struct RuleTypeWeights {
    pub must_have: f64,
    pub nice_to_have: f64,
    pub best_practice: f64,
}

impl Default for RuleTypeWeights {
    fn default() -> Self {
        Self {
            must_have: 0.5,
            nice_to_have: 0.3,
            best_practice: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JdMatchConfig {
    pub eval: EvalConfig,
    pub llm_judge_enabled: bool,
    pub multi_mention_high: f64,
    pub rule_type_weights: RuleTypeWeights,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchLevel {
    StrongMatch,
    GoodMatch,
    PartialMatch,
    LowMatch,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct MentionDetails {
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkMatchEvidence {
    pub rule_chunk_id: Uuid,
    pub effective_band: Band,
    pub best_match: Option<CandidateView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleMatchTrace {
    pub rule_id: Uuid,
    pub rule_key: String,
    pub rule_type: JdRuleType,
    pub rule_content: String,
    pub match_status: MatchStatus,
    pub best_match: Option<CandidateView>,
    pub chunk_evidence: Vec<ChunkMatchEvidence>,
    pub section_upgrade_applied: bool,
    pub upgrade_from_section: Option<SectionType>,
    pub judge_downgrade_applied: bool,
    pub multi_mention_count: usize,
    pub multi_mention_boost: bool,
    pub mention_details: MentionDetails,
    pub score: f64,
    pub weighted_score: f64,
}

fn rule_type_multiplier(rule_type: JdRuleType) -> f64 {
    match rule_type {
        JdRuleType::MustHave => 3.0,
        JdRuleType::NiceToHave => 2.0,
        JdRuleType::BestPractice => 1.0,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RuleTypeCoverage {
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JdMatchScores {
    pub must_have: RuleTypeCoverage,
    pub nice_to_have: RuleTypeCoverage,
    pub best_practice: RuleTypeCoverage,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JdMatchResult {
    pub level: MatchLevel,
    pub match_trace: Vec<RuleMatchTrace>,
    pub gaps: Vec<Gap>,
    pub suggestions: Vec<Suggestion>,
    pub scores: JdMatchScores,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `evaluate(cvId, jdId, config)` (§4.7).
pub async fn evaluate(
    store: &dyn VectorStore,
    judge: &dyn LlmJudge,
    cv_id: Uuid,
    jd: &JdWithRules,
    config: &JdMatchConfig,
) -> Result<JdMatchResult, AppError> {
    let eval_out = semantic_evaluator::evaluate_jd_rules(store, cv_id, jd, &config.eval).await?;

    let rule_by_id: HashMap<Uuid, JdRuleType> = jd
        .matchable_rules()
        .map(|r| (r.rule.id, r.rule.rule_type))
        .collect();

    let mut traces = Vec::with_capacity(eval_out.results.len());

    for rule_result in &eval_out.results {
        let Some(rule_type) = rule_by_id.get(&rule_result.rule_id).copied() else {
            continue;
        };

        let trace = build_rule_trace(judge, rule_type, rule_result, config).await;
        traces.push(trace);
    }

    let gaps = gap_detector::detect(&traces);
    let suggestions = suggestion_generator::generate(&traces, &gaps);

    let scores = aggregate_scores(&traces, &config.rule_type_weights);
    let level = match_level(&traces);

    Ok(JdMatchResult {
        level,
        match_trace: traces,
        gaps,
        suggestions,
        scores,
    })
}

async fn build_rule_trace(
    judge: &dyn LlmJudge,
    rule_type: JdRuleType,
    rule_result: &semantic_evaluator::RuleEvalResult,
    config: &JdMatchConfig,
) -> RuleMatchTrace {
    let mut chunk_evidence = Vec::with_capacity(rule_result.chunk_evidence.len());
    // rule_chunk_id -> judge outcome, when the judge was invoked for it
    let mut judge_outcomes: HashMap<Uuid, JudgeOutcome> = HashMap::new();

    for chunk in &rule_result.chunk_evidence {
        let mut effective_band = chunk.best_band;

        if effective_band == Band::Ambiguous && config.llm_judge_enabled {
            if let Some(best) = &chunk.best_match {
                let outcome = judge
                    .judge(&JudgeQuestion {
                        rule_text: rule_result.rule_content.clone(),
                        candidate_text: best.content.clone(),
                    })
                    .await;

                if let Some(verdict) = &outcome.result {
                    if outcome.used {
                        effective_band = match verdict.status {
                            JudgeStatus::Full => Band::High,
                            JudgeStatus::Partial => Band::Ambiguous,
                            JudgeStatus::None => Band::Low,
                        };
                    }
                }
                judge_outcomes.insert(chunk.rule_chunk_id, outcome);
            }
        }

        chunk_evidence.push(ChunkMatchEvidence {
            rule_chunk_id: chunk.rule_chunk_id,
            effective_band,
            best_match: chunk.best_match.clone(),
        });
    }

    let mut match_status =
        conservative_aggregate(chunk_evidence.iter().map(|c| c.effective_band));

    let best_match = best_view(
        rule_result.chunk_evidence.iter().filter_map(|c| c.best_match.as_ref()),
        &[],
    )
    .cloned();

    let mut section_upgrade_applied = false;
    let mut upgrade_from_section = None;

    if match_status == MatchStatus::Partial {
        if let Some(best) = &best_match {
            if matches!(best.section, SectionType::Experience | SectionType::Projects) {
                let chunk_evidence_for_best = rule_result
                    .chunk_evidence
                    .iter()
                    .find(|c| c.best_match.as_ref().map(|m| m.chunk_id) == Some(best.chunk_id));

                let judge_for_best = chunk_evidence_for_best
                    .and_then(|c| judge_outcomes.get(&c.rule_chunk_id));

                let judge_returned_explicit_none = judge_for_best
                    .map(|o| o.used && o.result.as_ref().map(|r| r.status) == Some(JudgeStatus::None))
                    .unwrap_or(false);

                if !judge_returned_explicit_none {
                    match_status = MatchStatus::Full;
                    section_upgrade_applied = true;
                    upgrade_from_section = Some(best.section);
                }
            }
        }
    }

    let mut judge_downgrade_applied = false;
    if match_status == MatchStatus::Partial && !section_upgrade_applied {
        let any_explicit_none = judge_outcomes
            .values()
            .any(|o| o.used && o.result.as_ref().map(|r| r.status) == Some(JudgeStatus::None));
        if any_explicit_none {
            match_status = MatchStatus::None;
            judge_downgrade_applied = true;
        }
    }

    let all_candidates: Vec<&CandidateView> = rule_result
        .chunk_evidence
        .iter()
        .flat_map(|c| c.candidates.iter())
        .collect();

    let mut seen = std::collections::HashSet::new();
    let mut mention_details = MentionDetails::default();
    for c in &all_candidates {
        if !seen.insert(c.chunk_id) {
            continue;
        }
        if c.similarity >= config.multi_mention_high {
            mention_details.high += 1;
        } else if c.similarity >= config.eval.thresholds.low {
            mention_details.medium += 1;
        } else {
            mention_details.low += 1;
        }
    }

    let multi_mention_count = mention_details.high + mention_details.medium;
    let mut multi_mention_boost = false;
    if mention_details.high >= 3
        || (mention_details.high >= 1 && mention_details.medium >= 1)
        || mention_details.medium >= 4
    {
        match_status = MatchStatus::Full;
        multi_mention_boost = true;
    }

    let score = match match_status {
        MatchStatus::Full => 1.0,
        MatchStatus::Partial => 0.5,
        _ => 0.0,
    };
    let multiplier = rule_type_multiplier(rule_type);
    let weighted_score = score * multiplier;

    RuleMatchTrace {
        rule_id: rule_result.rule_id,
        rule_key: rule_result.rule_key.clone(),
        rule_type,
        rule_content: rule_result.rule_content.clone(),
        match_status,
        best_match,
        chunk_evidence,
        section_upgrade_applied,
        upgrade_from_section,
        judge_downgrade_applied,
        multi_mention_count,
        multi_mention_boost,
        mention_details,
        score,
        weighted_score,
    }
}

/// §4.7 step 3's conservative aggregator: any HIGH ⇒ FULL; else any
/// AMBIGUOUS ⇒ PARTIAL; else NONE. Distinct from the shared contract's
/// `aggregate_rule_result`, which surfaces NO_EVIDENCE separately — here
/// NO_EVIDENCE and LOW both fold into NONE.
fn conservative_aggregate(bands: impl Iterator<Item = Band>) -> MatchStatus {
    let mut any_high = false;
    let mut any_ambiguous = false;
    for b in bands {
        match b {
            Band::High => any_high = true,
            Band::Ambiguous => any_ambiguous = true,
            _ => {}
        }
    }
    if any_high {
        MatchStatus::Full
    } else if any_ambiguous {
        MatchStatus::Partial
    } else {
        MatchStatus::None
    }
}

fn aggregate_scores(traces: &[RuleMatchTrace], weights: &RuleTypeWeights) -> JdMatchScores {
    let coverage = |rule_type: JdRuleType| {
        let matching: Vec<&RuleMatchTrace> = traces.iter().filter(|t| t.rule_type == rule_type).collect();
        if matching.is_empty() {
            100.0
        } else {
            round2(100.0 * matching.iter().map(|t| t.score).sum::<f64>() / matching.len() as f64)
        }
    };

    let must_have = RuleTypeCoverage {
        score: coverage(JdRuleType::MustHave),
    };
    let nice_to_have = RuleTypeCoverage {
        score: coverage(JdRuleType::NiceToHave),
    };
    let best_practice = RuleTypeCoverage {
        score: coverage(JdRuleType::BestPractice),
    };

    let total = round2(
        must_have.score * weights.must_have
            + nice_to_have.score * weights.nice_to_have
            + best_practice.score * weights.best_practice,
    );

    JdMatchScores {
        must_have,
        nice_to_have,
        best_practice,
        total,
    }
}

fn match_level(traces: &[RuleMatchTrace]) -> MatchLevel {
    if traces.is_empty() {
        return MatchLevel::LowMatch;
    }

    let weighted_sum: f64 = traces.iter().map(|t| t.weighted_score).sum();
    let max_weighted_sum: f64 = traces.iter().map(|t| rule_type_multiplier(t.rule_type)).sum();
    let weighted_score_rate = if max_weighted_sum > 0.0 {
        weighted_sum / max_weighted_sum
    } else {
        0.0
    };

    let must_traces: Vec<&RuleMatchTrace> = traces
        .iter()
        .filter(|t| t.rule_type == JdRuleType::MustHave)
        .collect();
    let must_have_score_rate = if must_traces.is_empty() {
        1.0
    } else {
        must_traces.iter().map(|t| t.score).sum::<f64>() / must_traces.len() as f64
    };

    if weighted_score_rate >= 0.85 && must_have_score_rate >= 0.90 {
        MatchLevel::StrongMatch
    } else if weighted_score_rate >= 0.65 && must_have_score_rate >= 0.75 {
        MatchLevel::GoodMatch
    } else if weighted_score_rate >= 0.40 {
        MatchLevel::PartialMatch
    } else {
        MatchLevel::LowMatch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::llm_judge::tests::FixedJudge;
    use crate::adapters::llm_judge::{JudgeConfidence, JudgeVerdict};
    use crate::adapters::vector_store::tests::FakeVectorStore;
    use crate::models::jd::{JdRow, JdRuleChunkRow, JdRuleIntent, JdRuleRow, JdRuleWithChunks};
    use crate::similarity::Thresholds;
    use chrono::Utc;

    fn jd_fixture(rules: Vec<JdRuleWithChunks>) -> JdWithRules {
        JdWithRules {
            jd: JdRow {
                id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                title: Some("Staff Engineer".into()),
                created_at: Utc::now(),
            },
            rules,
        }
    }

    fn rule_with_chunk(rule_type: JdRuleType, content: &str, chunk_id: Uuid) -> JdRuleWithChunks {
        JdRuleWithChunks {
            rule: JdRuleRow {
                id: Uuid::new_v4(),
                jd_id: Uuid::new_v4(),
                rule_order: 0,
                rule_type,
                content: content.to_string(),
                intent: JdRuleIntent::Requirement,
                ignored: false,
            },
            chunks: vec![JdRuleChunkRow {
                id: chunk_id,
                rule_id: Uuid::new_v4(),
                chunk_order: 0,
                content: content.to_string(),
                embedding: Some(pgvector::Vector::from(vec![0.0f32; 4])),
            }],
        }
    }

    fn config() -> JdMatchConfig {
        JdMatchConfig {
            eval: EvalConfig {
                top_k: 5,
                thresholds: Thresholds::new(0.15, 0.40, 0.75),
            },
            llm_judge_enabled: true,
            multi_mention_high: 0.85,
            rule_type_weights: RuleTypeWeights::default(),
        }
    }

    fn raw_candidate(section: SectionType, distance: f64) -> crate::adapters::vector_store::RawCandidate {
        crate::adapters::vector_store::RawCandidate {
            cv_chunk_id: Uuid::new_v4(),
            section_id: Uuid::new_v4(),
            section_type: section,
            chunk_order: 0,
            content: "managed a team of 5 engineers".into(),
            cosine_distance: distance,
        }
    }

    #[tokio::test]
    async fn section_upgrade_applies_without_explicit_judge_none() {
        let chunk_id = Uuid::new_v4();
        let mut seed = HashMap::new();
        // similarity 0.71 -> ambiguous band (low=0.40, high=0.75).
        seed.insert(chunk_id, vec![raw_candidate(SectionType::Experience, 0.29)]);
        let store = FakeVectorStore::new(seed);
        let judge = FixedJudge(JudgeVerdict {
            status: JudgeStatus::Partial,
            confidence: JudgeConfidence::Low,
            reason: "ambiguous".into(),
        });

        let jd = jd_fixture(vec![rule_with_chunk(JdRuleType::MustHave, "Led a team", chunk_id)]);
        let result = evaluate(&store, &judge, Uuid::new_v4(), &jd, &config())
            .await
            .unwrap();

        assert_eq!(result.match_trace[0].match_status, MatchStatus::Full);
        assert!(result.match_trace[0].section_upgrade_applied);
    }

    #[tokio::test]
    async fn judge_downgrade_applies_when_no_upgrade_and_explicit_none() {
        let chunk_id = Uuid::new_v4();
        let mut seed = HashMap::new();
        seed.insert(chunk_id, vec![raw_candidate(SectionType::Skills, 0.29)]);
        let store = FakeVectorStore::new(seed);
        let judge = FixedJudge(JudgeVerdict {
            status: JudgeStatus::None,
            confidence: JudgeConfidence::High,
            reason: "no real match".into(),
        });

        let jd = jd_fixture(vec![rule_with_chunk(JdRuleType::NiceToHave, "Docker", chunk_id)]);
        let result = evaluate(&store, &judge, Uuid::new_v4(), &jd, &config())
            .await
            .unwrap();

        assert_eq!(result.match_trace[0].match_status, MatchStatus::None);
        assert!(result.match_trace[0].judge_downgrade_applied);
        assert!(!result.match_trace[0].section_upgrade_applied);
    }

    #[test]
    fn conservative_aggregate_any_high_wins() {
        let bands = vec![Band::Low, Band::High, Band::Ambiguous];
        assert_eq!(conservative_aggregate(bands.into_iter()), MatchStatus::Full);
    }

    #[test]
    fn conservative_aggregate_no_evidence_folds_into_none() {
        let bands = vec![Band::NoEvidence, Band::Low];
        assert_eq!(conservative_aggregate(bands.into_iter()), MatchStatus::None);
    }

    #[test]
    fn match_level_empty_trace_is_low_match() {
        assert_eq!(match_level(&[]), MatchLevel::LowMatch);
    }
}
