//! Evaluation Orchestrator (§4.10) — the single `runEvaluation` entry point
//! that sequences the quality gate, embedding, and JD matching stages.

use uuid::Uuid;

use crate::errors::AppError;
use crate::gap_detector;
use crate::jd_matching::{self, JdMatchConfig, RuleTypeWeights};
use crate::models::cv::CvStatus;
use crate::quality_engine::{self, QualityDecision};
use crate::repository;
use crate::result::{DecisionSupport, EvaluationResult, Recommendation, TimingsMs, Trace};
use crate::semantic_evaluator::EvalConfig;
use crate::similarity::Thresholds;
use crate::state::AppState;

fn clamp_readiness(critical: usize, major: usize, improvement: usize) -> i32 {
    let raw = 100 - 25 * critical as i32 - 10 * major as i32 - 2 * improvement as i32;
    raw.clamp(0, 100)
}

fn eval_config(state: &AppState) -> EvalConfig {
    EvalConfig {
        top_k: state.config.eval_top_k,
        thresholds: Thresholds::new(state.config.sim_floor, state.config.sim_low, state.config.sim_high),
    }
}

/// `runEvaluation(ownerId, cvId, jdId?)` (§4.10).
pub async fn run_evaluation(
    state: &AppState,
    owner_id: Uuid,
    cv_id: Uuid,
    jd_id: Option<Uuid>,
) -> Result<EvaluationResult, AppError> {
    let started = std::time::Instant::now();
    let request_id = Uuid::new_v4();

    // 1. Ownership + status verification.
    let cv = repository::find_cv_with_content(&state.db, cv_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("CV {cv_id} not found")))?;

    if cv.cv.owner_id != owner_id {
        return Err(AppError::Forbidden);
    }
    if !matches!(cv.cv.status, CvStatus::Parsed | CvStatus::Evaluated) {
        return Err(AppError::CvState(format!(
            "CV {cv_id} is in status {:?}, expected PARSED or EVALUATED",
            cv.cv.status
        )));
    }

    let Some((rule_set, rule_set_rules)) =
        repository::find_current_rule_set(&state.db, &state.config.rule_set_key).await?
    else {
        return Err(AppError::Internal(anyhow::anyhow!(
            "no rule set found for key '{}'",
            state.config.rule_set_key
        )));
    };

    let config = eval_config(state);

    // 2. Fast structural-only quality gate.
    let fast_quality = quality_engine::evaluate(
        state.vector_store.as_ref(),
        &cv,
        &rule_set_rules,
        rule_set.version,
        false,
        &config,
    )
    .await?;

    if fast_quality.decision == QualityDecision::NotReady {
        return Ok(finish(
            state,
            owner_id,
            cv_id,
            None,
            fast_quality,
            None,
            Vec::new(),
            Vec::new(),
            request_id,
            rule_set.version,
            started,
        )
        .await?);
    }

    // 3. Idempotent CV chunk embedding.
    let embed_counts = state.embedding.embed_cv_chunks(cv_id).await?;
    tracing::info!(
        "embedCvChunks({cv_id}): embedded={} skipped={}",
        embed_counts.embedded,
        embed_counts.skipped
    );

    // 4. Re-run with the semantic layer.
    let cv = repository::find_cv_with_content(&state.db, cv_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("CV {cv_id} not found")))?;

    let full_quality = quality_engine::evaluate(
        state.vector_store.as_ref(),
        &cv,
        &rule_set_rules,
        rule_set.version,
        true,
        &config,
    )
    .await?;

    if full_quality.decision == QualityDecision::NotReady {
        return Ok(finish(
            state,
            owner_id,
            cv_id,
            None,
            full_quality,
            None,
            Vec::new(),
            Vec::new(),
            request_id,
            rule_set.version,
            started,
        )
        .await?);
    }

    // 5. No JD: quality-only result.
    let Some(jd_id) = jd_id else {
        return Ok(finish(
            state,
            owner_id,
            cv_id,
            None,
            full_quality,
            None,
            Vec::new(),
            Vec::new(),
            request_id,
            rule_set.version,
            started,
        )
        .await?);
    };

    // 6. JD ownership + idempotent JD rule-chunk embedding.
    let jd = repository::find_jd_with_rules(&state.db, jd_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("JD {jd_id} not found")))?;
    if jd.jd.owner_id != owner_id {
        return Err(AppError::Forbidden);
    }

    let jd_embed_counts = state.embedding.embed_jd_rule_chunks(jd_id).await?;
    tracing::info!(
        "embedJdRuleChunks({jd_id}): embedded={} skipped={}",
        jd_embed_counts.embedded,
        jd_embed_counts.skipped
    );

    let jd = repository::find_jd_with_rules(&state.db, jd_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("JD {jd_id} not found")))?;

    // 7. JD Matching Engine.
    let jd_match_config = JdMatchConfig {
        eval: config,
        llm_judge_enabled: state.config.llm_judge_enabled,
        multi_mention_high: state.config.multi_mention_high,
        rule_type_weights: RuleTypeWeights::default(),
    };

    let jd_match = jd_matching::evaluate(
        state.vector_store.as_ref(),
        state.judge.as_ref(),
        cv_id,
        &jd,
        &jd_match_config,
    )
    .await?;

    let gaps = gap_detector::detect(&jd_match.match_trace);
    let suggestions = crate::suggestion_generator::generate(&jd_match.match_trace, &gaps);

    Ok(finish(
        state,
        owner_id,
        cv_id,
        Some(jd_id),
        full_quality,
        Some(jd_match),
        gaps,
        suggestions,
        request_id,
        rule_set.version,
        started,
    )
    .await?)
}

#[allow(clippy::too_many_arguments)]
async fn finish(
    state: &AppState,
    owner_id: Uuid,
    cv_id: Uuid,
    jd_id: Option<Uuid>,
    cv_quality: quality_engine::CvQualityResult,
    jd_match: Option<jd_matching::JdMatchResult>,
    gaps: Vec<gap_detector::Gap>,
    suggestions: Vec<crate::suggestion_generator::Suggestion>,
    request_id: Uuid,
    rule_set_version: i32,
    started: std::time::Instant,
) -> Result<EvaluationResult, AppError> {
    // 8. Decision support.
    let summary = gap_detector::summarize(&gaps);
    let readiness_score = clamp_readiness(summary.critical, summary.major, summary.advisory);

    let recommendation = if cv_quality.decision == QualityDecision::NotReady || summary.critical > 0 {
        Recommendation::NotReady
    } else if cv_quality.decision == QualityDecision::NeedsImprovement || summary.major > 2 {
        Recommendation::NeedsImprovement
    } else {
        Recommendation::ReadyToApply
    };

    let decision_support = DecisionSupport {
        readiness_score,
        recommendation,
        critical_count: summary.critical,
        major_count: summary.major,
        improvement_count: summary.advisory,
    };

    let trace = Trace {
        request_id,
        cv_id,
        jd_id,
        rule_set_version,
        timings_ms: TimingsMs {
            total: started.elapsed().as_millis() as u64,
        },
    };

    let result = EvaluationResult {
        evaluation_id: Uuid::nil(),
        cv_quality,
        jd_match,
        gaps,
        suggestions,
        decision_support,
        trace,
    };

    // 9. Persist.
    let result_json = serde_json::to_value(&result).map_err(|e| AppError::Internal(e.into()))?;
    let row = repository::insert_evaluation(&state.db, owner_id, cv_id, jd_id, &result_json).await?;

    Ok(EvaluationResult {
        evaluation_id: row.id,
        ..result
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readiness_clamps_at_zero() {
        assert_eq!(clamp_readiness(10, 0, 0), 0);
    }

    #[test]
    fn readiness_full_score_with_no_gaps() {
        assert_eq!(clamp_readiness(0, 0, 0), 100);
    }

    #[test]
    fn readiness_subtracts_weighted_counts() {
        assert_eq!(clamp_readiness(1, 2, 3), 100 - 25 - 20 - 6);
    }
}
