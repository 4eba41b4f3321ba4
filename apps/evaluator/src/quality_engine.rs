//! CV Quality Engine (§4.6) — structural gate plus, optionally, the
//! semantic layer for rules that need more than pattern matching.

use serde::Serialize;
use uuid::Uuid;

use crate::adapters::vector_store::VectorStore;
use crate::errors::AppError;
use crate::models::cv::CvWithContent;
use crate::models::rule_set::{CvQualityRuleRow, QualityCategory, QualityRuleWithChunks, RuleStrategy, Severity};
use crate::semantic_evaluator::{self, EvalConfig};
use crate::structural_rules;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityDecision {
    NotReady,
    NeedsImprovement,
    Ready,
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityFinding {
    pub rule_id: Uuid,
    pub rule_key: String,
    pub category: QualityCategory,
    pub severity: Severity,
    pub passed: bool,
    pub reason: String,
    pub evidence: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CategoryScore {
    pub passed: usize,
    pub total: usize,
    pub score: f64,
}

impl CategoryScore {
    fn finalize(mut self) -> Self {
        self.score = if self.total == 0 {
            100.0
        } else {
            round2(100.0 * self.passed as f64 / self.total as f64)
        };
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QualityScores {
    pub must_have: CategoryScore,
    pub nice_to_have: CategoryScore,
    pub best_practice: CategoryScore,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CvQualityResult {
    pub decision: QualityDecision,
    pub findings: Vec<QualityFinding>,
    pub scores: QualityScores,
    pub rule_set_version: i32,
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// `evaluate(cvId, {includeSemantic})` (§4.6). The CV and rule set are
/// loaded by the caller (the orchestrator); this takes them pre-loaded so
/// it stays independent of how persistence fetches them.
pub async fn evaluate(
    store: &dyn VectorStore,
    cv: &CvWithContent,
    rule_set: &[QualityRuleWithChunks],
    rule_set_version: i32,
    include_semantic: bool,
    config: &EvalConfig,
) -> Result<CvQualityResult, AppError> {
    let mut findings = Vec::with_capacity(rule_set.len());

    let semantic_rules: Vec<&QualityRuleWithChunks> = rule_set
        .iter()
        .filter(|r| matches!(r.rule.strategy, RuleStrategy::Semantic | RuleStrategy::Hybrid))
        .collect();

    let semantic_by_id = if include_semantic && !semantic_rules.is_empty() {
        let owned: Vec<QualityRuleWithChunks> = semantic_rules.iter().map(|r| (*r).clone()).collect();
        let out = semantic_evaluator::evaluate_cv_quality_rules(store, cv.cv.id, &owned, config).await?;
        out.results
            .into_iter()
            .map(|r| (r.rule_id, r))
            .collect::<std::collections::HashMap<_, _>>()
    } else {
        std::collections::HashMap::new()
    };

    for rule in rule_set {
        let finding = build_finding(rule, cv, &semantic_by_id, include_semantic);
        findings.push(finding);
    }

    let mut scores_by_category = std::collections::HashMap::new();
    for f in &findings {
        let entry: &mut CategoryScore = scores_by_category.entry(f.category).or_default();
        entry.total += 1;
        if f.passed {
            entry.passed += 1;
        }
    }

    let must_have = scores_by_category
        .get(&QualityCategory::MustHave)
        .copied()
        .unwrap_or_default()
        .finalize();
    let nice_to_have = scores_by_category
        .get(&QualityCategory::NiceToHave)
        .copied()
        .unwrap_or_default()
        .finalize();
    let best_practice = scores_by_category
        .get(&QualityCategory::BestPractice)
        .copied()
        .unwrap_or_default()
        .finalize();

    let total = round2(0.5 * must_have.score + 0.3 * nice_to_have.score + 0.2 * best_practice.score);

    let must_have_failed = findings
        .iter()
        .any(|f| f.category == QualityCategory::MustHave && !f.passed);
    let nice_to_have_fail_count = findings
        .iter()
        .filter(|f| f.category == QualityCategory::NiceToHave && !f.passed)
        .count();
    let best_practice_fail_count = findings
        .iter()
        .filter(|f| f.category == QualityCategory::BestPractice && !f.passed)
        .count();

    let decision = if must_have_failed {
        QualityDecision::NotReady
    } else if nice_to_have_fail_count > 2 || best_practice_fail_count > 3 {
        QualityDecision::NeedsImprovement
    } else {
        QualityDecision::Ready
    };

    Ok(CvQualityResult {
        decision,
        findings,
        scores: QualityScores {
            must_have,
            nice_to_have,
            best_practice,
            total,
        },
        rule_set_version,
    })
}

fn build_finding(
    rule: &QualityRuleWithChunks,
    cv: &CvWithContent,
    semantic_by_id: &std::collections::HashMap<Uuid, semantic_evaluator::RuleEvalResult>,
    include_semantic: bool,
) -> QualityFinding {
    let structural_outcome = structural_outcome_for(&rule.rule, cv);

    let semantic_result = semantic_by_id.get(&rule.rule.id);

    let (passed, reason, evidence) = match (&rule.rule.strategy, structural_outcome, semantic_result) {
        (RuleStrategy::Structural, Some(outcome), _) => (outcome.passed, outcome.reason, outcome.evidence),
        (RuleStrategy::Semantic, _, Some(sem)) => semantic_finding_parts(sem),
        (RuleStrategy::Semantic, _, None) if !include_semantic => (
            true,
            "semantic check skipped (structural-only pass)".to_string(),
            Vec::new(),
        ),
        (RuleStrategy::Hybrid, Some(outcome), Some(sem)) => {
            let (sem_passed, sem_reason, sem_evidence) = semantic_finding_parts(sem);
            if outcome.passed && sem_passed {
                (true, format!("{}; {}", outcome.reason, sem_reason), sem_evidence)
            } else {
                let mut reason = String::new();
                if !outcome.passed {
                    reason.push_str(&outcome.reason);
                }
                if !sem_passed {
                    if !reason.is_empty() {
                        reason.push_str("; ");
                    }
                    reason.push_str(&sem_reason);
                }
                (false, reason, sem_evidence)
            }
        }
        (RuleStrategy::Hybrid, Some(outcome), None) => (outcome.passed, outcome.reason, outcome.evidence),
        _ => (
            false,
            "no evaluation strategy produced a result".to_string(),
            Vec::new(),
        ),
    };

    QualityFinding {
        rule_id: rule.rule.id,
        rule_key: rule.rule.rule_key.clone(),
        category: rule.rule.category,
        severity: rule.rule.severity,
        passed,
        reason,
        evidence,
    }
}

fn structural_outcome_for(
    rule: &CvQualityRuleRow,
    cv: &CvWithContent,
) -> Option<structural_rules::StructuralCheckOutcome> {
    let check_id = rule.structural_check_id.as_deref()?;
    Some(structural_rules::run(check_id, cv))
}

fn semantic_finding_parts(result: &semantic_evaluator::RuleEvalResult) -> (bool, String, Vec<String>) {
    use crate::similarity::MatchStatus;

    let passed = matches!(result.result, MatchStatus::Full | MatchStatus::Partial);
    let (reason, evidence) = match &result.best_match {
        Some(best) => (
            format!(
                "best similarity {:.0}% ({:?})",
                best.similarity * 100.0,
                best.band
            ),
            vec![best.chunk_id.to_string()],
        ),
        None => (
            "no matching evidence found in any section".to_string(),
            Vec::new(),
        ),
    };
    (passed, reason, evidence)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::vector_store::tests::FakeVectorStore;
    use crate::models::cv::{CvChunkRow, CvRow, CvSectionRow, CvSectionWithChunks, CvStatus, SectionType};
    use crate::similarity::Thresholds;
    use chrono::Utc;

    fn cv_fixture() -> CvWithContent {
        CvWithContent {
            cv: CvRow {
                id: Uuid::new_v4(),
                owner_id: Uuid::new_v4(),
                status: CvStatus::Parsed,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            sections: vec![CvSectionWithChunks {
                section: CvSectionRow {
                    id: Uuid::new_v4(),
                    cv_id: Uuid::new_v4(),
                    section_type: SectionType::Summary,
                    section_order: 0,
                },
                chunks: vec![CvChunkRow {
                    id: Uuid::new_v4(),
                    section_id: Uuid::new_v4(),
                    chunk_order: 0,
                    content: "Reach me at jane@example.com".to_string(),
                    embedding: None,
                }],
            }],
        }
    }

    fn structural_rule(check_id: &str, category: QualityCategory) -> QualityRuleWithChunks {
        QualityRuleWithChunks {
            rule: CvQualityRuleRow {
                id: Uuid::new_v4(),
                rule_set_key: "default".into(),
                rule_key: check_id.to_string(),
                category,
                severity: Severity::Critical,
                strategy: RuleStrategy::Structural,
                structural_check_id: Some(check_id.to_string()),
                applies_to_sections: vec![],
            },
            chunks: vec![],
        }
    }

    #[tokio::test]
    async fn must_have_structural_failure_yields_not_ready() {
        let cv = cv_fixture();
        let rules = vec![structural_rule("has_phone", QualityCategory::MustHave)];
        let store = FakeVectorStore::new(std::collections::HashMap::new());
        let config = EvalConfig {
            top_k: 5,
            thresholds: Thresholds::new(0.15, 0.40, 0.75),
        };
        let result = evaluate(&store, &cv, &rules, 1, false, &config).await.unwrap();
        assert_eq!(result.decision, QualityDecision::NotReady);
        assert!(!result.findings[0].passed);
    }

    #[tokio::test]
    async fn all_must_have_pass_yields_ready() {
        let cv = cv_fixture();
        let rules = vec![structural_rule("has_email", QualityCategory::MustHave)];
        let store = FakeVectorStore::new(std::collections::HashMap::new());
        let config = EvalConfig {
            top_k: 5,
            thresholds: Thresholds::new(0.15, 0.40, 0.75),
        };
        let result = evaluate(&store, &cv, &rules, 1, false, &config).await.unwrap();
        assert_eq!(result.decision, QualityDecision::Ready);
        assert_eq!(result.scores.must_have.score, 100.0);
    }

    #[tokio::test]
    async fn nice_to_have_failures_beyond_threshold_need_improvement() {
        let cv = cv_fixture();
        let rules = vec![
            structural_rule("has_linkedin", QualityCategory::NiceToHave),
            structural_rule("has_github", QualityCategory::NiceToHave),
            structural_rule("has_any_url", QualityCategory::NiceToHave),
        ];
        let store = FakeVectorStore::new(std::collections::HashMap::new());
        let config = EvalConfig {
            top_k: 5,
            thresholds: Thresholds::new(0.15, 0.40, 0.75),
        };
        let result = evaluate(&store, &cv, &rules, 1, false, &config).await.unwrap();
        assert_eq!(result.decision, QualityDecision::NeedsImprovement);
    }

    #[test]
    fn category_score_defaults_to_100_when_empty() {
        let score = CategoryScore::default().finalize();
        assert_eq!(score.score, 100.0);
    }
}
