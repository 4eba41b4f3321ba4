//! Persistence collaborators (§6 "Outbound contracts the core depends on").
//!
//! Thin, read-mostly loaders over the CV/JD/rule-set tables plus the single
//! Evaluation writer/reader trio. The orchestrator owns ownership checks;
//! this module just fetches and assembles the aggregate model types.

use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::cv::{CvChunkRow, CvRow, CvSectionRow, CvSectionWithChunks, CvWithContent};
use crate::models::evaluation::EvaluationRow;
use crate::models::jd::{JdRow, JdRuleChunkRow, JdRuleRow, JdRuleWithChunks, JdWithRules};
use crate::models::rule_set::{CvQualityRuleChunkRow, CvQualityRuleRow, QualityRuleWithChunks, RuleSetRow};

pub async fn find_cv(pool: &PgPool, cv_id: Uuid) -> Result<Option<CvRow>, AppError> {
    Ok(sqlx::query_as::<_, CvRow>(
        "SELECT id, owner_id, status, created_at, updated_at FROM cvs WHERE id = $1",
    )
    .bind(cv_id)
    .fetch_optional(pool)
    .await?)
}

/// Loads a CV with every section and chunk, in the total order the
/// similarity contract assumes (section order, then chunk order).
pub async fn find_cv_with_content(pool: &PgPool, cv_id: Uuid) -> Result<Option<CvWithContent>, AppError> {
    let Some(cv) = find_cv(pool, cv_id).await? else {
        return Ok(None);
    };

    let sections = sqlx::query_as::<_, CvSectionRow>(
        "SELECT id, cv_id, section_type, section_order FROM cv_sections WHERE cv_id = $1 ORDER BY section_order ASC",
    )
    .bind(cv_id)
    .fetch_all(pool)
    .await?;

    let mut sections_with_chunks = Vec::with_capacity(sections.len());
    for section in sections {
        let chunks = sqlx::query_as::<_, CvChunkRow>(
            "SELECT id, section_id, chunk_order, content, embedding FROM cv_chunks WHERE section_id = $1 ORDER BY chunk_order ASC",
        )
        .bind(section.id)
        .fetch_all(pool)
        .await?;

        sections_with_chunks.push(CvSectionWithChunks { section, chunks });
    }

    Ok(Some(CvWithContent {
        cv,
        sections: sections_with_chunks,
    }))
}

pub async fn find_jd(pool: &PgPool, jd_id: Uuid) -> Result<Option<JdRow>, AppError> {
    Ok(
        sqlx::query_as::<_, JdRow>("SELECT id, owner_id, title, created_at FROM jds WHERE id = $1")
            .bind(jd_id)
            .fetch_optional(pool)
            .await?,
    )
}

/// Loads a JD with every rule and rule chunk, in rule order then chunk
/// order — the "owner-defined" input order the JD Matching Engine's
/// `matchTrace` must preserve (§5).
pub async fn find_jd_with_rules(pool: &PgPool, jd_id: Uuid) -> Result<Option<JdWithRules>, AppError> {
    let Some(jd) = find_jd(pool, jd_id).await? else {
        return Ok(None);
    };

    let rules = sqlx::query_as::<_, JdRuleRow>(
        "SELECT id, jd_id, rule_order, rule_type, content, intent, ignored FROM jd_rules WHERE jd_id = $1 ORDER BY rule_order ASC",
    )
    .bind(jd_id)
    .fetch_all(pool)
    .await?;

    let mut rules_with_chunks = Vec::with_capacity(rules.len());
    for rule in rules {
        let chunks = sqlx::query_as::<_, JdRuleChunkRow>(
            "SELECT id, rule_id, chunk_order, content, embedding FROM jd_rule_chunks WHERE rule_id = $1 ORDER BY chunk_order ASC",
        )
        .bind(rule.id)
        .fetch_all(pool)
        .await?;

        rules_with_chunks.push(JdRuleWithChunks { rule, chunks });
    }

    Ok(Some(JdWithRules { jd, rules: rules_with_chunks }))
}

/// Loads the current (highest-version) CV quality rule set for `rule_set_key`
/// along with every rule and rule chunk.
pub async fn find_current_rule_set(
    pool: &PgPool,
    rule_set_key: &str,
) -> Result<Option<(RuleSetRow, Vec<QualityRuleWithChunks>)>, AppError> {
    let Some(rule_set) = sqlx::query_as::<_, RuleSetRow>(
        "SELECT key, version FROM rule_sets WHERE key = $1 ORDER BY version DESC LIMIT 1",
    )
    .bind(rule_set_key)
    .fetch_optional(pool)
    .await?
    else {
        return Ok(None);
    };

    let rules = sqlx::query_as::<_, CvQualityRuleRow>(
        r#"
        SELECT id, rule_set_key, rule_key, category, severity, strategy, structural_check_id, applies_to_sections
        FROM cv_quality_rules
        WHERE rule_set_key = $1
        ORDER BY rule_key ASC
        "#,
    )
    .bind(&rule_set.key)
    .fetch_all(pool)
    .await?;

    let mut rules_with_chunks = Vec::with_capacity(rules.len());
    for rule in rules {
        let chunks = sqlx::query_as::<_, CvQualityRuleChunkRow>(
            "SELECT id, rule_id, chunk_order, content, embedding FROM cv_quality_rule_chunks WHERE rule_id = $1 ORDER BY chunk_order ASC",
        )
        .bind(rule.id)
        .fetch_all(pool)
        .await?;

        rules_with_chunks.push(QualityRuleWithChunks { rule, chunks });
    }

    Ok(Some((rule_set, rules_with_chunks)))
}

pub async fn insert_evaluation(
    pool: &PgPool,
    owner_id: Uuid,
    cv_id: Uuid,
    jd_id: Option<Uuid>,
    result: &serde_json::Value,
) -> Result<EvaluationRow, AppError> {
    Ok(sqlx::query_as::<_, EvaluationRow>(
        r#"
        INSERT INTO evaluations (id, owner_id, cv_id, jd_id, result, created_at)
        VALUES (gen_random_uuid(), $1, $2, $3, $4, now())
        RETURNING id, owner_id, cv_id, jd_id, result, created_at
        "#,
    )
    .bind(owner_id)
    .bind(cv_id)
    .bind(jd_id)
    .bind(result)
    .fetch_one(pool)
    .await?)
}

pub async fn list_evaluations(pool: &PgPool, owner_id: Uuid) -> Result<Vec<EvaluationRow>, AppError> {
    Ok(sqlx::query_as::<_, EvaluationRow>(
        "SELECT id, owner_id, cv_id, jd_id, result, created_at FROM evaluations WHERE owner_id = $1 ORDER BY created_at DESC",
    )
    .bind(owner_id)
    .fetch_all(pool)
    .await?)
}

pub async fn find_evaluation(
    pool: &PgPool,
    owner_id: Uuid,
    evaluation_id: Uuid,
) -> Result<Option<EvaluationRow>, AppError> {
    Ok(sqlx::query_as::<_, EvaluationRow>(
        "SELECT id, owner_id, cv_id, jd_id, result, created_at FROM evaluations WHERE id = $1 AND owner_id = $2",
    )
    .bind(evaluation_id)
    .bind(owner_id)
    .fetch_optional(pool)
    .await?)
}

pub async fn delete_evaluation(pool: &PgPool, owner_id: Uuid, evaluation_id: Uuid) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM evaluations WHERE id = $1 AND owner_id = $2")
        .bind(evaluation_id)
        .bind(owner_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
