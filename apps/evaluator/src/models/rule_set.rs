#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::cv::SectionType;
use crate::models::jd::JdRuleType;

/// Severity of a CV quality rule's category. Reused as the `category` enum
/// since quality rule categories share the JD rule-type vocabulary (§3).
pub type QualityCategory = JdRuleType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum RuleStrategy {
    Structural,
    Semantic,
    Hybrid,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct RuleSetRow {
    pub key: String,
    pub version: i32,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CvQualityRuleRow {
    pub id: Uuid,
    pub rule_set_key: String,
    pub rule_key: String,
    pub category: QualityCategory,
    pub severity: Severity,
    pub strategy: RuleStrategy,
    pub structural_check_id: Option<String>,
    #[sqlx(json)]
    pub applies_to_sections: Vec<SectionType>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CvQualityRuleChunkRow {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub chunk_order: i32,
    pub content: String,
    #[sqlx(default)]
    pub embedding: Option<pgvector::Vector>,
}

#[derive(Debug, Clone)]
pub struct QualityRuleWithChunks {
    pub rule: CvQualityRuleRow,
    pub chunks: Vec<CvQualityRuleChunkRow>,
}
