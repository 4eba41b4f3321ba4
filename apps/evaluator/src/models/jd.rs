#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum JdRuleType {
    MustHave,
    NiceToHave,
    BestPractice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum JdRuleIntent {
    Requirement,
    Responsibility,
    Qualification,
    Informational,
    Preference,
    Unset,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JdRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JdRuleRow {
    pub id: Uuid,
    pub jd_id: Uuid,
    pub rule_order: i32,
    pub rule_type: JdRuleType,
    pub content: String,
    pub intent: JdRuleIntent,
    pub ignored: bool,
}

impl JdRuleRow {
    /// A JD rule never enters matching once ignored, or once its intent has
    /// been asynchronously classified as purely informational (§3 invariant).
    pub fn excluded_from_matching(&self) -> bool {
        self.ignored || self.intent == JdRuleIntent::Informational
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct JdRuleChunkRow {
    pub id: Uuid,
    pub rule_id: Uuid,
    pub chunk_order: i32,
    pub content: String,
    #[sqlx(default)]
    pub embedding: Option<pgvector::Vector>,
}

#[derive(Debug, Clone)]
pub struct JdRuleWithChunks {
    pub rule: JdRuleRow,
    pub chunks: Vec<JdRuleChunkRow>,
}

#[derive(Debug, Clone)]
pub struct JdWithRules {
    pub jd: JdRow,
    pub rules: Vec<JdRuleWithChunks>,
}

impl JdWithRules {
    pub fn matchable_rules(&self) -> impl Iterator<Item = &JdRuleWithChunks> {
        self.rules.iter().filter(|r| !r.rule.excluded_from_matching())
    }
}
