//! Wire-format result types shared by every core component (§6, §9).
//!
//! These are tagged sum types, not open maps: every finding, match status,
//! and evidence kind is an explicit variant with exhaustive handlers
//! downstream, per the "Dynamic typing of JSON evaluation blobs" design note.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jd_matching::JdMatchResult;
use crate::quality_engine::CvQualityResult;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trace {
    pub request_id: Uuid,
    pub cv_id: Uuid,
    pub jd_id: Option<Uuid>,
    pub rule_set_version: i32,
    pub timings_ms: TimingsMs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingsMs {
    pub total: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Recommendation {
    NotReady,
    NeedsImprovement,
    ReadyToApply,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionSupport {
    pub readiness_score: i32,
    pub recommendation: Recommendation,
    pub critical_count: usize,
    pub major_count: usize,
    pub improvement_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationResult {
    pub evaluation_id: Uuid,
    pub cv_quality: CvQualityResult,
    pub jd_match: Option<JdMatchResult>,
    pub gaps: Vec<crate::gap_detector::Gap>,
    pub suggestions: Vec<crate::suggestion_generator::Suggestion>,
    pub decision_support: DecisionSupport,
    pub trace: Trace,
}
