#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Persisted evaluation row. `result` carries the serialized
/// `crate::result::EvaluationResult`; the Evaluation is written only once
/// orchestration completes without an orchestration-fatal error (§3).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EvaluationRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub cv_id: Uuid,
    pub jd_id: Option<Uuid>,
    pub result: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
