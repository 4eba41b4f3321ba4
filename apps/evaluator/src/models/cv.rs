#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Lifecycle status of a CV, advanced by external collaborators
/// (upload, parsing) and by the evaluation pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum CvStatus {
    Uploaded,
    Parsed,
    Evaluated,
}

/// Section kind; drives section weighting and priority in the similarity
/// contract (see `crate::similarity`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum SectionType {
    Summary,
    Experience,
    Projects,
    Skills,
    Education,
    Activities,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CvRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub status: CvStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CvSectionRow {
    pub id: Uuid,
    pub cv_id: Uuid,
    pub section_type: SectionType,
    pub section_order: i32,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct CvChunkRow {
    pub id: Uuid,
    pub section_id: Uuid,
    pub chunk_order: i32,
    pub content: String,
    #[sqlx(default)]
    pub embedding: Option<pgvector::Vector>,
}

/// A CV with its sections and chunks loaded, as returned by the CV
/// collaborator's `findCvWithSectionsAndChunks` contract (§6).
#[derive(Debug, Clone)]
pub struct CvWithContent {
    pub cv: CvRow,
    pub sections: Vec<CvSectionWithChunks>,
}

#[derive(Debug, Clone)]
pub struct CvSectionWithChunks {
    pub section: CvSectionRow,
    pub chunks: Vec<CvChunkRow>,
}

impl CvWithContent {
    /// Flattened view of every chunk alongside its owning section, in the
    /// total order defined by section order then chunk order.
    pub fn all_chunks(&self) -> Vec<(&CvSectionRow, &CvChunkRow)> {
        let mut out = Vec::new();
        for s in &self.sections {
            for c in &s.chunks {
                out.push((&s.section, c));
            }
        }
        out
    }
}
