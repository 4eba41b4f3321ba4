//! Axum route handlers for the Evaluation API (§6 inbound contract).

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::evaluation::EvaluationRow;
use crate::orchestrator;
use crate::repository;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RunEvaluationRequest {
    pub owner_id: Uuid,
    pub cv_id: Uuid,
    pub jd_id: Option<Uuid>,
}

/// POST /api/v1/evaluations
pub async fn handle_run_evaluation(
    State(state): State<AppState>,
    Json(req): Json<RunEvaluationRequest>,
) -> Result<Json<crate::result::EvaluationResult>, AppError> {
    let result = orchestrator::run_evaluation(&state, req.owner_id, req.cv_id, req.jd_id).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
pub struct OwnerQuery {
    pub owner_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct EvaluationListResponse {
    pub evaluations: Vec<EvaluationRow>,
}

/// GET /api/v1/evaluations
pub async fn handle_list_evaluations(
    State(state): State<AppState>,
    Query(params): Query<OwnerQuery>,
) -> Result<Json<EvaluationListResponse>, AppError> {
    let evaluations = repository::list_evaluations(&state.db, params.owner_id).await?;
    Ok(Json(EvaluationListResponse { evaluations }))
}

/// GET /api/v1/evaluations/:id
pub async fn handle_get_evaluation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<OwnerQuery>,
) -> Result<Json<EvaluationRow>, AppError> {
    let evaluation = repository::find_evaluation(&state.db, params.owner_id, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Evaluation {id} not found")))?;
    Ok(Json(evaluation))
}

/// DELETE /api/v1/evaluations/:id
pub async fn handle_delete_evaluation(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<OwnerQuery>,
) -> Result<axum::http::StatusCode, AppError> {
    let deleted = repository::delete_evaluation(&state.db, params.owner_id, id).await?;
    if deleted {
        Ok(axum::http::StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Evaluation {id} not found")))
    }
}
