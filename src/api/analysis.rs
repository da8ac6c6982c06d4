use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{validate_analysis_input, validate_id, validate_limit, validate_skip};
use super::{AnalysisDto, ApiError, ApiResponse, AppState, PaginationQuery};
use crate::domain::AnalysisId;
use crate::models::AnalysisInput;
use crate::services::AuthUser;

#[derive(Deserialize)]
pub struct AnalysisRequest {
    pub title: String,
    pub code_content: String,
    pub language: String,
}

impl AnalysisRequest {
    fn into_input(self) -> Result<AnalysisInput, ApiError> {
        validate_analysis_input(AnalysisInput {
            title: self.title,
            code_content: self.code_content,
            language: self.language,
        })
    }
}

fn analysis_id(id: i32) -> Result<AnalysisId, ApiError> {
    validate_id(id).map(AnalysisId::new)
}

/// POST /analysis
/// Returns the `pending` record; the review runs in the background.
pub async fn create_analysis(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(payload): Json<AnalysisRequest>,
) -> Result<(StatusCode, Json<ApiResponse<AnalysisDto>>), ApiError> {
    let input = payload.into_input()?;

    let analysis = state.analyses().create(user.id(), input).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(AnalysisDto::from(analysis))),
    ))
}

/// GET /analysis
pub async fn list_analyses(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<AnalysisDto>>>, ApiError> {
    let skip = validate_skip(page.skip)?;
    let limit = validate_limit(page.limit)?;

    let analyses = state.analyses().list(user.id(), skip, limit).await?;

    Ok(Json(ApiResponse::success(
        analyses.into_iter().map(AnalysisDto::from).collect(),
    )))
}

/// GET /analysis/{id}
pub async fn get_analysis(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<AnalysisDto>>, ApiError> {
    let analysis = state.analyses().get(user.id(), analysis_id(id)?).await?;

    Ok(Json(ApiResponse::success(AnalysisDto::from(analysis))))
}

/// PUT /analysis/{id}
/// Replaces the submission and queues a fresh review.
pub async fn update_analysis(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
    Json(payload): Json<AnalysisRequest>,
) -> Result<Json<ApiResponse<AnalysisDto>>, ApiError> {
    let id = analysis_id(id)?;
    let input = payload.into_input()?;

    let analysis = state.analyses().update(user.id(), id, input).await?;

    Ok(Json(ApiResponse::success(AnalysisDto::from(analysis))))
}

/// POST /analysis/{id}/reanalyze
pub async fn reanalyze(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<AnalysisDto>>, ApiError> {
    let analysis = state
        .analyses()
        .reanalyze(user.id(), analysis_id(id)?)
        .await?;

    Ok(Json(ApiResponse::success(AnalysisDto::from(analysis))))
}

/// DELETE /analysis/{id}
pub async fn delete_analysis(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i32>,
) -> Result<StatusCode, ApiError> {
    state
        .analyses()
        .delete(user.id(), analysis_id(id)?)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}
