use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use std::sync::Arc;

use super::validation::{validate_id, validate_limit, validate_new_user, validate_skip};
use super::{ApiError, ApiResponse, AppState, PaginationQuery, UserDto};
use crate::domain::UserId;
use crate::models::NewUser;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}

/// POST /users
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserDto>>), ApiError> {
    let new_user = validate_new_user(NewUser {
        email: payload.email,
        username: payload.username,
        password: payload.password,
    })?;

    let user = state.auth().register(new_user).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success(UserDto::from(user))),
    ))
}

/// GET /users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(page): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<UserDto>>>, ApiError> {
    let skip = validate_skip(page.skip)?;
    let limit = validate_limit(page.limit)?;

    let users = state.auth().list_users(skip, limit).await?;

    Ok(Json(ApiResponse::success(
        users.into_iter().map(UserDto::from).collect(),
    )))
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
) -> Result<Json<ApiResponse<UserDto>>, ApiError> {
    let id = validate_id(id)?;

    let user = state.auth().get_user(UserId::new(id)).await?;

    Ok(Json(ApiResponse::success(UserDto::from(user))))
}
