use axum::{
    Extension, Form, Json,
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

use super::observability::RequestSpan;
use super::{ApiError, ApiResponse, AppState, MessageResponse, UserDto};
use crate::services::{AuthError, AuthUser, LoginResult};

// ============================================================================
// Request Types
// ============================================================================

/// OAuth2 password-grant form.
#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

// ============================================================================
// Middleware
// ============================================================================

/// Resolves `Authorization: Bearer <token>` to an [`AuthUser`] and stores it
/// in the request extensions. Every failure is a uniform 401.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

    let user = state
        .auth()
        .authenticate(&token)
        .await
        .map_err(|e| match e {
            AuthError::Internal(msg) => ApiError::internal(msg),
            _ => ApiError::unauthorized("Could not validate credentials"),
        })?;

    if let Some(RequestSpan(span)) = request.extensions().get::<RequestSpan>() {
        span.record("user_id", user.id().value());
    }
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();

    (!token.is_empty()).then(|| token.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<ApiResponse<LoginResult>>, ApiError> {
    if form.username.is_empty() || form.password.is_empty() {
        return Err(ApiError::validation("Username and password are required"));
    }

    let result = state.auth().login(&form.username, &form.password).await?;
    tracing::info!(user_id = %result.user_id, "User logged in");

    Ok(Json(ApiResponse::success(result)))
}

/// POST /auth/logout
/// Revokes the presented token.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Json<ApiResponse<MessageResponse>> {
    state.auth().logout(&user.claims).await;

    Json(ApiResponse::success(MessageResponse::new(
        "Successfully logged out",
    )))
}

/// GET /auth/me
pub async fn me(Extension(user): Extension<AuthUser>) -> Json<ApiResponse<UserDto>> {
    Json(ApiResponse::success(UserDto::from(user.user)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(
            extract_bearer_token(&headers("Bearer abc.def.ghi")).as_deref(),
            Some("abc.def.ghi")
        );
        assert!(extract_bearer_token(&headers("Basic dXNlcjpwYXNz")).is_none());
        assert!(extract_bearer_token(&headers("Bearer ")).is_none());
        assert!(extract_bearer_token(&HeaderMap::new()).is_none());
    }
}
