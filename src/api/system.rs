use axum::{Json, extract::State};
use serde::Serialize;
use std::sync::Arc;

use super::{ApiResponse, AppState, MessageResponse};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub database: &'static str,
    pub uptime_seconds: u64,
}

/// GET /
pub async fn root() -> Json<ApiResponse<MessageResponse>> {
    Json(ApiResponse::success(MessageResponse::new(
        "Welcome to Lintara API",
    )))
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<ApiResponse<HealthStatus>> {
    let database = match state.store().ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            "unavailable"
        }
    };

    Json(ApiResponse::success(HealthStatus {
        status: "healthy",
        service: "lintara-api",
        version: env!("CARGO_PKG_VERSION"),
        database,
        uptime_seconds: state.start_time.elapsed().as_secs(),
    }))
}
