use serde::{Deserialize, Serialize};

use crate::domain::{AnalysisId, AnalysisStatus, UserId};
use crate::models::{Analysis, User};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub const fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default)]
    pub skip: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

const fn default_limit() -> u64 {
    10
}

#[derive(Debug, Serialize)]
pub struct UserDto {
    pub id: UserId,
    pub email: String,
    pub username: String,
    pub created_at: String,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AnalysisDto {
    pub id: AnalysisId,
    pub title: String,
    pub code_content: String,
    pub language: String,
    pub status: AnalysisStatus,
    pub result: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
    pub owner_id: UserId,
}

impl From<Analysis> for AnalysisDto {
    fn from(analysis: Analysis) -> Self {
        Self {
            id: analysis.id,
            title: analysis.title,
            code_content: analysis.code_content,
            language: analysis.language,
            status: analysis.status,
            result: analysis.result,
            created_at: analysis.created_at,
            completed_at: analysis.completed_at,
            owner_id: analysis.owner_id,
        }
    }
}
