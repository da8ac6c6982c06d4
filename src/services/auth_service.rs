//! Domain service for registration, login and bearer-token authentication.

use serde::Serialize;
use thiserror::Error;

use crate::domain::UserId;
use crate::models::{NewUser, User};
use crate::services::token::{Claims, TokenError};

/// Errors specific to authentication operations.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Incorrect username or password")]
    InvalidCredentials,

    #[error("Could not validate credentials")]
    InvalidToken(#[from] TokenError),

    #[error("User not found")]
    UserNotFound(UserId),

    #[error("Email already registered")]
    EmailTaken,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

/// Successful login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub access_token: String,
    pub token_type: &'static str,
    pub user_id: UserId,
    pub username: String,
}

/// Caller identity attached to authenticated requests.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub claims: Claims,
}

impl AuthUser {
    #[must_use]
    pub const fn id(&self) -> UserId {
        self.user.id
    }
}

/// Domain service trait for authentication.
#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    /// Creates an account from an already validated payload.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::EmailTaken`] or [`AuthError::UsernameTaken`] on
    /// duplicates. Email is checked first.
    async fn register(&self, new_user: NewUser) -> Result<User, AuthError>;

    /// Verifies credentials and issues an access token.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] if login fails.
    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError>;

    /// Resolves a bearer token to the user it was issued for.
    async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError>;

    /// Revokes the token described by `claims` until it would have expired.
    async fn logout(&self, claims: &Claims);

    async fn get_user(&self, id: UserId) -> Result<User, AuthError>;

    async fn list_users(&self, skip: u64, limit: u64) -> Result<Vec<User>, AuthError>;
}
