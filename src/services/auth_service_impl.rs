//! `SeaORM` implementation of the `AuthService` trait.

use async_trait::async_trait;
use sea_orm::{DbErr, SqlErr};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::SecurityConfig;
use crate::db::Store;
use crate::domain::UserId;
use crate::models::{NewUser, User};
use crate::services::auth_service::{AuthError, AuthService, AuthUser, LoginResult};
use crate::services::token::{Claims, TokenService};

pub struct SeaOrmAuthService {
    store: Store,
    tokens: Arc<TokenService>,
    security: SecurityConfig,
}

impl SeaOrmAuthService {
    #[must_use]
    pub const fn new(store: Store, tokens: Arc<TokenService>, security: SecurityConfig) -> Self {
        Self {
            store,
            tokens,
            security,
        }
    }
}

/// Maps a unique-constraint violation raised by the insert itself, which
/// happens when two registrations race past the pre-checks.
fn map_unique_violation(err: anyhow::Error) -> AuthError {
    if let Some(SqlErr::UniqueConstraintViolation(detail)) =
        err.downcast_ref::<DbErr>().and_then(DbErr::sql_err)
    {
        return if detail.contains("email") {
            AuthError::EmailTaken
        } else {
            AuthError::UsernameTaken
        };
    }
    AuthError::from(err)
}

#[async_trait]
impl AuthService for SeaOrmAuthService {
    async fn register(&self, new_user: NewUser) -> Result<User, AuthError> {
        if self.store.email_exists(&new_user.email).await? {
            return Err(AuthError::EmailTaken);
        }

        if self
            .store
            .get_user_by_username(&new_user.username)
            .await?
            .is_some()
        {
            return Err(AuthError::UsernameTaken);
        }

        let user = self
            .store
            .create_user(&new_user, &self.security)
            .await
            .map_err(map_unique_violation)?;

        info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResult, AuthError> {
        let user = self
            .store
            .verify_user_password(username, password)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let issued = self.tokens.issue(user.id)?;
        debug!(user_id = %user.id, expires_at = %issued.expires_at, "Issued access token");

        Ok(LoginResult {
            access_token: issued.token,
            token_type: "bearer",
            user_id: user.id,
            username: user.username,
        })
    }

    async fn authenticate(&self, token: &str) -> Result<AuthUser, AuthError> {
        let claims = self.tokens.verify(token).await?;
        let user_id = claims.user_id()?;

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(AuthError::UserNotFound(user_id))?;

        Ok(AuthUser { user, claims })
    }

    async fn logout(&self, claims: &Claims) {
        self.tokens.revoke(claims).await;
        info!(user_id = %claims.sub, "Access token revoked");
    }

    async fn get_user(&self, id: UserId) -> Result<User, AuthError> {
        self.store
            .get_user(id)
            .await?
            .ok_or(AuthError::UserNotFound(id))
    }

    async fn list_users(&self, skip: u64, limit: u64) -> Result<Vec<User>, AuthError> {
        Ok(self.store.list_users(skip, limit).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::temp_store;
    use crate::services::token::TokenError;

    async fn service() -> SeaOrmAuthService {
        SeaOrmAuthService::new(
            temp_store().await,
            Arc::new(TokenService::new(b"unit-test", chrono::Duration::minutes(30))),
            SecurityConfig {
                argon2_memory_cost_kib: 1024,
                argon2_time_cost: 1,
                argon2_parallelism: 1,
            },
        )
    }

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_string(),
            username: username.to_string(),
            password: "secret123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_is_checked_first() {
        let auth = service().await;
        auth.register(new_user("a@example.com", "alice")).await.unwrap();

        let err = auth
            .register(new_user("a@example.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));

        let err = auth
            .register(new_user("b@example.com", "alice"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UsernameTaken));
    }

    #[tokio::test]
    async fn test_login_then_authenticate() {
        let auth = service().await;
        let user = auth.register(new_user("a@example.com", "alice")).await.unwrap();

        assert!(matches!(
            auth.login("alice", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));

        let login = auth.login("alice", "secret123").await.unwrap();
        assert_eq!(login.token_type, "bearer");
        assert_eq!(login.user_id, user.id);

        let caller = auth.authenticate(&login.access_token).await.unwrap();
        assert_eq!(caller.id(), user.id);
        assert_eq!(caller.user.username, "alice");
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let auth = service().await;
        auth.register(new_user("a@example.com", "alice")).await.unwrap();
        let login = auth.login("alice", "secret123").await.unwrap();

        let caller = auth.authenticate(&login.access_token).await.unwrap();
        auth.logout(&caller.claims).await;

        assert!(matches!(
            auth.authenticate(&login.access_token).await,
            Err(AuthError::InvalidToken(TokenError::Revoked))
        ));
    }

    #[tokio::test]
    async fn test_token_for_unknown_user_is_rejected() {
        let auth = service().await;
        let issued = auth.tokens.issue(UserId::new(404)).unwrap();

        assert!(matches!(
            auth.authenticate(&issued.token).await,
            Err(AuthError::UserNotFound(_))
        ));
    }
}
