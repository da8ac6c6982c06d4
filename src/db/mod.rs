use anyhow::Result;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::config::SecurityConfig;
use crate::domain::{AnalysisId, UserId};
use crate::models::{Analysis, AnalysisInput, NewUser, User};

pub mod migrator;
pub mod repositories;

pub use repositories::analysis::AnalysisRepository;
pub use repositories::user::UserRepository;

/// Pooled handle to the relational store. Cloning shares the pool, so a clone
/// can be moved into a background task and outlive the request that made it.
#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        let in_memory = db_url.contains(":memory:");

        if !in_memory {
            let path_str = db_url.trim_start_matches("sqlite:");
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        // Every pooled connection to an in-memory SQLite database is its own
        // database, so the pool must hold exactly one.
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .idle_timeout(Duration::from_secs(300))
            .max_lifetime(Duration::from_secs(600))
            .sqlx_logging(false);

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    fn user_repo(&self) -> UserRepository {
        UserRepository::new(self.conn.clone())
    }

    fn analysis_repo(&self) -> AnalysisRepository {
        AnalysisRepository::new(self.conn.clone())
    }

    // ========================================================================
    // Users
    // ========================================================================

    pub async fn create_user(&self, new_user: &NewUser, config: &SecurityConfig) -> Result<User> {
        self.user_repo().create(new_user, config).await
    }

    pub async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.user_repo().get_by_id(id).await
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.user_repo().get_by_username(username).await
    }

    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        self.user_repo().email_exists(email).await
    }

    pub async fn list_users(&self, skip: u64, limit: u64) -> Result<Vec<User>> {
        self.user_repo().list(skip, limit).await
    }

    pub async fn verify_user_password(&self, username: &str, password: &str) -> Result<Option<User>> {
        self.user_repo().verify_password(username, password).await
    }

    // ========================================================================
    // Analyses
    // ========================================================================

    pub async fn create_analysis(&self, owner: UserId, input: &AnalysisInput) -> Result<Analysis> {
        self.analysis_repo().create(owner, input).await
    }

    pub async fn get_analysis(&self, id: AnalysisId) -> Result<Option<Analysis>> {
        self.analysis_repo().get(id).await
    }

    pub async fn get_owned_analysis(
        &self,
        id: AnalysisId,
        owner: UserId,
    ) -> Result<Option<Analysis>> {
        self.analysis_repo().get_owned(id, owner).await
    }

    pub async fn list_analyses(&self, owner: UserId, skip: u64, limit: u64) -> Result<Vec<Analysis>> {
        self.analysis_repo().list_for_owner(owner, skip, limit).await
    }

    pub async fn resubmit_analysis(
        &self,
        id: AnalysisId,
        owner: UserId,
        input: AnalysisInput,
    ) -> Result<Option<Analysis>> {
        self.analysis_repo().resubmit(id, owner, input).await
    }

    pub async fn reset_analysis(&self, id: AnalysisId, owner: UserId) -> Result<Option<Analysis>> {
        self.analysis_repo().reset_to_pending(id, owner).await
    }

    pub async fn delete_analysis(&self, id: AnalysisId, owner: UserId) -> Result<bool> {
        self.analysis_repo().delete_owned(id, owner).await
    }

    pub async fn save_analysis(&self, analysis: &Analysis) -> Result<bool> {
        self.analysis_repo().save(analysis).await
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::temp_store;
    use super::*;
    use crate::domain::AnalysisStatus;

    fn fast_hash() -> SecurityConfig {
        SecurityConfig {
            argon2_memory_cost_kib: 1024,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
        }
    }

    async fn seed_user(store: &Store, name: &str) -> User {
        store
            .create_user(
                &NewUser {
                    email: format!("{name}@example.com"),
                    username: name.to_string(),
                    password: "secret123".to_string(),
                },
                &fast_hash(),
            )
            .await
            .unwrap()
    }

    fn input(code: &str) -> AnalysisInput {
        AnalysisInput {
            title: "snippet".to_string(),
            code_content: code.to_string(),
            language: "python".to_string(),
        }
    }

    #[tokio::test]
    async fn test_password_verification() {
        let store = temp_store().await;
        let user = seed_user(&store, "alice").await;

        let ok = store.verify_user_password("alice", "secret123").await.unwrap();
        assert_eq!(ok.map(|u| u.id), Some(user.id));

        assert!(store.verify_user_password("alice", "wrong").await.unwrap().is_none());
        assert!(store.verify_user_password("nobody", "secret123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_rejected_by_database() {
        let store = temp_store().await;
        seed_user(&store, "alice").await;

        let err = store
            .create_user(
                &NewUser {
                    email: "other@example.com".to_string(),
                    username: "alice".to_string(),
                    password: "secret123".to_string(),
                },
                &fast_hash(),
            )
            .await
            .unwrap_err();

        let db_err = err.downcast_ref::<sea_orm::DbErr>().unwrap();
        assert!(matches!(
            db_err.sql_err(),
            Some(sea_orm::SqlErr::UniqueConstraintViolation(_))
        ));
    }

    #[tokio::test]
    async fn test_create_is_pending_and_owner_scoped() {
        let store = temp_store().await;
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;

        let analysis = store.create_analysis(alice.id, &input("print(1)")).await.unwrap();
        assert_eq!(analysis.status, AnalysisStatus::Pending);
        assert!(analysis.result.is_none());
        assert!(analysis.completed_at.is_none());

        assert!(store.get_owned_analysis(analysis.id, alice.id).await.unwrap().is_some());
        assert!(store.get_owned_analysis(analysis.id, bob.id).await.unwrap().is_none());
        assert!(!store.delete_analysis(analysis.id, bob.id).await.unwrap());
        assert!(store.list_analyses(bob.id, 0, 10).await.unwrap().is_empty());
        assert_eq!(store.list_analyses(alice.id, 0, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_is_noop_for_deleted_record() {
        let store = temp_store().await;
        let alice = seed_user(&store, "alice").await;
        let mut analysis = store.create_analysis(alice.id, &input("x = 1")).await.unwrap();

        assert!(store.delete_analysis(analysis.id, alice.id).await.unwrap());

        analysis.begin_processing().unwrap();
        assert!(!store.save_analysis(&analysis).await.unwrap());
        assert!(store.get_analysis(analysis.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_is_noop_after_content_replaced() {
        let store = temp_store().await;
        let alice = seed_user(&store, "alice").await;
        let mut stale = store.create_analysis(alice.id, &input("x = 1")).await.unwrap();

        store
            .resubmit_analysis(stale.id, alice.id, input("x = 2"))
            .await
            .unwrap();

        stale.begin_processing().unwrap();
        stale.complete("review of x = 1".to_string()).unwrap();
        assert!(!store.save_analysis(&stale).await.unwrap());

        let stored = store.get_analysis(stale.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Pending);
        assert_eq!(stored.code_content, "x = 2");
        assert!(stored.result.is_none());
    }

    #[tokio::test]
    async fn test_resubmit_resets_lifecycle() {
        let store = temp_store().await;
        let alice = seed_user(&store, "alice").await;
        let mut analysis = store.create_analysis(alice.id, &input("x = 1")).await.unwrap();

        analysis.begin_processing().unwrap();
        analysis.complete("fine".to_string()).unwrap();
        assert!(store.save_analysis(&analysis).await.unwrap());

        let updated = store
            .resubmit_analysis(analysis.id, alice.id, input("x = 2"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, AnalysisStatus::Pending);

        let stored = store.get_analysis(analysis.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Pending);
        assert_eq!(stored.code_content, "x = 2");
        assert!(stored.result.is_none());
        assert!(stored.completed_at.is_none());
    }
}
