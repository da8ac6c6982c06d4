use anyhow::Context;
use std::sync::Arc;
use tracing::warn;

use crate::clients::{OllamaReviewer, Reviewer};
use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AnalysisPipeline, AnalysisService, AuthService, SeaOrmAnalysisService, SeaOrmAuthService,
    TokenService,
};

#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<Config>,

    pub store: Store,

    pub auth_service: Arc<dyn AuthService>,

    pub analysis_service: Arc<dyn AnalysisService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let reviewer = Arc::new(OllamaReviewer::from_config(&config.reviewer)?);
        Self::with_reviewer(config, reviewer).await
    }

    /// Wires everything around the given reviewer. Tests pass a stub here.
    pub async fn with_reviewer(config: Config, reviewer: Arc<dyn Reviewer>) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        let secret = if config.auth.jwt_secret.is_empty() {
            warn!("No JWT secret configured; using a random one. Tokens will not survive a restart");
            TokenService::generate_secret()
        } else {
            config.auth.jwt_secret.clone()
        };

        let ttl = chrono::Duration::try_minutes(config.auth.access_token_expire_minutes)
            .context("Access token lifetime is out of range")?;
        let tokens = Arc::new(TokenService::new(secret.as_bytes(), ttl));

        // The pipeline gets its own handle to the pool so runs outlive requests.
        let pipeline = AnalysisPipeline::new(Arc::new(store.clone()), reviewer);

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            tokens,
            config.security.clone(),
        )) as Arc<dyn AuthService>;

        let analysis_service = Arc::new(SeaOrmAnalysisService::new(
            store.clone(),
            pipeline,
        )) as Arc<dyn AnalysisService>;

        Ok(Self {
            config: Arc::new(config),
            store,
            auth_service,
            analysis_service,
        })
    }
}
