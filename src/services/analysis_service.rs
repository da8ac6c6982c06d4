//! Domain service for code analysis records.
//!
//! Every operation is scoped to the owner. A record that belongs to another
//! user is reported exactly like a missing one.

use thiserror::Error;

use crate::domain::{AnalysisId, UserId};
use crate::models::{Analysis, AnalysisInput};

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Analysis not found")]
    NotFound(AnalysisId),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AnalysisError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[async_trait::async_trait]
pub trait AnalysisService: Send + Sync {
    /// Stores a `pending` record and dispatches a pipeline run for it.
    /// Returns before the run starts.
    async fn create(&self, owner: UserId, input: AnalysisInput) -> Result<Analysis, AnalysisError>;

    async fn list(&self, owner: UserId, skip: u64, limit: u64)
    -> Result<Vec<Analysis>, AnalysisError>;

    async fn get(&self, owner: UserId, id: AnalysisId) -> Result<Analysis, AnalysisError>;

    /// Replaces the submission, resets the record to `pending` and
    /// dispatches exactly one new run.
    async fn update(
        &self,
        owner: UserId,
        id: AnalysisId,
        input: AnalysisInput,
    ) -> Result<Analysis, AnalysisError>;

    /// Like [`AnalysisService::update`] but keeps the current submission.
    async fn reanalyze(&self, owner: UserId, id: AnalysisId) -> Result<Analysis, AnalysisError>;

    async fn delete(&self, owner: UserId, id: AnalysisId) -> Result<(), AnalysisError>;
}
