//! `SeaORM` implementation of the `AnalysisService` trait.

use async_trait::async_trait;
use tracing::info;

use crate::db::Store;
use crate::domain::{AnalysisId, UserId};
use crate::models::{Analysis, AnalysisInput};
use crate::services::analysis_service::{AnalysisError, AnalysisService};
use crate::services::pipeline::{AnalysisPipeline, PipelineJob};

pub struct SeaOrmAnalysisService {
    store: Store,
    pipeline: AnalysisPipeline,
}

impl SeaOrmAnalysisService {
    #[must_use]
    pub const fn new(store: Store, pipeline: AnalysisPipeline) -> Self {
        Self { store, pipeline }
    }

    fn dispatch(&self, analysis: &Analysis) {
        // Completion is observed by re-reading the record.
        drop(self.pipeline.dispatch(PipelineJob::from(analysis)));
    }
}

#[async_trait]
impl AnalysisService for SeaOrmAnalysisService {
    async fn create(&self, owner: UserId, input: AnalysisInput) -> Result<Analysis, AnalysisError> {
        let analysis = self.store.create_analysis(owner, &input).await?;

        info!(
            analysis_id = %analysis.id,
            owner_id = %owner,
            language = %analysis.language,
            "Analysis submitted"
        );

        self.dispatch(&analysis);
        Ok(analysis)
    }

    async fn list(
        &self,
        owner: UserId,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Analysis>, AnalysisError> {
        Ok(self.store.list_analyses(owner, skip, limit).await?)
    }

    async fn get(&self, owner: UserId, id: AnalysisId) -> Result<Analysis, AnalysisError> {
        self.store
            .get_owned_analysis(id, owner)
            .await?
            .ok_or(AnalysisError::NotFound(id))
    }

    async fn update(
        &self,
        owner: UserId,
        id: AnalysisId,
        input: AnalysisInput,
    ) -> Result<Analysis, AnalysisError> {
        let analysis = self
            .store
            .resubmit_analysis(id, owner, input)
            .await?
            .ok_or(AnalysisError::NotFound(id))?;

        info!(analysis_id = %id, "Analysis resubmitted");
        self.dispatch(&analysis);
        Ok(analysis)
    }

    async fn reanalyze(&self, owner: UserId, id: AnalysisId) -> Result<Analysis, AnalysisError> {
        let analysis = self
            .store
            .reset_analysis(id, owner)
            .await?
            .ok_or(AnalysisError::NotFound(id))?;

        info!(analysis_id = %id, "Analysis queued for re-analysis");
        self.dispatch(&analysis);
        Ok(analysis)
    }

    async fn delete(&self, owner: UserId, id: AnalysisId) -> Result<(), AnalysisError> {
        if !self.store.delete_analysis(id, owner).await? {
            return Err(AnalysisError::NotFound(id));
        }

        info!(analysis_id = %id, "Analysis deleted");
        Ok(())
    }
}
