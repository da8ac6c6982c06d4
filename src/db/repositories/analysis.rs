use anyhow::{Context, Result};
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use tracing::debug;

use crate::domain::{AnalysisId, AnalysisStatus, UserId};
use crate::entities::{code_analyses, prelude::*};
use crate::models::{Analysis, AnalysisInput};

/// Repository for code analysis records.
///
/// Every query taking an owner filters on `owner_id`; a record owned by
/// someone else is indistinguishable from a missing one.
pub struct AnalysisRepository {
    conn: DatabaseConnection,
}

impl AnalysisRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn create(&self, owner: UserId, input: &AnalysisInput) -> Result<Analysis> {
        let active = code_analyses::ActiveModel {
            title: Set(input.title.clone()),
            code_content: Set(input.code_content.clone()),
            language: Set(input.language.clone()),
            status: Set(AnalysisStatus::Pending),
            result: Set(None),
            created_at: Set(chrono::Utc::now().to_rfc3339()),
            completed_at: Set(None),
            owner_id: Set(owner.value()),
            ..Default::default()
        };

        let model = CodeAnalyses::insert(active)
            .exec_with_returning(&self.conn)
            .await
            .context("Failed to insert analysis")?;

        debug!(analysis_id = model.id, owner_id = owner.value(), "Created analysis");
        Ok(Analysis::from(model))
    }

    pub async fn get(&self, id: AnalysisId) -> Result<Option<Analysis>> {
        let row = CodeAnalyses::find_by_id(id.value())
            .one(&self.conn)
            .await
            .context("Failed to query analysis")?;

        Ok(row.map(Analysis::from))
    }

    pub async fn get_owned(&self, id: AnalysisId, owner: UserId) -> Result<Option<Analysis>> {
        let row = CodeAnalyses::find_by_id(id.value())
            .filter(code_analyses::Column::OwnerId.eq(owner.value()))
            .one(&self.conn)
            .await
            .context("Failed to query analysis")?;

        Ok(row.map(Analysis::from))
    }

    pub async fn list_for_owner(
        &self,
        owner: UserId,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<Analysis>> {
        let rows = CodeAnalyses::find()
            .filter(code_analyses::Column::OwnerId.eq(owner.value()))
            .order_by_asc(code_analyses::Column::Id)
            .offset(skip)
            .limit(limit)
            .all(&self.conn)
            .await
            .context("Failed to list analyses")?;

        Ok(rows.into_iter().map(Analysis::from).collect())
    }

    /// Replaces the content and resets the lifecycle to `pending`.
    pub async fn resubmit(
        &self,
        id: AnalysisId,
        owner: UserId,
        input: AnalysisInput,
    ) -> Result<Option<Analysis>> {
        let Some(mut analysis) = self.get_owned(id, owner).await? else {
            return Ok(None);
        };

        analysis.reset_for_resubmission(input);
        self.write(&analysis, true).await?;
        Ok(Some(analysis))
    }

    /// Resets the lifecycle to `pending`, keeping the current content.
    pub async fn reset_to_pending(&self, id: AnalysisId, owner: UserId) -> Result<Option<Analysis>> {
        let Some(mut analysis) = self.get_owned(id, owner).await? else {
            return Ok(None);
        };

        analysis.reset_to_pending();
        self.write(&analysis, false).await?;
        Ok(Some(analysis))
    }

    pub async fn delete_owned(&self, id: AnalysisId, owner: UserId) -> Result<bool> {
        let res = CodeAnalyses::delete_many()
            .filter(code_analyses::Column::Id.eq(id.value()))
            .filter(code_analyses::Column::OwnerId.eq(owner.value()))
            .exec(&self.conn)
            .await
            .context("Failed to delete analysis")?;

        Ok(res.rows_affected > 0)
    }

    /// Persists the lifecycle columns (status, result, `completed_at`).
    ///
    /// The write only applies while the stored code and language still match
    /// `analysis`. Returns `false` when the row is gone or its content was
    /// replaced by a resubmission.
    pub async fn save(&self, analysis: &Analysis) -> Result<bool> {
        let res = CodeAnalyses::update_many()
            .set(Self::lifecycle_columns(analysis, false))
            .filter(code_analyses::Column::Id.eq(analysis.id.value()))
            .filter(code_analyses::Column::CodeContent.eq(analysis.code_content.as_str()))
            .filter(code_analyses::Column::Language.eq(analysis.language.as_str()))
            .exec(&self.conn)
            .await
            .context("Failed to update analysis")?;

        Ok(res.rows_affected > 0)
    }

    async fn write(&self, analysis: &Analysis, with_content: bool) -> Result<bool> {
        let res = CodeAnalyses::update_many()
            .set(Self::lifecycle_columns(analysis, with_content))
            .filter(code_analyses::Column::Id.eq(analysis.id.value()))
            .exec(&self.conn)
            .await
            .context("Failed to update analysis")?;

        Ok(res.rows_affected > 0)
    }

    fn lifecycle_columns(analysis: &Analysis, with_content: bool) -> code_analyses::ActiveModel {
        let content = |value: &String| {
            if with_content {
                Set(value.clone())
            } else {
                NotSet
            }
        };

        code_analyses::ActiveModel {
            id: NotSet,
            title: content(&analysis.title),
            code_content: content(&analysis.code_content),
            language: content(&analysis.language),
            status: Set(analysis.status),
            result: Set(analysis.result.clone()),
            created_at: NotSet,
            completed_at: Set(analysis.completed_at.clone()),
            owner_id: NotSet,
        }
    }
}
