//! The analysis pipeline: drives one record from `pending` to a terminal state.
//!
//! A run is dispatched as a detached task right after a record is created or
//! resubmitted. The HTTP response never waits for it; clients observe progress
//! only by re-reading the record. Each run commits twice (enter `processing`,
//! resolve), so a crash in between leaves the record `processing`.
//!
//! Every save is conditional on the stored code and language still matching
//! the job. A run whose content was replaced by a resubmission stops writing,
//! so the run dispatched for the new content always has the last word.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::clients::Reviewer;
use crate::db::Store;
use crate::domain::AnalysisId;
use crate::models::Analysis;

/// Prefix of the stored result when the reviewer call fails.
pub const FAILURE_PREFIX: &str = "Analysis failed: ";

/// What the pipeline needs from the record store.
#[async_trait]
pub trait AnalysisRecords: Send + Sync {
    async fn load(&self, id: AnalysisId) -> anyhow::Result<Option<Analysis>>;

    /// Persists the lifecycle fields. `Ok(false)` means the record is gone or
    /// its content was resubmitted since it was loaded.
    async fn save(&self, analysis: &Analysis) -> anyhow::Result<bool>;
}

#[async_trait]
impl AnalysisRecords for Store {
    async fn load(&self, id: AnalysisId) -> anyhow::Result<Option<Analysis>> {
        self.get_analysis(id).await
    }

    async fn save(&self, analysis: &Analysis) -> anyhow::Result<bool> {
        self.save_analysis(analysis).await
    }
}

/// Unit of work handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineJob {
    pub analysis_id: AnalysisId,
    pub code: String,
    pub language: String,
}

impl From<&Analysis> for PipelineJob {
    fn from(analysis: &Analysis) -> Self {
        Self {
            analysis_id: analysis.id,
            code: analysis.code_content.clone(),
            language: analysis.language.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    Failed,
    /// The record vanished or was resubmitted with new content.
    Aborted,
}

impl RunOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Aborted => "aborted",
        }
    }
}

/// Owns its own store handle so runs outlive the request that spawned them.
#[derive(Clone)]
pub struct AnalysisPipeline {
    records: Arc<dyn AnalysisRecords>,
    reviewer: Arc<dyn Reviewer>,
}

impl AnalysisPipeline {
    #[must_use]
    pub fn new(records: Arc<dyn AnalysisRecords>, reviewer: Arc<dyn Reviewer>) -> Self {
        Self { records, reviewer }
    }

    /// Spawns a run and returns immediately. The handle may be dropped.
    pub fn dispatch(&self, job: PipelineJob) -> JoinHandle<()> {
        let pipeline = self.clone();
        let span = info_span!("pipeline_run", analysis_id = %job.analysis_id);

        tokio::spawn(
            async move {
                if let Err(e) = pipeline.run(job).await {
                    error!(error = %e, "Pipeline run aborted by store error");
                }
            }
            .instrument(span),
        )
    }

    pub async fn run(&self, job: PipelineJob) -> anyhow::Result<RunOutcome> {
        let start = Instant::now();
        let outcome = self.run_inner(job).await?;

        metrics::counter!("analysis_pipeline_runs_total", "outcome" => outcome.as_str())
            .increment(1);
        metrics::histogram!("analysis_pipeline_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        Ok(outcome)
    }

    async fn run_inner(&self, job: PipelineJob) -> anyhow::Result<RunOutcome> {
        let Some(mut analysis) = self.records.load(job.analysis_id).await? else {
            debug!("Analysis no longer exists, skipping run");
            return Ok(RunOutcome::Aborted);
        };

        if analysis.code_content != job.code || analysis.language != job.language {
            debug!("Analysis resubmitted since dispatch, skipping stale run");
            return Ok(RunOutcome::Aborted);
        }

        analysis.begin_processing()?;

        if !self.records.save(&analysis).await? {
            debug!("Analysis deleted or resubmitted before processing started");
            return Ok(RunOutcome::Aborted);
        }

        info!(language = %job.language, "Analysis processing");

        let outcome = match self.reviewer.review(&job.code, &job.language).await {
            Ok(review) => {
                analysis.complete(review)?;
                RunOutcome::Completed
            }
            Err(e) => {
                warn!(error = %e, "Reviewer call failed");
                analysis.fail(format!("{FAILURE_PREFIX}{e}"))?;
                RunOutcome::Failed
            }
        };

        if !self.records.save(&analysis).await? {
            debug!("Analysis deleted or resubmitted while the reviewer was running");
            return Ok(RunOutcome::Aborted);
        }

        info!(status = %analysis.status, "Analysis resolved");
        Ok(outcome)
    }
}
