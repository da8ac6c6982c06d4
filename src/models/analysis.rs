//! The analysis record and its status lifecycle.
//!
//! `result` and `completed_at` are only ever set together with a terminal
//! status; every mutator below keeps that pairing intact.

use chrono::Utc;
use thiserror::Error;

use crate::domain::{AnalysisId, AnalysisStatus, UserId};
use crate::entities::code_analyses;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Illegal status transition: {from} -> {to}")]
pub struct InvalidTransition {
    pub from: AnalysisStatus,
    pub to: AnalysisStatus,
}

/// Submission content shared by create and resubmit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisInput {
    pub title: String,
    pub code_content: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
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

impl From<code_analyses::Model> for Analysis {
    fn from(model: code_analyses::Model) -> Self {
        Self {
            id: AnalysisId::new(model.id),
            title: model.title,
            code_content: model.code_content,
            language: model.language,
            status: model.status,
            result: model.result,
            created_at: model.created_at,
            completed_at: model.completed_at,
            owner_id: UserId::new(model.owner_id),
        }
    }
}

impl Analysis {
    /// Moves the record into `processing`, clearing any previous outcome.
    ///
    /// A record that is already `processing` is re-entered: a resubmitted run
    /// may find its predecessor still in flight, and the last writer wins.
    /// A resolved record is re-entered too, since every dispatched run must
    /// produce its own result.
    pub fn begin_processing(&mut self) -> Result<(), InvalidTransition> {
        if self.status != AnalysisStatus::Processing {
            self.transition(AnalysisStatus::Processing)?;
        }
        self.result = None;
        self.completed_at = None;
        Ok(())
    }

    pub fn complete(&mut self, review: String) -> Result<(), InvalidTransition> {
        self.transition(AnalysisStatus::Completed)?;
        self.resolve(review);
        Ok(())
    }

    pub fn fail(&mut self, message: String) -> Result<(), InvalidTransition> {
        self.transition(AnalysisStatus::Failed)?;
        self.resolve(message);
        Ok(())
    }

    /// Clears the outcome of any previous run and puts the record back in the
    /// queue with the given content.
    pub fn reset_for_resubmission(&mut self, input: AnalysisInput) {
        self.title = input.title;
        self.code_content = input.code_content;
        self.language = input.language;
        self.reset_to_pending();
    }

    pub fn reset_to_pending(&mut self) {
        self.status = AnalysisStatus::Pending;
        self.result = None;
        self.completed_at = None;
    }

    /// Checks the pairing of status with `result`/`completed_at`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        if self.status.is_terminal() {
            self.result.is_some() && self.completed_at.is_some()
        } else {
            self.result.is_none() && self.completed_at.is_none()
        }
    }

    fn transition(&mut self, to: AnalysisStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(to) {
            return Err(InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    fn resolve(&mut self, text: String) {
        self.result = Some(text);
        self.completed_at = Some(Utc::now().to_rfc3339());
    }
}
