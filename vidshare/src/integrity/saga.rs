use std::fmt::Display;

use log::warn;
use serde::Serialize;

use crate::{errors::CascadeError, id::EntityId, types::Collection};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeStep {
    DeletePrimary,
    DeleteBlob,
    DeleteComments,
    DeleteCommentLikes,
    DeleteLikes,
    DetachFromPlaylist,
}

impl CascadeStep {
    /// Dependent-record cleanup; its failures fail the cascade.
    /// Blob deletes are excluded: an orphaned blob is tolerated.
    #[inline]
    pub const fn is_cleanup(self) -> bool {
        !matches!(self, CascadeStep::DeletePrimary | CascadeStep::DeleteBlob)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            CascadeStep::DeletePrimary => "delete_primary",
            CascadeStep::DeleteBlob => "delete_blob",
            CascadeStep::DeleteComments => "delete_comments",
            CascadeStep::DeleteCommentLikes => "delete_comment_likes",
            CascadeStep::DeleteLikes => "delete_likes",
            CascadeStep::DetachFromPlaylist => "detach_from_playlist",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Done { affected: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepOutcome {
    pub step: CascadeStep,
    /// Blob URL or playlist id the step acted on, when it targets one item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(flatten)]
    pub status: StepStatus,
}

impl StepOutcome {
    #[inline]
    pub fn failed(&self) -> bool {
        matches!(self.status, StepStatus::Failed { .. })
    }
}

/// Outcome of every step of a delete cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CascadeReport {
    pub collection: Collection,
    pub id: EntityId,
    pub steps: Vec<StepOutcome>,
}

impl CascadeReport {
    pub fn new(collection: Collection, id: EntityId) -> Self {
        Self {
            collection,
            id,
            steps: Vec::new(),
        }
    }

    pub fn record_done(&mut self, step: CascadeStep, subject: Option<String>, affected: u64) {
        self.steps.push(StepOutcome {
            step,
            subject,
            status: StepStatus::Done { affected },
        });
    }

    pub fn record_failure(&mut self, step: CascadeStep, subject: Option<String>, error: &dyn Display) {
        warn!(
            "{} {}: step {} failed{}: {error}",
            self.collection.entity_name(),
            self.id,
            step.as_str(),
            subject.as_deref().map(|s| format!(" for {s}")).unwrap_or_default()
        );
        self.steps.push(StepOutcome {
            step,
            subject,
            status: StepStatus::Failed {
                error: error.to_string(),
            },
        });
    }

    pub fn record<E: Display>(&mut self, step: CascadeStep, subject: Option<String>, result: Result<u64, E>) {
        match result {
            Ok(affected) => self.record_done(step, subject, affected),
            Err(err) => self.record_failure(step, subject, &err),
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.steps.iter().filter(|outcome| outcome.failed())
    }

    pub fn cleanup_failures(&self) -> impl Iterator<Item = &StepOutcome> {
        self.failures().filter(|outcome| outcome.step.is_cleanup())
    }

    /// Rows affected by all successful runs of `step`.
    pub fn affected(&self, step: CascadeStep) -> u64 {
        self.steps
            .iter()
            .filter(|outcome| outcome.step == step)
            .map(|outcome| match outcome.status {
                StepStatus::Done { affected } => affected,
                StepStatus::Failed { .. } => 0,
            })
            .sum()
    }

    /// `Err` when any dependent cleanup failed.
    pub fn into_result(self) -> Result<Self, CascadeError> {
        if self.cleanup_failures().next().is_some() {
            Err(CascadeError { report: self })
        } else {
            Ok(self)
        }
    }
}
