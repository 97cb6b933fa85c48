//! Job store contract shared by the database and in-memory stores

use async_trait::async_trait;
use courier_core::{DBDateTime, OwnerId};
use courier_entities::{mail_jobs, types::JobStatus};
use serde::Serialize;
use uuid::Uuid;

use crate::errors::EmailError;

/// A job as accepted by the submission API, before it is persisted
#[derive(Debug, Clone)]
pub struct NewJob {
    pub id: Uuid,
    pub owner_id: OwnerId,
    pub payload: String,
    pub attachments: Option<String>,
    pub scheduled_for: Option<DBDateTime>,
    pub inserted_at: DBDateTime,
}

/// Parameters of one poll cycle's batch query
#[derive(Debug, Clone, Copy)]
pub struct EligibleQuery {
    pub now: DBDateTime,
    pub max_attempts: i32,
    /// Claims at or before this instant have expired
    pub lease_cutoff: DBDateTime,
    pub limit: u64,
}

impl EligibleQuery {
    pub fn matches(&self, job: &mail_jobs::Model) -> bool {
        let claimable = match job.status {
            JobStatus::Pending => true,
            JobStatus::Processing => job
                .claimed_at
                .map_or(false, |claimed_at| claimed_at <= self.lease_cutoff),
            JobStatus::Completed | JobStatus::Failed => false,
        };

        claimable
            && job.attempts < self.max_attempts
            && job
                .scheduled_for
                .map_or(true, |scheduled_for| scheduled_for <= self.now)
    }
}

/// Single-row status change keyed by job id
///
/// Every transition is guarded by the state it starts from; a store applies
/// it only if the row is still in that state. Transitions out of
/// `processing` also carry the `claimed_at` of the claim they settle, so a
/// worker whose lease was taken over cannot touch the new holder's row.
#[derive(Debug, Clone)]
pub enum StatusTransition {
    /// `pending`, or `processing` with a lease at or before `lease_cutoff`, to `processing`
    Claim {
        at: DBDateTime,
        lease_cutoff: DBDateTime,
    },
    /// `processing` to `completed`
    Complete {
        claimed_at: DBDateTime,
        provider_message_id: String,
        at: DBDateTime,
    },
    /// `processing` back to `pending`, attempts and error untouched
    Release { claimed_at: DBDateTime, at: DBDateTime },
    /// `processing` to `failed`, consuming one attempt
    Fail {
        claimed_at: DBDateTime,
        error: String,
        at: DBDateTime,
    },
    /// `failed` back to `pending` while attempts remain
    Requeue { max_attempts: i32, at: DBDateTime },
}

impl StatusTransition {
    pub fn target(&self) -> JobStatus {
        match self {
            StatusTransition::Claim { .. } => JobStatus::Processing,
            StatusTransition::Complete { .. } => JobStatus::Completed,
            StatusTransition::Release { .. } | StatusTransition::Requeue { .. } => {
                JobStatus::Pending
            }
            StatusTransition::Fail { .. } => JobStatus::Failed,
        }
    }

    /// Whether a job in its current state may take this transition
    pub fn applies_to(&self, job: &mail_jobs::Model) -> bool {
        match self {
            StatusTransition::Claim { lease_cutoff, .. } => match job.status {
                JobStatus::Pending => true,
                JobStatus::Processing => job
                    .claimed_at
                    .map_or(false, |claimed_at| claimed_at <= *lease_cutoff),
                _ => false,
            },
            StatusTransition::Complete { claimed_at, .. }
            | StatusTransition::Release { claimed_at, .. }
            | StatusTransition::Fail { claimed_at, .. } => {
                job.status == JobStatus::Processing && job.claimed_at == Some(*claimed_at)
            }
            StatusTransition::Requeue { max_attempts, .. } => {
                job.status == JobStatus::Failed && job.attempts < *max_attempts
            }
        }
    }

    /// Apply the transition to an in-memory row
    pub fn apply(&self, job: &mut mail_jobs::Model) {
        job.status = self.target();
        match self {
            StatusTransition::Claim { at, .. } => {
                job.claimed_at = Some(*at);
                job.updated_at = *at;
            }
            StatusTransition::Complete {
                provider_message_id,
                at,
                ..
            } => {
                job.provider_message_id = Some(provider_message_id.clone());
                job.completed_at = Some(*at);
                job.claimed_at = None;
                job.updated_at = *at;
            }
            StatusTransition::Release { at, .. } => {
                job.claimed_at = None;
                job.updated_at = *at;
            }
            StatusTransition::Fail { error, at, .. } => {
                job.attempts += 1;
                job.last_error = Some(error.clone());
                job.claimed_at = None;
                job.updated_at = *at;
            }
            StatusTransition::Requeue { at, .. } => {
                job.updated_at = *at;
            }
        }
    }
}

/// Job counts per status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
}

impl JobStats {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed
    }

    pub(crate) fn bump(&mut self, status: JobStatus) {
        match status {
            JobStatus::Pending => self.pending += 1,
            JobStatus::Processing => self.processing += 1,
            JobStatus::Completed => self.completed += 1,
            JobStatus::Failed => self.failed += 1,
        }
    }
}

/// Durable table of jobs
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: NewJob) -> Result<mail_jobs::Model, EmailError>;

    /// Point lookup, [`EmailError::JobNotFound`] when absent
    async fn get(&self, id: Uuid) -> Result<mail_jobs::Model, EmailError>;

    /// Eligible jobs, oldest `inserted_at` first, at most `query.limit`
    async fn query_eligible(
        &self,
        query: &EligibleQuery,
    ) -> Result<Vec<mail_jobs::Model>, EmailError>;

    /// Returns `false` when the row was not in a state the transition starts
    /// from, including a `processing` row now held under a different claim
    async fn update_status(
        &self,
        id: Uuid,
        transition: StatusTransition,
    ) -> Result<bool, EmailError>;

    /// Owner's jobs, newest first
    async fn list_for_owner(
        &self,
        owner_id: OwnerId,
        status: Option<JobStatus>,
    ) -> Result<Vec<mail_jobs::Model>, EmailError>;

    async fn stats(&self, owner_id: Option<OwnerId>) -> Result<JobStats, EmailError>;
}
