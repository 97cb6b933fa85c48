//! In-memory job store for single-process setups and tests

use std::collections::HashMap;

use async_trait::async_trait;
use courier_core::OwnerId;
use courier_entities::{mail_jobs, types::JobStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::store::{EligibleQuery, JobStats, JobStore, NewJob, StatusTransition};
use crate::errors::EmailError;

/// Jobs kept in a map; lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<Uuid, mail_jobs::Model>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn insert(&self, job: NewJob) -> Result<mail_jobs::Model, EmailError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&job.id) {
            return Err(EmailError::Validation(format!(
                "Job {} already exists",
                job.id
            )));
        }

        let model = mail_jobs::Model {
            id: job.id,
            owner_id: job.owner_id,
            payload: job.payload,
            attachments: job.attachments,
            status: JobStatus::Pending,
            attempts: 0,
            last_error: None,
            provider_message_id: None,
            scheduled_for: job.scheduled_for,
            claimed_at: None,
            completed_at: None,
            inserted_at: job.inserted_at,
            updated_at: job.inserted_at,
        };
        jobs.insert(model.id, model.clone());

        Ok(model)
    }

    async fn get(&self, id: Uuid) -> Result<mail_jobs::Model, EmailError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(EmailError::JobNotFound(id))
    }

    async fn query_eligible(
        &self,
        query: &EligibleQuery,
    ) -> Result<Vec<mail_jobs::Model>, EmailError> {
        let jobs = self.jobs.read().await;
        let mut eligible: Vec<mail_jobs::Model> = jobs
            .values()
            .filter(|job| query.matches(job))
            .cloned()
            .collect();

        eligible.sort_by(|a, b| a.inserted_at.cmp(&b.inserted_at).then(a.id.cmp(&b.id)));
        eligible.truncate(usize::try_from(query.limit).unwrap_or(usize::MAX));

        Ok(eligible)
    }

    async fn update_status(
        &self,
        id: Uuid,
        transition: StatusTransition,
    ) -> Result<bool, EmailError> {
        let mut jobs = self.jobs.write().await;
        match jobs.get_mut(&id) {
            Some(job) if transition.applies_to(job) => {
                transition.apply(job);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for_owner(
        &self,
        owner_id: OwnerId,
        status: Option<JobStatus>,
    ) -> Result<Vec<mail_jobs::Model>, EmailError> {
        let jobs = self.jobs.read().await;
        let mut owned: Vec<mail_jobs::Model> = jobs
            .values()
            .filter(|job| job.owner_id == owner_id)
            .filter(|job| status.map_or(true, |status| job.status == status))
            .cloned()
            .collect();

        owned.sort_by(|a, b| b.inserted_at.cmp(&a.inserted_at));
        Ok(owned)
    }

    async fn stats(&self, owner_id: Option<OwnerId>) -> Result<JobStats, EmailError> {
        let jobs = self.jobs.read().await;
        let mut stats = JobStats::default();

        for job in jobs
            .values()
            .filter(|job| owner_id.map_or(true, |owner_id| job.owner_id == owner_id))
        {
            stats.bump(job.status);
        }

        Ok(stats)
    }
}
