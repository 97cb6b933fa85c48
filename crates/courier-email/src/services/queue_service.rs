//! Submission API for the delivery queue

use std::sync::Arc;

use courier_core::{Clock, DBDateTime, OwnerId, QueueConfig};
use courier_entities::{mail_jobs, types::JobStatus};
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::EmailError;
use crate::providers::{AttachmentRef, SendEmailRequest};
use crate::queue::payload::{encode_attachments, JobPayload};
use crate::queue::{JobStats, JobStore, NewJob, StatusTransition};

/// Request to queue an email for background delivery
#[derive(Debug, Clone)]
pub struct SubmitEmailRequest {
    pub owner_id: OwnerId,
    pub email: SendEmailRequest,
    pub attachments: Vec<AttachmentRef>,
    /// Not delivered before this instant when set
    pub scheduled_for: Option<DBDateTime>,
}

impl SubmitEmailRequest {
    pub fn new(owner_id: OwnerId, email: SendEmailRequest) -> Self {
        Self {
            owner_id,
            email,
            attachments: Vec::new(),
            scheduled_for: None,
        }
    }

    pub fn with_attachments(mut self, attachments: Vec<AttachmentRef>) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn scheduled_for(mut self, at: DBDateTime) -> Self {
        self.scheduled_for = Some(at);
        self
    }
}

/// Service for queueing emails and inspecting queued jobs
pub struct QueueService {
    store: Arc<dyn JobStore>,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
}

impl QueueService {
    pub fn new(store: Arc<dyn JobStore>, clock: Arc<dyn Clock>, config: QueueConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// Persist a new `pending` job
    ///
    /// Nothing is sent here; the scheduler picks the job up on a later cycle.
    pub async fn submit(&self, request: SubmitEmailRequest) -> Result<mail_jobs::Model, EmailError> {
        request.email.validate()?;

        for attachment in &request.attachments {
            if attachment.pathname.trim().is_empty() || attachment.filename.trim().is_empty() {
                return Err(EmailError::Validation(
                    "Attachments need both a pathname and a filename".to_string(),
                ));
            }
        }

        let job = self
            .store
            .insert(NewJob {
                id: Uuid::new_v4(),
                owner_id: request.owner_id,
                payload: JobPayload::encode(&request.email)?,
                attachments: encode_attachments(&request.attachments)?,
                scheduled_for: request.scheduled_for,
                inserted_at: self.clock.now(),
            })
            .await?;

        info!(
            job_id = %job.id,
            owner_id = job.owner_id,
            scheduled_for = ?job.scheduled_for,
            "Queued email: {}",
            request.email.subject
        );

        Ok(job)
    }

    /// Current state of a job
    pub async fn status_of(&self, job_id: Uuid) -> Result<mail_jobs::Model, EmailError> {
        self.store.get(job_id).await
    }

    /// Move a `failed` job back to `pending` for another attempt
    ///
    /// Only allowed while the job has attempts left; `last_error` is kept.
    pub async fn requeue(&self, job_id: Uuid) -> Result<mail_jobs::Model, EmailError> {
        let job = self.store.get(job_id).await?;

        if job.status != JobStatus::Failed {
            return Err(EmailError::InvalidState {
                job_id,
                status: job.status,
                expected: JobStatus::Failed,
            });
        }
        if job.attempts >= self.config.max_attempts {
            return Err(EmailError::RetryBudgetExhausted {
                job_id,
                attempts: job.attempts,
            });
        }

        let requeued = self
            .store
            .update_status(
                job_id,
                StatusTransition::Requeue {
                    max_attempts: self.config.max_attempts,
                    at: self.clock.now(),
                },
            )
            .await?;

        let job = self.store.get(job_id).await?;
        if !requeued {
            return Err(EmailError::InvalidState {
                job_id,
                status: job.status,
                expected: JobStatus::Failed,
            });
        }

        info!(job_id = %job_id, attempts = job.attempts, "Requeued failed email");
        Ok(job)
    }

    /// Owner's jobs, newest first, optionally filtered by status
    pub async fn list_for_owner(
        &self,
        owner_id: OwnerId,
        status: Option<JobStatus>,
    ) -> Result<Vec<mail_jobs::Model>, EmailError> {
        debug!(owner_id, ?status, "Listing queued emails");
        self.store.list_for_owner(owner_id, status).await
    }

    /// Job counts per status, for one owner or the whole queue
    pub async fn stats(&self, owner_id: Option<OwnerId>) -> Result<JobStats, EmailError> {
        self.store.stats(owner_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::DbJobStore;
    use chrono::{Duration, TimeZone, Utc};
    use courier_core::ManualClock;
    use courier_database::test_utils::TestDatabase;

    fn email(subject: &str) -> SendEmailRequest {
        SendEmailRequest {
            from: "alice@example.com".to_string(),
            from_name: None,
            to: vec!["bob@example.com".to_string()],
            cc: None,
            bcc: None,
            reply_to: None,
            subject: subject.to_string(),
            html: Some("<p>hello</p>".to_string()),
            text: None,
            headers: None,
        }
    }

    struct Fixture {
        _db: TestDatabase,
        store: Arc<DbJobStore>,
        clock: Arc<ManualClock>,
        service: QueueService,
    }

    async fn fixture() -> anyhow::Result<Fixture> {
        let db = TestDatabase::with_migrations().await?;
        let store = Arc::new(DbJobStore::new(db.connection()));
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 4, 1, 10, 0, 0).unwrap(),
        ));
        let service = QueueService::new(store.clone(), clock.clone(), QueueConfig::default());
        Ok(Fixture {
            _db: db,
            store,
            clock,
            service,
        })
    }

    async fn fail_job(fixture: &Fixture, job_id: Uuid, error: &str) -> anyhow::Result<()> {
        let now = fixture.clock.now();
        fixture
            .store
            .update_status(
                job_id,
                StatusTransition::Claim {
                    at: now,
                    lease_cutoff: now,
                },
            )
            .await?;
        fixture
            .store
            .update_status(
                job_id,
                StatusTransition::Fail {
                    claimed_at: now,
                    error: error.to_string(),
                    at: now,
                },
            )
            .await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_creates_pending_job() -> anyhow::Result<()> {
        let f = fixture().await?;
        let attachment = AttachmentRef {
            pathname: "invoices/march.pdf".to_string(),
            filename: "march.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            size: Some(2048),
        };

        let job = f
            .service
            .submit(SubmitEmailRequest::new(5, email("Invoice")).with_attachments(vec![attachment]))
            .await?;

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(job.owner_id, 5);
        assert_eq!(job.inserted_at, f.clock.now());
        assert_eq!(JobPayload::decode(&job.payload)?.subject, "Invoice");
        assert!(job.attachments.as_deref().unwrap().contains("march.pdf"));
        Ok(())
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_request() -> anyhow::Result<()> {
        let f = fixture().await?;
        let mut invalid = email("No recipients");
        invalid.to.clear();

        let result = f.service.submit(SubmitEmailRequest::new(5, invalid)).await;

        assert!(matches!(result, Err(EmailError::Validation(_))));
        assert_eq!(f.service.stats(None).await?.total(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_status_of_unknown_job_is_not_found() -> anyhow::Result<()> {
        let f = fixture().await?;

        let result = f.service.status_of(Uuid::new_v4()).await;

        assert!(matches!(result, Err(EmailError::JobNotFound(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_requeue_failed_job_keeps_error() -> anyhow::Result<()> {
        let f = fixture().await?;
        let job = f.service.submit(SubmitEmailRequest::new(1, email("Retry me"))).await?;
        fail_job(&f, job.id, "relay down").await?;

        f.clock.advance(Duration::minutes(1));
        let requeued = f.service.requeue(job.id).await?;

        assert_eq!(requeued.status, JobStatus::Pending);
        assert_eq!(requeued.attempts, 1);
        assert_eq!(requeued.last_error.as_deref(), Some("relay down"));
        assert_eq!(requeued.updated_at, f.clock.now());
        Ok(())
    }

    #[tokio::test]
    async fn test_requeue_refuses_exhausted_budget() -> anyhow::Result<()> {
        let f = fixture().await?;
        let job = f.service.submit(SubmitEmailRequest::new(1, email("Doomed"))).await?;

        for _ in 0..3 {
            fail_job(&f, job.id, "relay down").await?;
            if f.service.status_of(job.id).await?.attempts < 3 {
                f.service.requeue(job.id).await?;
            }
        }

        let result = f.service.requeue(job.id).await;

        assert!(matches!(
            result,
            Err(EmailError::RetryBudgetExhausted { attempts: 3, .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_requeue_refuses_non_failed_job() -> anyhow::Result<()> {
        let f = fixture().await?;
        let job = f.service.submit(SubmitEmailRequest::new(1, email("Fresh"))).await?;

        let result = f.service.requeue(job.id).await;

        assert!(matches!(
            result,
            Err(EmailError::InvalidState {
                status: JobStatus::Pending,
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_and_stats() -> anyhow::Result<()> {
        let f = fixture().await?;
        let first = f.service.submit(SubmitEmailRequest::new(1, email("One"))).await?;
        f.clock.advance(Duration::seconds(1));
        let second = f.service.submit(SubmitEmailRequest::new(1, email("Two"))).await?;
        f.service.submit(SubmitEmailRequest::new(2, email("Other"))).await?;
        fail_job(&f, first.id, "bounced").await?;

        let jobs = f.service.list_for_owner(1, None).await?;
        assert_eq!(
            jobs.iter().map(|job| job.id).collect::<Vec<_>>(),
            vec![second.id, first.id]
        );

        let failed = f.service.list_for_owner(1, Some(JobStatus::Failed)).await?;
        assert_eq!(failed.len(), 1);

        let stats = f.service.stats(Some(1)).await?;
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.failed, 1);
        Ok(())
    }
}
