//! Per-job state machine: claim, decode, send, record the outcome

use std::sync::Arc;

use chrono::SubsecRound;
use courier_core::{Clock, DBDateTime, DeliveryHook, QueueConfig};
use courier_entities::mail_jobs;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::payload::{decode_attachments, JobPayload};
use super::store::{JobStore, StatusTransition};
use crate::errors::EmailError;
use crate::providers::{AttachmentRef, MailTransport, SendEmailRequest};

/// What happened to one job handed to [`Dispatcher::dispatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Transport accepted the message, job is `completed`
    Delivered { message_id: String },
    /// Transport asked us to back off, job is `pending` again
    RateLimited { retry_after: Option<u64> },
    /// Permanent failure recorded on the job, which is now `failed`
    Failed { reason: String },
    /// Another worker holds the job, or took it over before the outcome was recorded
    Skipped,
}

pub struct Dispatcher {
    store: Arc<dyn JobStore>,
    transport: Arc<dyn MailTransport>,
    hook: Arc<dyn DeliveryHook>,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        transport: Arc<dyn MailTransport>,
        hook: Arc<dyn DeliveryHook>,
        clock: Arc<dyn Clock>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            transport,
            hook,
            clock,
            config,
        }
    }

    /// Drive one job through the transport
    ///
    /// The claim is persisted before the transport is called. `Err` is only
    /// returned for store failures; everything job-scoped becomes an outcome.
    pub async fn dispatch(&self, job: mail_jobs::Model) -> Result<DispatchOutcome, EmailError> {
        match self.claim(&job).await? {
            Some(claimed_at) => self.deliver(job, claimed_at).await,
            None => Ok(DispatchOutcome::Skipped),
        }
    }

    /// Take the lease on `job`, returning the claim's `claimed_at`
    ///
    /// `None` when another worker holds a live lease or the job is no longer
    /// eligible.
    pub async fn claim(&self, job: &mail_jobs::Model) -> Result<Option<DBDateTime>, EmailError> {
        // Stored timestamps keep microseconds; the claim is matched back exactly
        let now = self.clock.now().trunc_subsecs(6);
        let claimed = self
            .store
            .update_status(
                job.id,
                StatusTransition::Claim {
                    at: now,
                    lease_cutoff: self.config.lease_cutoff(now),
                },
            )
            .await?;

        if !claimed {
            debug!(job_id = %job.id, "Job already claimed, skipping");
            return Ok(None);
        }

        Ok(Some(now))
    }

    /// Send a job this worker claimed at `claimed_at` and settle it under that claim
    pub async fn deliver(
        &self,
        job: mail_jobs::Model,
        claimed_at: DBDateTime,
    ) -> Result<DispatchOutcome, EmailError> {
        debug!(
            job_id = %job.id,
            owner_id = job.owner_id,
            attempts = job.attempts,
            "Dispatching job"
        );

        let (request, attachments) = match decode_job(&job) {
            Ok(decoded) => decoded,
            Err(e) => return self.fail(job.id, claimed_at, e.to_string()).await,
        };

        match self
            .transport
            .send(job.owner_id, &request, &attachments)
            .await
        {
            Ok(response) => {
                let completed = self
                    .store
                    .update_status(
                        job.id,
                        StatusTransition::Complete {
                            claimed_at,
                            provider_message_id: response.message_id.clone(),
                            at: self.clock.now(),
                        },
                    )
                    .await?;

                if completed {
                    info!(
                        job_id = %job.id,
                        owner_id = job.owner_id,
                        message_id = %response.message_id,
                        "Email delivered"
                    );
                } else {
                    warn!(
                        job_id = %job.id,
                        message_id = %response.message_id,
                        "Email delivered but the job lease was taken over"
                    );
                }

                if let Err(e) = self.hook.on_delivered(job.owner_id).await {
                    warn!(
                        job_id = %job.id,
                        owner_id = job.owner_id,
                        "Delivery hook failed: {}",
                        e
                    );
                }

                Ok(DispatchOutcome::Delivered {
                    message_id: response.message_id,
                })
            }
            Err(e) if e.is_transient() => {
                let retry_after = e.retry_after();
                let released = self
                    .store
                    .update_status(
                        job.id,
                        StatusTransition::Release {
                            claimed_at,
                            at: self.clock.now(),
                        },
                    )
                    .await?;

                if !released {
                    warn!(job_id = %job.id, "Rate limited after the job lease was taken over");
                    return Ok(DispatchOutcome::Skipped);
                }

                warn!(
                    job_id = %job.id,
                    owner_id = job.owner_id,
                    ?retry_after,
                    "Transport rate limited, job returned to pending"
                );

                Ok(DispatchOutcome::RateLimited { retry_after })
            }
            Err(e) => self.fail(job.id, claimed_at, e.to_string()).await,
        }
    }

    /// Record a fault raised outside the normal outcome path
    ///
    /// Only a job still `processing` under the claim made at `claimed_at` is
    /// failed, so a fault after completion or takeover changes nothing and
    /// returns `false`.
    pub async fn record_fault(
        &self,
        job_id: Uuid,
        claimed_at: DBDateTime,
        reason: &str,
    ) -> Result<bool, EmailError> {
        self.store
            .update_status(
                job_id,
                StatusTransition::Fail {
                    claimed_at,
                    error: reason.to_string(),
                    at: self.clock.now(),
                },
            )
            .await
    }

    async fn fail(
        &self,
        job_id: Uuid,
        claimed_at: DBDateTime,
        reason: String,
    ) -> Result<DispatchOutcome, EmailError> {
        if !self.record_fault(job_id, claimed_at, &reason).await? {
            warn!(
                job_id = %job_id,
                "Delivery failed after the job lease was taken over: {}",
                reason
            );
            return Ok(DispatchOutcome::Skipped);
        }

        error!(job_id = %job_id, "Email delivery failed: {}", reason);
        Ok(DispatchOutcome::Failed { reason })
    }
}

fn decode_job(
    job: &mail_jobs::Model,
) -> Result<(SendEmailRequest, Vec<AttachmentRef>), EmailError> {
    let request = JobPayload::decode(&job.payload)?;
    let attachments = decode_attachments(job.attachments.as_deref())?;
    Ok((request, attachments))
}
