//! Recurring poll loop

use std::sync::Arc;

use courier_core::{Clock, QueueConfig};
use courier_entities::types::JobStatus;
use serde::Serialize;
use tokio::task::JoinError;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::dispatcher::{DispatchOutcome, Dispatcher};
use super::store::{EligibleQuery, JobStore};
use crate::errors::EmailError;

/// Counts per outcome for one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub delivered: usize,
    pub rate_limited: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &DispatchOutcome) {
        match outcome {
            DispatchOutcome::Delivered { .. } => self.delivered += 1,
            DispatchOutcome::RateLimited { .. } => self.rate_limited += 1,
            DispatchOutcome::Failed { .. } => self.failed += 1,
            DispatchOutcome::Skipped => self.skipped += 1,
        }
    }
}

pub struct Scheduler {
    store: Arc<dyn JobStore>,
    dispatcher: Arc<Dispatcher>,
    clock: Arc<dyn Clock>,
    config: QueueConfig,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn JobStore>,
        dispatcher: Arc<Dispatcher>,
        clock: Arc<dyn Clock>,
        config: QueueConfig,
    ) -> Self {
        Self {
            store,
            dispatcher,
            clock,
            config,
        }
    }

    /// Fetch one batch of eligible jobs and dispatch them in order
    ///
    /// Jobs are claimed here, then each delivery runs in its own task so a
    /// panic is confined to that job.
    /// A store error aborts the rest of the cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport, EmailError> {
        let now = self.clock.now();
        let query = EligibleQuery {
            now,
            max_attempts: self.config.max_attempts,
            lease_cutoff: self.config.lease_cutoff(now),
            limit: self.config.batch_size,
        };

        let jobs = self.store.query_eligible(&query).await?;
        let mut report = CycleReport {
            fetched: jobs.len(),
            ..CycleReport::default()
        };

        for job in jobs {
            let job_id = job.id;
            let Some(claimed_at) = self.dispatcher.claim(&job).await? else {
                report.record(&DispatchOutcome::Skipped);
                continue;
            };

            let dispatcher = self.dispatcher.clone();
            let handle = tokio::spawn(async move { dispatcher.deliver(job, claimed_at).await });

            let outcome = match handle.await {
                Ok(result) => result?,
                Err(join_error) => {
                    let reason = describe_fault(join_error);
                    error!(job_id = %job_id, "Dispatch task crashed: {}", reason);
                    if self
                        .dispatcher
                        .record_fault(job_id, claimed_at, &reason)
                        .await?
                    {
                        DispatchOutcome::Failed { reason }
                    } else {
                        self.settled_outcome(job_id).await?
                    }
                }
            };

            report.record(&outcome);
        }

        Ok(report)
    }

    /// Outcome of a crashed task whose job had already been settled
    async fn settled_outcome(&self, job_id: Uuid) -> Result<DispatchOutcome, EmailError> {
        let job = self.store.get(job_id).await?;
        Ok(match job.status {
            JobStatus::Completed => DispatchOutcome::Delivered {
                message_id: job.provider_message_id.unwrap_or_default(),
            },
            _ => DispatchOutcome::Skipped,
        })
    }

    /// Sleep, poll, repeat until `cancellation_token` fires
    ///
    /// A cycle is never interrupted; cancellation is observed between cycles.
    pub async fn run(&self, cancellation_token: CancellationToken) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            batch_size = self.config.batch_size,
            max_attempts = self.config.max_attempts,
            "Starting mail queue scheduler"
        );

        loop {
            tokio::select! {
                _ = time::sleep(self.config.interval) => {}
                _ = cancellation_token.cancelled() => {
                    info!("Mail queue scheduler cancelled, shutting down");
                    return;
                }
            }

            match self.run_cycle().await {
                Ok(report) if report.fetched > 0 => {
                    info!(
                        fetched = report.fetched,
                        delivered = report.delivered,
                        rate_limited = report.rate_limited,
                        failed = report.failed,
                        skipped = report.skipped,
                        "Poll cycle finished"
                    );
                }
                Ok(_) => debug!("Poll cycle found no eligible jobs"),
                Err(e) => error!("Poll cycle aborted: {}", e),
            }
        }
    }
}

fn describe_fault(join_error: JoinError) -> String {
    if !join_error.is_panic() {
        return "dispatch task was cancelled".to_string();
    }

    let panic = join_error.into_panic();
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("dispatch panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("dispatch panicked: {}", message)
    } else {
        "dispatch panicked".to_string()
    }
}
