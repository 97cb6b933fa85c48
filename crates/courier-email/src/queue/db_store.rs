//! sea-orm backed job store

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{DBDateTime, OwnerId};
use courier_entities::{mail_jobs, types::JobStatus};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use uuid::Uuid;

use super::store::{EligibleQuery, JobStats, JobStore, NewJob, StatusTransition};
use crate::errors::EmailError;

pub struct DbJobStore {
    db: Arc<DatabaseConnection>,
}

impl DbJobStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// `pending`, or `processing` with a claim at or before `lease_cutoff`
    fn claimable(lease_cutoff: DBDateTime) -> Condition {
        Condition::any()
            .add(mail_jobs::Column::Status.eq(JobStatus::Pending))
            .add(
                Condition::all()
                    .add(mail_jobs::Column::Status.eq(JobStatus::Processing))
                    .add(mail_jobs::Column::ClaimedAt.lte(lease_cutoff)),
            )
    }

    /// `processing` under the claim made at `claimed_at`
    fn held_under(claimed_at: DBDateTime) -> Condition {
        Condition::all()
            .add(mail_jobs::Column::Status.eq(JobStatus::Processing))
            .add(mail_jobs::Column::ClaimedAt.eq(claimed_at))
    }
}

#[async_trait]
impl JobStore for DbJobStore {
    async fn insert(&self, job: NewJob) -> Result<mail_jobs::Model, EmailError> {
        let row = mail_jobs::ActiveModel {
            id: Set(job.id),
            owner_id: Set(job.owner_id),
            payload: Set(job.payload),
            attachments: Set(job.attachments),
            status: Set(JobStatus::Pending),
            attempts: Set(0),
            last_error: Set(None),
            provider_message_id: Set(None),
            scheduled_for: Set(job.scheduled_for),
            claimed_at: Set(None),
            completed_at: Set(None),
            inserted_at: Set(job.inserted_at),
            updated_at: Set(job.inserted_at),
        };

        Ok(row.insert(self.db.as_ref()).await?)
    }

    async fn get(&self, id: Uuid) -> Result<mail_jobs::Model, EmailError> {
        mail_jobs::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or(EmailError::JobNotFound(id))
    }

    async fn query_eligible(
        &self,
        query: &EligibleQuery,
    ) -> Result<Vec<mail_jobs::Model>, EmailError> {
        let jobs = mail_jobs::Entity::find()
            .filter(Self::claimable(query.lease_cutoff))
            .filter(mail_jobs::Column::Attempts.lt(query.max_attempts))
            .filter(
                Condition::any()
                    .add(mail_jobs::Column::ScheduledFor.is_null())
                    .add(mail_jobs::Column::ScheduledFor.lte(query.now)),
            )
            .order_by_asc(mail_jobs::Column::InsertedAt)
            .order_by_asc(mail_jobs::Column::Id)
            .limit(query.limit)
            .all(self.db.as_ref())
            .await?;

        Ok(jobs)
    }

    async fn update_status(
        &self,
        id: Uuid,
        transition: StatusTransition,
    ) -> Result<bool, EmailError> {
        let update = mail_jobs::Entity::update_many()
            .col_expr(mail_jobs::Column::Status, Expr::value(transition.target()))
            .filter(mail_jobs::Column::Id.eq(id));

        let update = match transition {
            StatusTransition::Claim { at, lease_cutoff } => update
                .col_expr(mail_jobs::Column::ClaimedAt, Expr::value(Some(at)))
                .col_expr(mail_jobs::Column::UpdatedAt, Expr::value(at))
                .filter(Self::claimable(lease_cutoff)),
            StatusTransition::Complete {
                claimed_at,
                provider_message_id,
                at,
            } => update
                .col_expr(
                    mail_jobs::Column::ProviderMessageId,
                    Expr::value(Some(provider_message_id)),
                )
                .col_expr(mail_jobs::Column::CompletedAt, Expr::value(Some(at)))
                .col_expr(mail_jobs::Column::ClaimedAt, Expr::value(None::<DBDateTime>))
                .col_expr(mail_jobs::Column::UpdatedAt, Expr::value(at))
                .filter(Self::held_under(claimed_at)),
            StatusTransition::Release { claimed_at, at } => update
                .col_expr(mail_jobs::Column::ClaimedAt, Expr::value(None::<DBDateTime>))
                .col_expr(mail_jobs::Column::UpdatedAt, Expr::value(at))
                .filter(Self::held_under(claimed_at)),
            StatusTransition::Fail {
                claimed_at,
                error,
                at,
            } => update
                .col_expr(
                    mail_jobs::Column::Attempts,
                    Expr::col(mail_jobs::Column::Attempts).add(1),
                )
                .col_expr(mail_jobs::Column::LastError, Expr::value(Some(error)))
                .col_expr(mail_jobs::Column::ClaimedAt, Expr::value(None::<DBDateTime>))
                .col_expr(mail_jobs::Column::UpdatedAt, Expr::value(at))
                .filter(Self::held_under(claimed_at)),
            StatusTransition::Requeue { max_attempts, at } => update
                .col_expr(mail_jobs::Column::UpdatedAt, Expr::value(at))
                .filter(mail_jobs::Column::Status.eq(JobStatus::Failed))
                .filter(mail_jobs::Column::Attempts.lt(max_attempts)),
        };

        let result = update.exec(self.db.as_ref()).await?;
        Ok(result.rows_affected == 1)
    }

    async fn list_for_owner(
        &self,
        owner_id: OwnerId,
        status: Option<JobStatus>,
    ) -> Result<Vec<mail_jobs::Model>, EmailError> {
        let mut query = mail_jobs::Entity::find().filter(mail_jobs::Column::OwnerId.eq(owner_id));

        if let Some(status) = status {
            query = query.filter(mail_jobs::Column::Status.eq(status));
        }

        let jobs = query
            .order_by_desc(mail_jobs::Column::InsertedAt)
            .all(self.db.as_ref())
            .await?;

        Ok(jobs)
    }

    async fn stats(&self, owner_id: Option<OwnerId>) -> Result<JobStats, EmailError> {
        let mut stats = JobStats::default();

        for status in [
            JobStatus::Pending,
            JobStatus::Processing,
            JobStatus::Completed,
            JobStatus::Failed,
        ] {
            let mut query = mail_jobs::Entity::find().filter(mail_jobs::Column::Status.eq(status));
            if let Some(owner_id) = owner_id {
                query = query.filter(mail_jobs::Column::OwnerId.eq(owner_id));
            }
            let count = query.count(self.db.as_ref()).await?;

            match status {
                JobStatus::Pending => stats.pending = count,
                JobStatus::Processing => stats.processing = count,
                JobStatus::Completed => stats.completed = count,
                JobStatus::Failed => stats.failed = count,
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use courier_database::test_utils::TestDatabase;

    fn base_time() -> DBDateTime {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap()
    }

    fn new_job(owner_id: OwnerId, inserted_at: DBDateTime) -> NewJob {
        NewJob {
            id: Uuid::new_v4(),
            owner_id,
            payload: r#"{"version":"1"}"#.to_string(),
            attachments: None,
            scheduled_for: None,
            inserted_at,
        }
    }

    fn query_at(now: DBDateTime, limit: u64) -> EligibleQuery {
        EligibleQuery {
            now,
            max_attempts: 3,
            lease_cutoff: now - Duration::minutes(15),
            limit,
        }
    }

    async fn store() -> anyhow::Result<(TestDatabase, DbJobStore)> {
        let test_db = TestDatabase::with_migrations().await?;
        let store = DbJobStore::new(test_db.connection());
        Ok((test_db, store))
    }

    #[tokio::test]
    async fn test_insert_sets_pending_and_zero_attempts() -> anyhow::Result<()> {
        let (_db, store) = store().await?;

        let job = store.insert(new_job(1, base_time())).await?;

        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 0);
        assert_eq!(store.get(job.id).await?, job);
        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_job_is_not_found() -> anyhow::Result<()> {
        let (_db, store) = store().await?;
        let id = Uuid::new_v4();

        let result = store.get(id).await;

        assert!(matches!(result, Err(EmailError::JobNotFound(missing)) if missing == id));
        Ok(())
    }

    #[tokio::test]
    async fn test_query_eligible_filters_and_orders_oldest_first() -> anyhow::Result<()> {
        let (_db, store) = store().await?;
        let t0 = base_time();
        let now = t0 + Duration::hours(1);

        let newest = store.insert(new_job(1, t0 + Duration::minutes(2))).await?;
        let oldest = store.insert(new_job(2, t0)).await?;
        let middle = store.insert(new_job(1, t0 + Duration::minutes(1))).await?;

        let mut future = new_job(1, t0);
        future.scheduled_for = Some(now + Duration::minutes(5));
        store.insert(future).await?;

        let exhausted = store.insert(new_job(1, t0)).await?;
        for _ in 0..3 {
            store
                .update_status(exhausted.id, StatusTransition::Claim { at: t0, lease_cutoff: t0 })
                .await?;
            store
                .update_status(
                    exhausted.id,
                    StatusTransition::Fail {
                        claimed_at: t0,
                        error: "boom".to_string(),
                        at: t0,
                    },
                )
                .await?;
            store
                .update_status(
                    exhausted.id,
                    StatusTransition::Requeue {
                        max_attempts: 5,
                        at: t0,
                    },
                )
                .await?;
        }

        let query = query_at(now, 10);
        let jobs = store.query_eligible(&query).await?;

        let ids: Vec<Uuid> = jobs.iter().map(|job| job.id).collect();
        assert_eq!(ids, vec![oldest.id, middle.id, newest.id]);
        assert!(jobs.iter().all(|job| query.matches(job)));
        Ok(())
    }

    #[tokio::test]
    async fn test_query_eligible_respects_limit() -> anyhow::Result<()> {
        let (_db, store) = store().await?;
        let t0 = base_time();
        for i in 0..7 {
            store.insert(new_job(1, t0 + Duration::seconds(i))).await?;
        }

        let jobs = store.query_eligible(&query_at(t0 + Duration::hours(1), 5)).await?;

        assert_eq!(jobs.len(), 5);
        Ok(())
    }

    #[tokio::test]
    async fn test_claim_is_compare_and_set() -> anyhow::Result<()> {
        let (_db, store) = store().await?;
        let now = base_time();
        let job = store.insert(new_job(1, now)).await?;
        let claim = StatusTransition::Claim {
            at: now,
            lease_cutoff: now - Duration::minutes(15),
        };

        assert!(store.update_status(job.id, claim.clone()).await?);
        assert!(!store.update_status(job.id, claim).await?);

        let claimed = store.get(job.id).await?;
        assert_eq!(claimed.status, JobStatus::Processing);
        assert_eq!(claimed.claimed_at, Some(now));
        Ok(())
    }

    #[tokio::test]
    async fn test_stale_claim_is_reclaimable_without_consuming_attempts() -> anyhow::Result<()> {
        let (_db, store) = store().await?;
        let t0 = base_time();
        let job = store.insert(new_job(1, t0)).await?;
        store
            .update_status(
                job.id,
                StatusTransition::Claim {
                    at: t0,
                    lease_cutoff: t0 - Duration::minutes(15),
                },
            )
            .await?;

        let early = query_at(t0 + Duration::minutes(10), 5);
        assert!(store.query_eligible(&early).await?.is_empty());

        let late = query_at(t0 + Duration::minutes(16), 5);
        let jobs = store.query_eligible(&late).await?;
        assert_eq!(jobs.len(), 1);

        let reclaimed = store
            .update_status(
                job.id,
                StatusTransition::Claim {
                    at: late.now,
                    lease_cutoff: late.lease_cutoff,
                },
            )
            .await?;
        assert!(reclaimed);

        let job = store.get(job.id).await?;
        assert_eq!(job.attempts, 0);
        assert_eq!(job.claimed_at, Some(late.now));
        Ok(())
    }

    #[tokio::test]
    async fn test_release_keeps_attempts_and_error() -> anyhow::Result<()> {
        let (_db, store) = store().await?;
        let now = base_time();
        let job = store.insert(new_job(1, now)).await?;
        let claim = StatusTransition::Claim {
            at: now,
            lease_cutoff: now,
        };

        store.update_status(job.id, claim.clone()).await?;
        store
            .update_status(
                job.id,
                StatusTransition::Fail {
                    claimed_at: now,
                    error: "first".to_string(),
                    at: now,
                },
            )
            .await?;
        store
            .update_status(
                job.id,
                StatusTransition::Requeue {
                    max_attempts: 3,
                    at: now,
                },
            )
            .await?;
        store.update_status(job.id, claim).await?;
        assert!(
            store
                .update_status(
                    job.id,
                    StatusTransition::Release {
                        claimed_at: now,
                        at: now,
                    },
                )
                .await?
        );

        let job = store.get(job.id).await?;
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.last_error.as_deref(), Some("first"));
        assert_eq!(job.claimed_at, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_complete_records_message_id() -> anyhow::Result<()> {
        let (_db, store) = store().await?;
        let now = base_time();
        let job = store.insert(new_job(1, now)).await?;

        store
            .update_status(
                job.id,
                StatusTransition::Claim {
                    at: now,
                    lease_cutoff: now,
                },
            )
            .await?;
        let done = now + Duration::seconds(3);
        store
            .update_status(
                job.id,
                StatusTransition::Complete {
                    claimed_at: now,
                    provider_message_id: "relay-77".to_string(),
                    at: done,
                },
            )
            .await?;

        let job = store.get(job.id).await?;
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.provider_message_id.as_deref(), Some("relay-77"));
        assert_eq!(job.completed_at, Some(done));
        assert_eq!(job.updated_at, done);

        // Completed jobs cannot be failed afterwards
        let failed = store
            .update_status(
                job.id,
                StatusTransition::Fail {
                    claimed_at: now,
                    error: "late".to_string(),
                    at: done,
                },
            )
            .await?;
        assert!(!failed);
        Ok(())
    }

    #[tokio::test]
    async fn test_previous_holder_cannot_settle_a_reclaimed_job() -> anyhow::Result<()> {
        let (_db, store) = store().await?;
        let t0 = base_time();
        let job = store.insert(new_job(1, t0)).await?;
        store
            .update_status(
                job.id,
                StatusTransition::Claim {
                    at: t0,
                    lease_cutoff: t0 - Duration::minutes(15),
                },
            )
            .await?;

        let reclaim = query_at(t0 + Duration::minutes(16), 5);
        assert!(
            store
                .update_status(
                    job.id,
                    StatusTransition::Claim {
                        at: reclaim.now,
                        lease_cutoff: reclaim.lease_cutoff,
                    },
                )
                .await?
        );

        let late = reclaim.now + Duration::seconds(30);
        let stale = [
            StatusTransition::Release {
                claimed_at: t0,
                at: late,
            },
            StatusTransition::Fail {
                claimed_at: t0,
                error: "timed out".to_string(),
                at: late,
            },
            StatusTransition::Complete {
                claimed_at: t0,
                provider_message_id: "relay-late".to_string(),
                at: late,
            },
        ];
        for transition in stale {
            assert!(!store.update_status(job.id, transition).await?);
        }

        let held = store.get(job.id).await?;
        assert_eq!(held.status, JobStatus::Processing);
        assert_eq!(held.claimed_at, Some(reclaim.now));
        assert_eq!(held.attempts, 0);
        assert_eq!(held.last_error, None);
        assert_eq!(held.provider_message_id, None);

        // No third worker can claim while the new lease is live
        let third = query_at(late, 5);
        assert!(store.query_eligible(&third).await?.is_empty());

        assert!(
            store
                .update_status(
                    job.id,
                    StatusTransition::Complete {
                        claimed_at: reclaim.now,
                        provider_message_id: "relay-88".to_string(),
                        at: late,
                    },
                )
                .await?
        );
        assert_eq!(store.get(job.id).await?.status, JobStatus::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_and_stats_per_owner() -> anyhow::Result<()> {
        let (_db, store) = store().await?;
        let t0 = base_time();
        let older = store.insert(new_job(1, t0)).await?;
        let newer = store.insert(new_job(1, t0 + Duration::minutes(1))).await?;
        store.insert(new_job(2, t0)).await?;
        store
            .update_status(
                older.id,
                StatusTransition::Claim {
                    at: t0,
                    lease_cutoff: t0,
                },
            )
            .await?;

        let jobs = store.list_for_owner(1, None).await?;
        let ids: Vec<Uuid> = jobs.iter().map(|job| job.id).collect();
        assert_eq!(ids, vec![newer.id, older.id]);

        let processing = store.list_for_owner(1, Some(JobStatus::Processing)).await?;
        assert_eq!(processing.len(), 1);

        let owner_stats = store.stats(Some(1)).await?;
        assert_eq!(owner_stats.pending, 1);
        assert_eq!(owner_stats.processing, 1);

        let all_stats = store.stats(None).await?;
        assert_eq!(all_stats.total(), 3);
        Ok(())
    }
}
