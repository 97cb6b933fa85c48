//! Storage usage accounting run after each successful delivery

use std::sync::Arc;

use async_trait::async_trait;
use courier_core::{Clock, DeliveryHook, OwnerId, ServiceError, ServiceResult};
use courier_entities::storage_usage;
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait};
use tracing::debug;

use super::blob_service::{BlobService, ListOptions};
use crate::error::BlobError;

/// Totals for everything an owner has stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UsageTotals {
    pub bytes: i64,
    pub objects: i64,
}

/// Computes how much storage an owner currently uses
#[async_trait]
pub trait UsageCalculator: Send + Sync {
    async fn usage(&self, owner_id: OwnerId) -> Result<UsageTotals, BlobError>;
}

#[async_trait]
impl UsageCalculator for BlobService {
    async fn usage(&self, owner_id: OwnerId) -> Result<UsageTotals, BlobError> {
        let mut totals = UsageTotals::default();
        let mut cursor = None;

        loop {
            let page = self
                .list(
                    owner_id,
                    ListOptions {
                        limit: Some(1000),
                        prefix: None,
                        cursor,
                    },
                )
                .await?;

            totals.objects += page.blobs.len() as i64;
            totals.bytes += page.blobs.iter().map(|blob| blob.size).sum::<i64>();

            match page.cursor {
                Some(next) if page.has_more => cursor = Some(next),
                _ => break,
            }
        }

        Ok(totals)
    }
}

/// Delivery hook that refreshes the owner's `storage_usage` row
pub struct StorageUsageHook {
    calculator: Arc<dyn UsageCalculator>,
    db: Arc<DatabaseConnection>,
    clock: Arc<dyn Clock>,
}

impl StorageUsageHook {
    pub fn new(
        calculator: Arc<dyn UsageCalculator>,
        db: Arc<DatabaseConnection>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            calculator,
            db,
            clock,
        }
    }

    /// Recompute and persist usage for one owner
    pub async fn refresh(&self, owner_id: OwnerId) -> Result<UsageTotals, BlobError> {
        let totals = self.calculator.usage(owner_id).await?;

        let row = storage_usage::ActiveModel {
            owner_id: Set(owner_id),
            bytes_used: Set(totals.bytes),
            object_count: Set(totals.objects),
            computed_at: Set(self.clock.now()),
        };

        storage_usage::Entity::insert(row)
            .on_conflict(
                OnConflict::column(storage_usage::Column::OwnerId)
                    .update_columns([
                        storage_usage::Column::BytesUsed,
                        storage_usage::Column::ObjectCount,
                        storage_usage::Column::ComputedAt,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.db.as_ref())
            .await?;

        debug!(
            owner_id,
            bytes = totals.bytes,
            objects = totals.objects,
            "Storage usage refreshed"
        );

        Ok(totals)
    }
}

#[async_trait]
impl DeliveryHook for StorageUsageHook {
    async fn on_delivered(&self, owner_id: OwnerId) -> ServiceResult<()> {
        self.refresh(owner_id)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                BlobError::Database(db_err) => ServiceError::Database(db_err.to_string()),
                other => ServiceError::ExternalService {
                    service: "blob".to_string(),
                    message: other.to_string(),
                },
            })
    }
}
