//! Side effects that run after a message has been handed to the transport

use async_trait::async_trait;

use crate::error::ServiceResult;
use crate::types::OwnerId;

/// Best-effort callback invoked once per delivered job.
///
/// Errors are reported back to the caller for logging only; they never change
/// the state of the job that triggered them.
#[async_trait]
pub trait DeliveryHook: Send + Sync {
    async fn on_delivered(&self, owner_id: OwnerId) -> ServiceResult<()>;
}

/// Hook used when nothing needs to happen after delivery
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDeliveryHook;

#[async_trait]
impl DeliveryHook for NoopDeliveryHook {
    async fn on_delivered(&self, _owner_id: OwnerId) -> ServiceResult<()> {
        Ok(())
    }
}
