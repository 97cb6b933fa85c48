use std::sync::Arc;

use clap::Args;
use courier_blob::{BlobService, StorageUsageHook};
use courier_core::{Clock, DeliveryHook, NoopDeliveryHook, SystemClock};
use courier_email::{
    CaptureTransport, DbJobStore, Dispatcher, HttpTransport, JobStore, MailTransport, Scheduler,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::args::{BlobArgs, DatabaseArgs, QueueArgs, TransportArgs};

#[derive(Args)]
pub struct WorkerCommand {
    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub queue: QueueArgs,

    #[command(flatten)]
    pub transport: TransportArgs,

    #[command(flatten)]
    pub blob: BlobArgs,
}

impl WorkerCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let queue_config = self.queue.to_config();
        queue_config.validate()?;

        debug!("Initializing database connection...");
        let db = courier_database::establish_connection(&self.database.to_config()).await?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let blob = match self.blob.to_config() {
            Some(config) => {
                info!("Using attachment bucket {}", config.bucket);
                Some(Arc::new(BlobService::from_config(&config).await?))
            }
            None => None,
        };

        let transport: Arc<dyn MailTransport> = match self.transport.to_config() {
            Some(config) => {
                info!("Delivering through relay at {}", config.base_url);
                let mut transport = HttpTransport::new(&config)?;
                if let Some(blob) = &blob {
                    transport = transport.with_blob_service(blob.clone());
                }
                Arc::new(transport)
            }
            None => {
                warn!("No transport URL configured, emails will be captured to the log");
                Arc::new(CaptureTransport::new())
            }
        };

        let hook: Arc<dyn DeliveryHook> = match &blob {
            Some(blob) => Arc::new(StorageUsageHook::new(
                blob.clone(),
                db.clone(),
                clock.clone(),
            )),
            None => Arc::new(NoopDeliveryHook),
        };

        let store: Arc<dyn JobStore> = Arc::new(DbJobStore::new(db));
        let dispatcher = Arc::new(Dispatcher::new(
            store.clone(),
            transport.clone(),
            hook,
            clock.clone(),
            queue_config.clone(),
        ));
        let scheduler = Scheduler::new(store, dispatcher, clock, queue_config);

        let cancellation_token = CancellationToken::new();
        let shutdown_token = cancellation_token.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    info!("Shutdown signal received, finishing current cycle");
                    shutdown_token.cancel();
                }
                Err(e) => error!("Failed to listen for shutdown signal: {}", e),
            }
        });

        info!("Courier worker started with {} transport", transport.kind());
        scheduler.run(cancellation_token).await;
        info!("Courier worker stopped");

        Ok(())
    }
}
