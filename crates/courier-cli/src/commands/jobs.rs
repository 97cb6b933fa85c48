//! Commands that inspect or change individual jobs

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use courier_core::SystemClock;
use courier_email::{DbJobStore, QueueService};
use courier_entities::{mail_jobs, types::JobStatus};
use uuid::Uuid;

use super::args::{DatabaseArgs, QueueArgs};

#[derive(Args)]
pub struct StatusCommand {
    /// Job id returned when the email was queued
    pub job_id: Uuid,

    /// Print the job as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub queue: QueueArgs,
}

impl StatusCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let service = queue_service(&self.database, &self.queue).await?;
            let job = service.status_of(self.job_id).await?;
            print_job(&job, self.json)
        })
    }
}

#[derive(Args)]
pub struct RequeueCommand {
    /// Id of a failed job
    pub job_id: Uuid,

    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub queue: QueueArgs,
}

impl RequeueCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let service = queue_service(&self.database, &self.queue).await?;
            let job = service.requeue(self.job_id).await?;
            println!("{} {}", "Requeued".green().bold(), job.id);
            print_job(&job, false)
        })
    }
}

#[derive(Args)]
pub struct StatsCommand {
    /// Only count this owner's jobs
    #[arg(long)]
    pub owner: Option<i32>,

    #[command(flatten)]
    pub database: DatabaseArgs,

    #[command(flatten)]
    pub queue: QueueArgs,
}

impl StatsCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(async {
            let service = queue_service(&self.database, &self.queue).await?;
            let stats = service.stats(self.owner).await?;

            println!("{:<12}{}", "pending", stats.pending);
            println!("{:<12}{}", "processing", stats.processing);
            println!("{:<12}{}", "completed", stats.completed);
            println!("{:<12}{}", "failed", stats.failed);
            println!("{:<12}{}", "total".bold(), stats.total());
            Ok(())
        })
    }
}

async fn queue_service(database: &DatabaseArgs, queue: &QueueArgs) -> anyhow::Result<QueueService> {
    let db = courier_database::establish_connection(&database.to_config()).await?;
    Ok(QueueService::new(
        Arc::new(DbJobStore::new(db)),
        Arc::new(SystemClock),
        queue.to_config(),
    ))
}

fn print_job(job: &mail_jobs::Model, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(job)?);
        return Ok(());
    }

    let status = match job.status {
        JobStatus::Pending => job.status.as_str().yellow(),
        JobStatus::Processing => job.status.as_str().cyan(),
        JobStatus::Completed => job.status.as_str().green(),
        JobStatus::Failed => job.status.as_str().red(),
    };

    println!("{:<14}{}", "id", job.id);
    println!("{:<14}{}", "owner", job.owner_id);
    println!("{:<14}{}", "status", status);
    println!("{:<14}{}", "attempts", job.attempts);
    println!("{:<14}{}", "inserted", job.inserted_at);
    if let Some(scheduled_for) = job.scheduled_for {
        println!("{:<14}{}", "scheduled", scheduled_for);
    }
    if let Some(completed_at) = job.completed_at {
        println!("{:<14}{}", "completed", completed_at);
    }
    if let Some(message_id) = &job.provider_message_id {
        println!("{:<14}{}", "message id", message_id);
    }
    if let Some(error) = &job.last_error {
        println!("{:<14}{}", "last error", error.red());
    }

    Ok(())
}
