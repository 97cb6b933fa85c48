//! Courier CLI - runs the mail queue worker and inspects queued jobs

mod commands;

use clap::{Parser, Subcommand};
use commands::{RequeueCommand, StatsCommand, StatusCommand, WorkerCommand};
use tracing_subscriber::{layer::SubscriberExt, Layer};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "COURIER_LOG_LEVEL", global = true)]
    log_level: String,

    /// Log format: compact, full
    #[arg(
        long,
        default_value = "compact",
        env = "COURIER_LOG_FORMAT",
        global = true
    )]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the delivery queue until interrupted
    Worker(WorkerCommand),
    /// Show the state of a queued email
    Status(StatusCommand),
    /// Put a failed email back in the queue
    Requeue(RequeueCommand),
    /// Count queued emails per status
    Stats(StatsCommand),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = cli.log_level.clone();

    // RUST_LOG wins; otherwise courier crates follow --log-level and
    // noisy dependencies stay at warn
    let filter = if std::env::var("RUST_LOG").is_ok() {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .expect("Invalid RUST_LOG environment variable")
    } else {
        tracing_subscriber::EnvFilter::new(format!(
            "courier={level},\
             courier_cli={level},\
             courier_core={level},\
             courier_database={level},\
             courier_migrations={level},\
             courier_blob={level},\
             courier_email={level},\
             sqlx=warn,\
             sea_orm=warn,\
             sea_orm_migration=warn,\
             aws_config=warn,\
             aws_smithy_runtime=warn,\
             h2=warn,\
             hyper=warn,\
             reqwest=warn,\
             rustls=warn",
            level = log_level
        ))
    };

    let fmt_layer = match cli.log_format.as_str() {
        "full" => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
        _ => tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false)
            .boxed(),
    };

    let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set global default subscriber");

    match cli.command {
        Commands::Worker(worker_cmd) => worker_cmd.execute(),
        Commands::Status(status_cmd) => status_cmd.execute(),
        Commands::Requeue(requeue_cmd) => requeue_cmd.execute(),
        Commands::Stats(stats_cmd) => stats_cmd.execute(),
    }
}
