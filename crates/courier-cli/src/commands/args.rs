//! Flag groups shared by several commands

use std::time::Duration;

use clap::Args;
use courier_blob::BlobConfig;
use courier_core::{DatabaseConfig, QueueConfig};
use courier_email::HttpTransportConfig;

#[derive(Args, Debug)]
pub struct DatabaseArgs {
    /// Database connection URL
    #[arg(long, env = "COURIER_DATABASE_URL")]
    pub database_url: String,

    /// Maximum number of pooled connections
    #[arg(long, default_value_t = 10, env = "COURIER_DATABASE_MAX_CONNECTIONS")]
    pub max_connections: u32,
}

impl DatabaseArgs {
    pub fn to_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            max_connections: self.max_connections,
            ..DatabaseConfig::new(self.database_url.clone())
        }
    }
}

#[derive(Args, Debug)]
pub struct QueueArgs {
    /// Seconds between two poll cycles
    #[arg(long, default_value_t = 10, env = "COURIER_POLL_INTERVAL")]
    pub poll_interval: u64,

    /// Maximum number of jobs dispatched per cycle
    #[arg(long, default_value_t = 5, env = "COURIER_BATCH_SIZE")]
    pub batch_size: u64,

    /// Delivery attempts before a job stays failed
    #[arg(long, default_value_t = 3, env = "COURIER_MAX_ATTEMPTS")]
    pub max_attempts: i32,

    /// Seconds after which a job stuck in processing is picked up again
    #[arg(long, default_value_t = 900, env = "COURIER_VISIBILITY_TIMEOUT")]
    pub visibility_timeout: u64,
}

impl QueueArgs {
    pub fn to_config(&self) -> QueueConfig {
        QueueConfig {
            interval: Duration::from_secs(self.poll_interval),
            batch_size: self.batch_size,
            max_attempts: self.max_attempts,
            visibility_timeout: Duration::from_secs(self.visibility_timeout),
        }
    }
}

#[derive(Args, Debug)]
pub struct TransportArgs {
    /// Base URL of the mail relay; emails are only logged when unset
    #[arg(long, env = "COURIER_TRANSPORT_URL")]
    pub transport_url: Option<String>,

    /// Bearer token for the mail relay
    #[arg(long, default_value = "", env = "COURIER_TRANSPORT_API_KEY", hide_env_values = true)]
    pub transport_api_key: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 30, env = "COURIER_TRANSPORT_TIMEOUT")]
    pub transport_timeout: u64,
}

impl TransportArgs {
    pub fn to_config(&self) -> Option<HttpTransportConfig> {
        self.transport_url.as_ref().map(|url| HttpTransportConfig {
            base_url: url.clone(),
            api_key: self.transport_api_key.clone(),
            timeout: Duration::from_secs(self.transport_timeout),
        })
    }
}

#[derive(Args, Debug)]
pub struct BlobArgs {
    /// Attachment bucket; storage accounting is disabled when unset
    #[arg(long, env = "COURIER_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Custom S3 endpoint (MinIO, RustFS, ...)
    #[arg(long, env = "COURIER_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    #[arg(long, default_value = courier_blob::services::DEFAULT_REGION, env = "COURIER_S3_REGION")]
    pub s3_region: String,

    #[arg(long, env = "COURIER_S3_ACCESS_KEY", hide_env_values = true)]
    pub s3_access_key: Option<String>,

    #[arg(long, env = "COURIER_S3_SECRET_KEY", hide_env_values = true)]
    pub s3_secret_key: Option<String>,

    /// Use path-style bucket addressing
    #[arg(long, env = "COURIER_S3_FORCE_PATH_STYLE")]
    pub s3_force_path_style: bool,

    /// Lifetime of presigned attachment links in seconds
    #[arg(long, default_value_t = 3600, env = "COURIER_S3_PRESIGN_TTL")]
    pub s3_presign_ttl: u64,
}

impl BlobArgs {
    pub fn to_config(&self) -> Option<BlobConfig> {
        self.s3_bucket.as_ref().map(|bucket| BlobConfig {
            endpoint: self.s3_endpoint.clone(),
            region: self.s3_region.clone(),
            bucket: bucket.clone(),
            access_key: self.s3_access_key.clone(),
            secret_key: self.s3_secret_key.clone(),
            force_path_style: self.s3_force_path_style,
            presign_ttl: Duration::from_secs(self.s3_presign_ttl),
        })
    }
}
