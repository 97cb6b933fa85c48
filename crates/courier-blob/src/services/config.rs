//! Blob Service configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bucket name for attachments
pub const DEFAULT_BUCKET_NAME: &str = "courier-attachments";
/// Default region when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";
/// Default lifetime of presigned download links
pub const DEFAULT_PRESIGN_TTL: Duration = Duration::from_secs(60 * 60);

/// Connection settings for the attachment bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobConfig {
    /// Custom endpoint (MinIO, RustFS, ...). `None` uses AWS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    pub region: String,

    pub bucket: String,

    /// Static access key. When absent the default AWS credential chain is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Path-style addressing, required by most self-hosted S3 servers
    pub force_path_style: bool,

    /// How long presigned download links stay valid
    pub presign_ttl: Duration,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: DEFAULT_REGION.to_string(),
            bucket: DEFAULT_BUCKET_NAME.to_string(),
            access_key: None,
            secret_key: None,
            force_path_style: false,
            presign_ttl: DEFAULT_PRESIGN_TTL,
        }
    }
}

impl BlobConfig {
    /// Static credentials, if both halves are present
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) if !access.is_empty() && !secret.is_empty() => {
                Some((access.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }
}
