//! Blob Service implementation with an S3 backend

use std::time::Duration;

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use courier_core::OwnerId;
use tracing::debug;
use uuid::Uuid;

use super::config::BlobConfig;
use crate::error::BlobError;

/// Options for PUT operations
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// Content type of the blob
    pub content_type: Option<String>,
    /// Add random suffix to pathname
    pub add_random_suffix: bool,
}

/// Information about a stored blob
#[derive(Debug, Clone)]
pub struct BlobInfo {
    /// Pathname relative to the owner namespace
    pub pathname: String,
    pub content_type: String,
    /// Size in bytes
    pub size: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Options for LIST operations
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Maximum number of items to return
    pub limit: Option<i32>,
    /// Prefix to filter by
    pub prefix: Option<String>,
    /// Continuation token for pagination
    pub cursor: Option<String>,
}

/// Result of a LIST operation
#[derive(Debug, Clone)]
pub struct ListResult {
    pub blobs: Vec<BlobInfo>,
    /// Continuation token for next page
    pub cursor: Option<String>,
    pub has_more: bool,
}

/// Attachment storage with per-owner isolation
#[derive(Clone)]
pub struct BlobService {
    client: Client,
    bucket: String,
    presign_ttl: Duration,
}

impl BlobService {
    /// Create a service around an existing S3 client
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            presign_ttl: super::config::DEFAULT_PRESIGN_TTL,
        }
    }

    pub fn with_presign_ttl(mut self, ttl: Duration) -> Self {
        self.presign_ttl = ttl;
        self
    }

    /// Build the S3 client from configuration.
    ///
    /// Static credentials win; otherwise the default AWS provider chain
    /// (environment, profile, instance metadata) is consulted.
    pub async fn from_config(config: &BlobConfig) -> Result<Self, BlobError> {
        if config.bucket.trim().is_empty() {
            return Err(BlobError::Configuration(
                "bucket name must not be empty".to_string(),
            ));
        }

        let client = match config.static_credentials() {
            Some((access_key, secret_key)) => {
                let credentials =
                    Credentials::new(access_key, secret_key, None, None, "courier-static");
                let mut builder = aws_sdk_s3::config::Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .force_path_style(config.force_path_style)
                    .credentials_provider(credentials);
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.endpoint_url(endpoint);
                }
                Client::from_conf(builder.build())
            }
            None => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                let mut builder = aws_sdk_s3::config::Builder::from(&shared)
                    .force_path_style(config.force_path_style);
                if let Some(endpoint) = &config.endpoint {
                    builder = builder.endpoint_url(endpoint);
                }
                Client::from_conf(builder.build())
            }
        };

        Ok(Self::new(client, config.bucket.clone()).with_presign_ttl(config.presign_ttl))
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Build the object key with owner namespace
    fn object_key(&self, owner_id: OwnerId, pathname: &str) -> Result<String, BlobError> {
        let normalized = normalize_pathname(pathname)?;
        Ok(format!("{}{}", owner_prefix(owner_id), normalized))
    }

    /// Extract pathname from object key
    fn extract_pathname(&self, owner_id: OwnerId, key: &str) -> String {
        let prefix = owner_prefix(owner_id);
        key.strip_prefix(&prefix).unwrap_or(key).to_string()
    }

    /// Upload a blob
    pub async fn put(
        &self,
        owner_id: OwnerId,
        pathname: &str,
        body: Bytes,
        options: PutOptions,
    ) -> Result<BlobInfo, BlobError> {
        let final_pathname = if options.add_random_suffix {
            add_random_suffix(pathname)
        } else {
            pathname.to_string()
        };

        let key = self.object_key(owner_id, &final_pathname)?;
        let content_type = options
            .content_type
            .unwrap_or_else(|| guess_content_type(&final_pathname).to_string());
        let size = body.len() as i64;

        debug!("PUT {} ({} bytes, {})", key, size, content_type);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(body))
            .content_type(&content_type)
            .send()
            .await
            .map_err(|e| BlobError::UploadFailed(e.to_string()))?;

        Ok(BlobInfo {
            pathname: self.extract_pathname(owner_id, &key),
            content_type,
            size,
            uploaded_at: Utc::now(),
        })
    }

    /// Download a blob fully into memory, returning its bytes and content type
    pub async fn get(&self, owner_id: OwnerId, pathname: &str) -> Result<(Bytes, String), BlobError> {
        let key = self.object_key(owner_id, pathname)?;

        debug!("GET {}", key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|service_error| service_error.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    BlobError::NotFound(pathname.to_string())
                } else {
                    BlobError::S3(e.to_string())
                }
            })?;

        let content_type = response
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| BlobError::DownloadFailed(e.to_string()))?
            .into_bytes();

        Ok((body, content_type))
    }

    /// Get blob metadata
    pub async fn head(&self, owner_id: OwnerId, pathname: &str) -> Result<BlobInfo, BlobError> {
        let key = self.object_key(owner_id, pathname)?;

        debug!("HEAD {}", key);

        let response = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|service_error| service_error.is_not_found())
                    .unwrap_or(false);
                if missing {
                    BlobError::NotFound(pathname.to_string())
                } else {
                    BlobError::S3(e.to_string())
                }
            })?;

        Ok(BlobInfo {
            pathname: pathname.trim_start_matches('/').to_string(),
            content_type: response
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string(),
            size: response.content_length().unwrap_or(0),
            uploaded_at: response
                .last_modified()
                .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
                .unwrap_or_else(Utc::now),
        })
    }

    /// Delete one or more blobs, returning how many were removed
    pub async fn del(&self, owner_id: OwnerId, pathnames: Vec<String>) -> Result<i64, BlobError> {
        let mut deleted = 0i64;

        for pathname in pathnames {
            let key = self.object_key(owner_id, &pathname)?;
            debug!("DELETE {}", key);

            match self
                .client
                .delete_object()
                .bucket(&self.bucket)
                .key(&key)
                .send()
                .await
            {
                Ok(_) => deleted += 1,
                Err(e) => {
                    debug!("Failed to delete {}: {}", key, e);
                }
            }
        }

        Ok(deleted)
    }

    /// List blobs with pagination
    pub async fn list(&self, owner_id: OwnerId, options: ListOptions) -> Result<ListResult, BlobError> {
        let prefix = match options.prefix {
            Some(ref p) => self.object_key(owner_id, p)?,
            None => owner_prefix(owner_id),
        };

        debug!("LIST prefix={}", prefix);

        let mut request = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix);

        if let Some(limit) = options.limit {
            request = request.max_keys(limit);
        }

        if let Some(cursor) = options.cursor {
            request = request.continuation_token(cursor);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BlobError::S3(e.to_string()))?;

        let blobs = response
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?;
                Some(BlobInfo {
                    pathname: self.extract_pathname(owner_id, key),
                    // LIST does not return content types
                    content_type: guess_content_type(key).to_string(),
                    size: obj.size().unwrap_or(0),
                    uploaded_at: obj
                        .last_modified()
                        .and_then(|dt| DateTime::from_timestamp(dt.secs(), dt.subsec_nanos()))
                        .unwrap_or_else(Utc::now),
                })
            })
            .collect();

        Ok(ListResult {
            blobs,
            cursor: response.next_continuation_token().map(|s| s.to_string()),
            has_more: response.is_truncated().unwrap_or(false),
        })
    }

    /// Create a time-limited download URL for a blob
    pub async fn presign_get(
        &self,
        owner_id: OwnerId,
        pathname: &str,
        expires_in: Option<Duration>,
    ) -> Result<String, BlobError> {
        let key = self.object_key(owner_id, pathname)?;
        let presigning = PresigningConfig::expires_in(expires_in.unwrap_or(self.presign_ttl))
            .map_err(|e| BlobError::Presign(e.to_string()))?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| BlobError::Presign(e.to_string()))?;

        debug!("PRESIGN {}", key);

        Ok(request.uri().to_string())
    }
}

fn owner_prefix(owner_id: OwnerId) -> String {
    format!("u{}/", owner_id)
}

/// Strip leading slashes and refuse paths that could escape the owner namespace
fn normalize_pathname(pathname: &str) -> Result<&str, BlobError> {
    let normalized = pathname.trim_start_matches('/');
    if normalized.is_empty() {
        return Err(BlobError::InvalidPath(pathname.to_string()));
    }
    if normalized.split('/').any(|segment| segment == "..") {
        return Err(BlobError::InvalidPath(pathname.to_string()));
    }
    Ok(normalized)
}

/// Add a random suffix to a pathname before the extension
fn add_random_suffix(pathname: &str) -> String {
    let suffix = &Uuid::new_v4().simple().to_string()[..8];

    match pathname.rfind('.') {
        Some(dot_pos) if dot_pos > pathname.rfind('/').map_or(0, |slash| slash + 1) => format!(
            "{}-{}{}",
            &pathname[..dot_pos],
            suffix,
            &pathname[dot_pos..]
        ),
        _ => format!("{}-{}", pathname, suffix),
    }
}

/// Guess an attachment content type from the pathname extension
fn guess_content_type(pathname: &str) -> &'static str {
    let file_name = pathname.rsplit('/').next().unwrap_or(pathname);
    let extension = match file_name.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "application/octet-stream",
    };

    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "txt" | "log" => "text/plain",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "ics" => "text/calendar",
        "vcf" => "text/vcard",
        "eml" => "message/rfc822",
        "json" => "application/json",
        "xml" => "application/xml",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        _ => "application/octet-stream",
    }
}
