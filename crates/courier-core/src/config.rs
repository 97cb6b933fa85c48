//! Configuration management utilities

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};
use crate::types::DBDateTime;

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

impl DatabaseConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 20,
            min_connections: 1,
        }
    }
}

/// Tunables of the background delivery queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Sleep between two poll cycles
    pub interval: Duration,
    /// Maximum number of jobs dispatched by one poll cycle
    pub batch_size: u64,
    /// Jobs whose `attempts` reached this value are never picked up again
    pub max_attempts: i32,
    /// A `processing` job whose claim is older than this is eligible again
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            batch_size: 5,
            max_attempts: 3,
            visibility_timeout: Duration::from_secs(15 * 60),
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> ServiceResult<()> {
        if self.interval.is_zero() {
            return Err(ServiceError::Configuration {
                message: "queue interval must be greater than zero".to_string(),
            });
        }
        if self.batch_size == 0 {
            return Err(ServiceError::Configuration {
                message: "queue batch size must be at least 1".to_string(),
            });
        }
        if self.max_attempts < 1 {
            return Err(ServiceError::Configuration {
                message: "queue max attempts must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Claims taken at or before the returned instant are considered abandoned.
    pub fn lease_cutoff(&self, now: DBDateTime) -> DBDateTime {
        chrono::Duration::from_std(self.visibility_timeout)
            .ok()
            .and_then(|timeout| now.checked_sub_signed(timeout))
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }
}
