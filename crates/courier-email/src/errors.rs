//! Error types for the mail service

use thiserror::Error;
use uuid::Uuid;

use courier_entities::types::JobStatus;

#[derive(Error, Debug)]
pub enum EmailError {
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),

    #[error("Label not found: {0}")]
    LabelNotFound(i32),

    #[error("Template not found: {0}")]
    TemplateNotFound(i32),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited by transport")]
    RateLimited { retry_after: Option<u64> },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Attachment error: {0}")]
    Attachment(String),

    #[error("Payload error: {0}")]
    Payload(String),

    #[error("Job {job_id} is {status}, expected {expected}")]
    InvalidState {
        job_id: Uuid,
        status: JobStatus,
        expected: JobStatus,
    },

    #[error("Job {job_id} used all {attempts} delivery attempts")]
    RetryBudgetExhausted { job_id: Uuid, attempts: i32 },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for EmailError {
    fn from(err: serde_json::Error) -> Self {
        EmailError::Serialization(err.to_string())
    }
}

impl EmailError {
    /// Transient errors are retried without consuming a delivery attempt
    pub fn is_transient(&self) -> bool {
        matches!(self, EmailError::RateLimited { .. })
    }

    /// Seconds the transport asked us to wait, when it said
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            EmailError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}
