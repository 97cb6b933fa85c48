//! Mail transport trait definitions

use std::collections::HashMap;

use async_trait::async_trait;
use courier_core::OwnerId;
use serde::{Deserialize, Serialize};

use crate::errors::EmailError;

/// Supported transport types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// JSON-over-HTTP mail relay
    Http,
    /// Log-only transport used in development
    Capture,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Http => write!(f, "http"),
            TransportKind::Capture => write!(f, "capture"),
        }
    }
}

/// Request to send an email
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendEmailRequest {
    /// Sender email address
    pub from: String,
    /// Sender display name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_name: Option<String>,
    /// Recipient email addresses
    pub to: Vec<String>,
    /// CC recipients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cc: Option<Vec<String>>,
    /// BCC recipients
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bcc: Option<Vec<String>>,
    /// Reply-to address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<String>,
    /// Email subject
    pub subject: String,
    /// HTML body content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Plain text body content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Custom headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl SendEmailRequest {
    /// Checks performed before a message is accepted into the queue
    pub fn validate(&self) -> Result<(), EmailError> {
        if self.from.trim().is_empty() {
            return Err(EmailError::Validation(
                "Sender address is required".to_string(),
            ));
        }
        if !self.from.contains('@') {
            return Err(EmailError::Validation(format!(
                "Invalid sender address: {}",
                self.from
            )));
        }
        if self.to.is_empty() {
            return Err(EmailError::Validation(
                "At least one recipient is required".to_string(),
            ));
        }
        let recipients = self
            .to
            .iter()
            .chain(self.cc.iter().flatten())
            .chain(self.bcc.iter().flatten());
        for address in recipients {
            if !address.contains('@') {
                return Err(EmailError::Validation(format!(
                    "Invalid recipient address: {}",
                    address
                )));
            }
        }
        if self.subject.trim().is_empty() {
            return Err(EmailError::Validation("Subject is required".to_string()));
        }
        if self.html.is_none() && self.text.is_none() {
            return Err(EmailError::Validation(
                "Either html or text body is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Reference to an attachment stored in the owner's blob storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    /// Path of the object relative to the owner's storage root
    pub pathname: String,
    /// File name presented to the recipient
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
}

/// Response from sending an email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendEmailResponse {
    /// Transport's message ID
    pub message_id: String,
}

/// Transport trait for abstracting the final hop of delivery
///
/// Implementations classify their failures: [`EmailError::RateLimited`] is
/// retried without consuming an attempt, every other error is permanent.
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send an email on behalf of `owner_id`
    async fn send(
        &self,
        owner_id: OwnerId,
        email: &SendEmailRequest,
        attachments: &[AttachmentRef],
    ) -> Result<SendEmailResponse, EmailError>;

    /// Get the transport type
    fn kind(&self) -> TransportKind;
}
