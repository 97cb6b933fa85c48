//! Capture transport: logs messages instead of delivering them

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use courier_core::OwnerId;
use tracing::info;
use uuid::Uuid;

use super::traits::{
    AttachmentRef, MailTransport, SendEmailRequest, SendEmailResponse, TransportKind,
};
use crate::errors::EmailError;

/// Transport used when no relay is configured
#[derive(Debug, Default)]
pub struct CaptureTransport {
    captured: AtomicUsize,
}

impl CaptureTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages captured since startup
    pub fn captured_count(&self) -> usize {
        self.captured.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for CaptureTransport {
    async fn send(
        &self,
        owner_id: OwnerId,
        email: &SendEmailRequest,
        attachments: &[AttachmentRef],
    ) -> Result<SendEmailResponse, EmailError> {
        let message_id = format!("captured-{}", Uuid::new_v4());
        self.captured.fetch_add(1, Ordering::SeqCst);

        info!(
            owner_id,
            message_id = %message_id,
            from = %email.from,
            to = ?email.to,
            attachments = attachments.len(),
            "Captured email: {}",
            email.subject
        );

        Ok(SendEmailResponse { message_id })
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Capture
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_capture_always_succeeds() {
        let transport = CaptureTransport::new();
        let email = SendEmailRequest {
            from: "noreply@example.com".to_string(),
            from_name: None,
            to: vec!["ops@example.com".to_string()],
            cc: None,
            bcc: None,
            reply_to: None,
            subject: "Nightly digest".to_string(),
            html: None,
            text: Some("nothing new".to_string()),
            headers: None,
        };

        let first = transport.send(3, &email, &[]).await.unwrap();
        let second = transport.send(3, &email, &[]).await.unwrap();

        assert!(first.message_id.starts_with("captured-"));
        assert_ne!(first.message_id, second.message_id);
        assert_eq!(transport.captured_count(), 2);
        assert_eq!(transport.kind(), TransportKind::Capture);
    }
}
