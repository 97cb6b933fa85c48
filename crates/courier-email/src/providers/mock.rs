//! Mock transport for testing

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use courier_core::OwnerId;

use crate::errors::EmailError;
use crate::providers::{
    AttachmentRef, MailTransport, SendEmailRequest, SendEmailResponse, TransportKind,
};

/// What the mock does for one `send` call
#[derive(Debug, Clone)]
pub enum MockOutcome {
    Sent,
    RateLimited,
    Fail(String),
    Panic,
    /// Sleep before answering `Sent`
    Slow(Duration),
}

/// Mock transport with scripted outcomes
#[derive(Debug, Clone)]
pub struct MockTransport {
    /// Counter for tracking calls
    pub send_count: Arc<AtomicUsize>,
    /// Subjects of every message handed to `send`, in call order
    pub subjects: Arc<Mutex<Vec<String>>>,
    script: Arc<Mutex<VecDeque<MockOutcome>>>,
    fallback: MockOutcome,
    panic_subject: Option<String>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            send_count: Arc::new(AtomicUsize::new(0)),
            subjects: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(Mutex::new(VecDeque::new())),
            fallback: MockOutcome::Sent,
            panic_subject: None,
        }
    }

    /// Outcome used once the script is exhausted
    pub fn with_fallback(mut self, outcome: MockOutcome) -> Self {
        self.fallback = outcome;
        self
    }

    /// Queue an outcome for the next unscripted call
    pub fn then(self, outcome: MockOutcome) -> Self {
        self.script.lock().unwrap().push_back(outcome);
        self
    }

    /// Panic whenever a message with this subject is sent
    pub fn panic_on_subject(mut self, subject: &str) -> Self {
        self.panic_subject = Some(subject.to_string());
        self
    }

    pub fn send_call_count(&self) -> usize {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn sent_subjects(&self) -> Vec<String> {
        self.subjects.lock().unwrap().clone()
    }
}

#[async_trait]
impl MailTransport for MockTransport {
    async fn send(
        &self,
        _owner_id: OwnerId,
        email: &SendEmailRequest,
        _attachments: &[AttachmentRef],
    ) -> Result<SendEmailResponse, EmailError> {
        let call = self.send_count.fetch_add(1, Ordering::SeqCst);
        self.subjects.lock().unwrap().push(email.subject.clone());

        if self.panic_subject.as_deref() == Some(email.subject.as_str()) {
            panic!("mock transport exploded on {}", email.subject);
        }

        let outcome = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match outcome {
            MockOutcome::Sent => Ok(SendEmailResponse {
                message_id: format!("mock-{}", call + 1),
            }),
            MockOutcome::RateLimited => Err(EmailError::RateLimited { retry_after: None }),
            MockOutcome::Fail(reason) => Err(EmailError::Transport(reason)),
            MockOutcome::Panic => panic!("mock transport exploded"),
            MockOutcome::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(SendEmailResponse {
                    message_id: format!("mock-{}", call + 1),
                })
            }
        }
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Capture
    }
}
