//! JSON-over-HTTP mail relay transport

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courier_blob::BlobService;
use courier_core::OwnerId;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::traits::{
    AttachmentRef, MailTransport, SendEmailRequest, SendEmailResponse, TransportKind,
};
use crate::errors::EmailError;

/// Connection settings for the mail relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpTransportConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

impl HttpTransportConfig {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            timeout: default_timeout(),
        }
    }
}

/// Transport posting messages to `{base_url}/v1/messages`
pub struct HttpTransport {
    client: Client,
    base_url: String,
    api_key: String,
    blob: Option<Arc<BlobService>>,
}

impl HttpTransport {
    pub fn new(config: &HttpTransportConfig) -> Result<Self, EmailError> {
        if config.base_url.trim().is_empty() {
            return Err(EmailError::Configuration(
                "Transport base URL is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("courier/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EmailError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            blob: None,
        })
    }

    /// Resolve attachments to presigned download URLs through `blob`
    pub fn with_blob_service(mut self, blob: Arc<BlobService>) -> Self {
        self.blob = Some(blob);
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    async fn resolve_attachments(
        &self,
        owner_id: OwnerId,
        attachments: &[AttachmentRef],
    ) -> Result<Vec<RelayAttachment>, EmailError> {
        let mut resolved = Vec::with_capacity(attachments.len());

        for attachment in attachments {
            let url = match &self.blob {
                Some(blob) => Some(
                    blob.presign_get(owner_id, &attachment.pathname, None)
                        .await
                        .map_err(|e| {
                            EmailError::Attachment(format!("{}: {}", attachment.pathname, e))
                        })?,
                ),
                None => None,
            };

            resolved.push(RelayAttachment {
                filename: attachment.filename.clone(),
                pathname: attachment.pathname.clone(),
                content_type: attachment.content_type.clone(),
                size: attachment.size,
                url,
            });
        }

        Ok(resolved)
    }
}

#[derive(Debug, Serialize)]
struct RelayMessage<'a> {
    owner_id: OwnerId,
    #[serde(flatten)]
    email: &'a SendEmailRequest,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    attachments: Vec<RelayAttachment>,
}

#[derive(Debug, Serialize)]
struct RelayAttachment {
    filename: String,
    pathname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    message_id: String,
}

#[async_trait]
impl MailTransport for HttpTransport {
    async fn send(
        &self,
        owner_id: OwnerId,
        email: &SendEmailRequest,
        attachments: &[AttachmentRef],
    ) -> Result<SendEmailResponse, EmailError> {
        debug!("Sending email via relay from: {}", email.from);

        let message = RelayMessage {
            owner_id,
            email,
            attachments: self.resolve_attachments(owner_id, attachments).await?,
        };

        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await
            .map_err(|e| EmailError::Transport(format!("Failed to reach relay: {}", e)))?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(|value| value.trim().parse::<u64>().ok());
            warn!(owner_id, ?retry_after, "Relay rate limited the request");
            return Err(EmailError::RateLimited { retry_after });
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!("Failed to send email via relay ({}): {}", status, body);
            return Err(EmailError::Transport(format!("{}: {}", status, body)));
        }

        let body: RelayResponse = response
            .json()
            .await
            .map_err(|e| EmailError::Transport(format!("Invalid relay response: {}", e)))?;

        Ok(SendEmailResponse {
            message_id: body.message_id,
        })
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Http
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> SendEmailRequest {
        SendEmailRequest {
            from: "alice@example.com".to_string(),
            from_name: None,
            to: vec!["bob@example.com".to_string()],
            cc: None,
            bcc: None,
            reply_to: None,
            subject: "Hello".to_string(),
            html: Some("<p>Hi</p>".to_string()),
            text: None,
            headers: None,
        }
    }

    fn transport(server: &MockServer) -> HttpTransport {
        HttpTransport::new(&HttpTransportConfig::new(server.uri(), "relay-key")).unwrap()
    }

    #[tokio::test]
    async fn test_send_returns_relay_message_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("authorization", "Bearer relay-key"))
            .and(body_partial_json(serde_json::json!({
                "owner_id": 42,
                "from": "alice@example.com",
                "subject": "Hello",
            })))
            .respond_with(
                ResponseTemplate::new(202)
                    .set_body_json(serde_json::json!({ "message_id": "relay-123" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let response = transport(&server).send(42, &request(), &[]).await.unwrap();

        assert_eq!(response.message_id, "relay-123");
    }

    #[tokio::test]
    async fn test_429_is_rate_limited_with_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "120"))
            .mount(&server)
            .await;

        let err = transport(&server).send(1, &request(), &[]).await.unwrap_err();

        assert!(err.is_transient());
        assert!(matches!(
            err,
            EmailError::RateLimited {
                retry_after: Some(120)
            }
        ));
    }

    #[tokio::test]
    async fn test_server_error_is_permanent_and_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(422).set_body_string("mailbox unavailable"))
            .mount(&server)
            .await;

        let err = transport(&server).send(1, &request(), &[]).await.unwrap_err();

        assert!(!err.is_transient());
        let message = err.to_string();
        assert!(message.contains("422"));
        assert!(message.contains("mailbox unavailable"));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_transport_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let err = transport(&server).send(1, &request(), &[]).await.unwrap_err();

        assert!(matches!(err, EmailError::Transport(_)));
    }

    #[tokio::test]
    async fn test_attachments_pass_through_without_blob_service() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(serde_json::json!({
                "attachments": [{ "filename": "nda.pdf", "pathname": "contracts/nda.pdf" }]
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "message_id": "relay-9" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let attachments = vec![AttachmentRef {
            pathname: "contracts/nda.pdf".to_string(),
            filename: "nda.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            size: Some(1024),
        }];

        let response = transport(&server)
            .send(1, &request(), &attachments)
            .await
            .unwrap();

        assert_eq!(response.message_id, "relay-9");
    }

    #[tokio::test]
    async fn test_unreachable_relay_is_permanent() {
        let config = HttpTransportConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            api_key: "k".to_string(),
            timeout: Duration::from_secs(2),
        };
        let err = HttpTransport::new(&config)
            .unwrap()
            .send(1, &request(), &[])
            .await
            .unwrap_err();

        assert!(matches!(err, EmailError::Transport(_)));
    }

    #[test]
    fn test_empty_base_url_is_rejected() {
        let result = HttpTransport::new(&HttpTransportConfig::new("  ", "k"));
        assert!(matches!(result, Err(EmailError::Configuration(_))));
    }

    #[test]
    fn test_messages_url_strips_trailing_slash() {
        let transport =
            HttpTransport::new(&HttpTransportConfig::new("https://relay.test/", "k")).unwrap();
        assert_eq!(transport.messages_url(), "https://relay.test/v1/messages");
        assert_eq!(transport.kind(), TransportKind::Http);
    }
}
