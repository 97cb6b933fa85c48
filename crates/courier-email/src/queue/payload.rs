//! Versioned encoding of the job payload
//!
//! Jobs outlive deployments, so the stored JSON carries an explicit
//! `version` tag. A payload that fails to decode is never retried.

use serde::{Deserialize, Serialize};

use crate::errors::EmailError;
use crate::providers::{AttachmentRef, SendEmailRequest};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "version")]
pub enum JobPayload {
    #[serde(rename = "1")]
    V1(SendEmailRequest),
}

impl JobPayload {
    pub fn encode(request: &SendEmailRequest) -> Result<String, EmailError> {
        Ok(serde_json::to_string(&JobPayload::V1(request.clone()))?)
    }

    pub fn decode(raw: &str) -> Result<SendEmailRequest, EmailError> {
        let payload: JobPayload = serde_json::from_str(raw)
            .map_err(|e| EmailError::Payload(format!("Undecodable payload: {}", e)))?;

        match payload {
            JobPayload::V1(request) => Ok(request),
        }
    }
}

/// Attachments are stored as a JSON list, `None` when there are none
pub fn encode_attachments(attachments: &[AttachmentRef]) -> Result<Option<String>, EmailError> {
    if attachments.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(attachments)?))
}

pub fn decode_attachments(raw: Option<&str>) -> Result<Vec<AttachmentRef>, EmailError> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| EmailError::Payload(format!("Undecodable attachments: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> SendEmailRequest {
        SendEmailRequest {
            from: "alice@example.com".to_string(),
            from_name: None,
            to: vec!["bob@example.com".to_string()],
            cc: None,
            bcc: None,
            reply_to: None,
            subject: "Hello".to_string(),
            html: None,
            text: Some("Hi Bob".to_string()),
            headers: None,
        }
    }

    #[test]
    fn test_encoded_payload_carries_version_tag() {
        let raw = JobPayload::encode(&request()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(json["version"], "1");
        assert_eq!(json["subject"], "Hello");
        assert_eq!(JobPayload::decode(&raw).unwrap(), request());
    }

    #[test]
    fn test_unknown_version_is_payload_error() {
        let raw = r#"{"version":"2","from":"a@b.c","to":[],"subject":"x"}"#;
        assert!(matches!(
            JobPayload::decode(raw),
            Err(EmailError::Payload(_))
        ));
    }

    #[test]
    fn test_untagged_payload_is_rejected() {
        let raw = r#"{"from":"a@b.c","to":["d@e.f"],"subject":"x"}"#;
        assert!(JobPayload::decode(raw).is_err());
    }

    #[test]
    fn test_no_attachments_store_nothing() {
        assert_eq!(encode_attachments(&[]).unwrap(), None);
        assert!(decode_attachments(None).unwrap().is_empty());
    }

    #[test]
    fn test_garbled_attachments_are_payload_error() {
        assert!(matches!(
            decode_attachments(Some("{not json")),
            Err(EmailError::Payload(_))
        ));
    }
}
