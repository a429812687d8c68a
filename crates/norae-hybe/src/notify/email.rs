use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Outbound email in the shape the Resend API accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub html: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<EmailAttachment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailAttachment {
    pub filename: String,
    /// Base64-encoded file content.
    pub content: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeliveryReceipt {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("email provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("email provider unreachable: {0}")]
    Transport(String),
}

/// Delivery seam so the registration flow can be exercised without a provider.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, MailError>;
}

/// Resend HTTP client. Each message is posted once; there are no retries.
#[derive(Clone)]
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl ResendMailer {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl std::fmt::Debug for ResendMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResendMailer")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, message: &EmailMessage) -> Result<DeliveryReceipt, MailError> {
        debug!(
            subject = %message.subject,
            attachments = message.attachments.len(),
            "posting email to resend"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(message)
            .send()
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| MailError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}
