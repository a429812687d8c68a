//! Payment-proof hosting. Uploads are best-effort: callers log failures and carry on.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::ticket::strip_data_uri;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("image host rejected the upload ({status}): {body}")]
    Rejected { status: u16, body: String },
    #[error("image host unreachable: {0}")]
    Transport(String),
    #[error("image host returned an unexpected payload: {0}")]
    Payload(String),
}

#[async_trait]
pub trait ProofUploader: Send + Sync {
    /// Uploads a data URI or bare base64 image and returns its public URL.
    async fn upload(&self, image: &str, name: &str) -> Result<String, UploadError>;
}

#[derive(Debug, Deserialize)]
struct ImgbbEnvelope {
    data: ImgbbImage,
}

#[derive(Debug, Deserialize)]
struct ImgbbImage {
    url: String,
}

/// imgbb v1 upload client.
#[derive(Clone)]
pub struct ImgbbUploader {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl ImgbbUploader {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl std::fmt::Debug for ImgbbUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImgbbUploader")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ProofUploader for ImgbbUploader {
    async fn upload(&self, image: &str, name: &str) -> Result<String, UploadError> {
        let payload = strip_data_uri(image);
        debug!(bytes = payload.len(), name, "uploading payment proof");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .form(&[("image", payload), ("name", name)])
            .send()
            .await
            .map_err(|err| UploadError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| UploadError::Transport(err.to_string()))?;

        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let envelope: ImgbbEnvelope =
            serde_json::from_str(&body).map_err(|err| UploadError::Payload(err.to_string()))?;
        Ok(envelope.data.url)
    }
}
