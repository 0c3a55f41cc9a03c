//! Multipart HTTP upload backend.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::{Result, UploadError, UploadReceipt, Uploader};

/// Name of the multipart field carrying the recording.
const FILE_FIELD: &str = "file";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for the HTTP upload client.
#[derive(Debug, Clone)]
pub struct HttpUploadConfig {
    /// Endpoint receiving the POST
    pub endpoint: String,

    /// Request timeout (defaults to 30 seconds)
    pub timeout: Option<Duration>,
}

impl HttpUploadConfig {
    /// Create a new config for the given endpoint.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: None,
        }
    }

    /// Set the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the timeout, using default if not set.
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_TIMEOUT)
    }
}

/// Posts recordings as `multipart/form-data`.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: reqwest::Client,
    config: HttpUploadConfig,
}

impl HttpUploader {
    /// Create a new uploader with the given configuration.
    pub fn new(config: HttpUploadConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self { client, config })
    }

    /// Create an uploader from just an endpoint with default settings.
    pub fn from_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        Self::new(HttpUploadConfig::new(endpoint))
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }
}

#[async_trait]
impl Uploader for HttpUploader {
    async fn upload(&self, audio: Bytes, mime_type: &str, filename: &str) -> Result<UploadReceipt> {
        debug!(
            endpoint = %self.config.endpoint,
            audio_bytes = audio.len(),
            mime_type,
            filename,
            "Sending upload request"
        );

        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime_type)
            .map_err(|e| UploadError::InvalidRequest(e.to_string()))?;
        let form = reqwest::multipart::Form::new().part(FILE_FIELD, part);

        let response = self
            .client
            .post(&self.config.endpoint)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(UploadError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(UploadReceipt {
            status: status.as_u16(),
            body,
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}
