//! Upload backend library for voxclip.
//!
//! This crate provides a trait-based abstraction for shipping a finished
//! recording somewhere, with an implementation that posts it as a multipart
//! form to an HTTP endpoint.

mod http;

use async_trait::async_trait;
pub use bytes::Bytes;
pub use http::{HttpUploadConfig, HttpUploader};
use thiserror::Error;

/// Errors that can occur during upload.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("No upload endpoint configured")]
    NoEndpoint,

    #[error("Invalid upload request: {0}")]
    InvalidRequest(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

/// Result type for upload operations.
pub type Result<T> = std::result::Result<T, UploadError>;

/// What the endpoint answered with on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub status: u16,
    pub body: String,
}

/// Trait for upload backends.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Upload a recording in a single attempt.
    ///
    /// # Arguments
    /// * `audio` - Encoded recording as reference-counted bytes.
    /// * `mime_type` - Content type of `audio`, e.g. "audio/wav"
    /// * `filename` - File name reported to the endpoint
    async fn upload(&self, audio: Bytes, mime_type: &str, filename: &str) -> Result<UploadReceipt>;

    /// Returns the name of this uploader for logging/debugging.
    fn name(&self) -> &str;
}
