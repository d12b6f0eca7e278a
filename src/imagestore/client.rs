//! HTTP client for the remote image store.
//!
//! The store accepts multipart uploads and answers with a JSON envelope
//! carrying the stored-object id and a list of variant URLs; the first
//! variant is the canonical public URL. Deletion is a plain authenticated
//! DELETE by stored-object id.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

/// Default timeout for requests to the image store.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while talking to the image store.
///
/// The variants are deliberately distinguishable so callers can decide
/// between retrying (transient) and dropping (structurally invalid).
#[derive(Debug, Error)]
pub enum ImageStoreError {
    /// Request never produced an HTTP response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store answered with a non-success HTTP status.
    #[error("image store returned status {code}: {message}")]
    Status { code: u16, message: String },

    /// The response body could not be decoded.
    #[error("failed to decode image store response: {0}")]
    Decode(String),

    /// The store reported a failure inside a well-formed envelope.
    #[error("image store rejected the request: {0}")]
    Rejected(String),

    /// A successful envelope carried no variant URL.
    #[error("image store response contained no variant URL")]
    MissingVariant,

    /// Missing endpoint configuration.
    #[error("IMAGE_STORE_ENDPOINT environment variable not set")]
    MissingEndpoint,

    /// Missing API key configuration.
    #[error("IMAGE_STORE_API_KEY environment variable not set")]
    MissingApiKey,
}

impl ImageStoreError {
    /// Whether a retry has a reasonable chance of succeeding.
    ///
    /// Transport failures and server-side statuses are transient; decode
    /// errors, rejections and client-side statuses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ImageStoreError::Transport(_) => true,
            ImageStoreError::Status { code, .. } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

/// A successfully stored image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    /// External stored-object identifier.
    pub id: String,
    /// Canonical public URL (the first variant).
    pub url: String,
}

/// Remote object storage for movie images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Uploads raw image bytes under the given filename.
    async fn upload(&self, image: &[u8], filename: &str) -> Result<StoredImage, ImageStoreError>;

    /// Deletes a stored object by its external id.
    async fn delete(&self, external_id: &str) -> Result<(), ImageStoreError>;
}

/// Response envelope returned by the store's upload endpoint.
#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    success: bool,
    #[serde(default)]
    result: Option<UploadResult>,
    #[serde(default)]
    errors: Vec<RemoteError>,
    #[serde(default)]
    #[allow(dead_code)] // Kept for complete envelope deserialization
    messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct UploadResult {
    id: String,
    #[serde(default)]
    variants: Vec<String>,
    #[serde(default)]
    #[allow(dead_code)]
    filename: String,
    #[serde(default)]
    #[allow(dead_code)]
    uploaded: String,
    #[serde(default, rename = "requireSignedURLs")]
    #[allow(dead_code)]
    require_signed_urls: bool,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    message: String,
}

/// Client for the remote image store HTTP API.
pub struct ImageStoreClient {
    /// Upload endpoint; deletes go to `{endpoint}/{id}`.
    endpoint: String,
    /// Bearer token for the `Authorization` header.
    api_key: String,
    /// HTTP client for making API requests.
    http_client: Client,
}

impl ImageStoreClient {
    /// Creates a new client with explicit configuration.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            http_client: Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .expect("Failed to build HTTP client"),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads `IMAGE_STORE_ENDPOINT` and `IMAGE_STORE_API_KEY`.
    pub fn from_env() -> Result<Self, ImageStoreError> {
        let endpoint =
            env::var("IMAGE_STORE_ENDPOINT").map_err(|_| ImageStoreError::MissingEndpoint)?;
        let api_key = env::var("IMAGE_STORE_API_KEY").map_err(|_| ImageStoreError::MissingApiKey)?;

        Ok(Self::new(endpoint, api_key))
    }

    /// Returns the configured endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Extracts the stored image from a raw upload response body.
    fn parse_upload_body(body: &str) -> Result<StoredImage, ImageStoreError> {
        let envelope: UploadEnvelope =
            serde_json::from_str(body).map_err(|e| ImageStoreError::Decode(e.to_string()))?;

        if !envelope.success {
            let messages: Vec<String> = envelope.errors.into_iter().map(|e| e.message).collect();
            return Err(ImageStoreError::Rejected(messages.join("; ")));
        }

        let result = envelope
            .result
            .ok_or_else(|| ImageStoreError::Decode("success envelope without result".to_string()))?;

        // An empty variant list on success is a protocol violation, not an
        // index-out-of-range.
        let url = result
            .variants
            .into_iter()
            .next()
            .ok_or(ImageStoreError::MissingVariant)?;

        Ok(StoredImage { id: result.id, url })
    }
}

#[async_trait]
impl ImageStore for ImageStoreClient {
    async fn upload(&self, image: &[u8], filename: &str) -> Result<StoredImage, ImageStoreError> {
        let part = Part::bytes(image.to_vec()).file_name(filename.to_string());
        let form = Form::new().part("file", part);

        let response = self
            .http_client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ImageStoreError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ImageStoreError::Transport(e.to_string()))?;

        if !status.is_success() {
            return Err(ImageStoreError::Status {
                code: status.as_u16(),
                message: body,
            });
        }

        Self::parse_upload_body(&body)
    }

    async fn delete(&self, external_id: &str) -> Result<(), ImageStoreError> {
        let url = format!("{}/{}", self.endpoint.trim_end_matches('/'), external_id);

        let response = self
            .http_client
            .delete(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ImageStoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error response".to_string());
            return Err(ImageStoreError::Status {
                code: status.as_u16(),
                message: body,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_upload_body_success() {
        let body = r#"{
            "success": true,
            "result": {
                "id": "X",
                "variants": ["https://example/X"],
                "filename": "movie_1.jpg",
                "uploaded": "2024-01-01T00:00:00Z",
                "requireSignedURLs": false
            },
            "errors": [],
            "messages": []
        }"#;

        let stored = ImageStoreClient::parse_upload_body(body).expect("should parse");
        assert_eq!(stored.id, "X");
        assert_eq!(stored.url, "https://example/X");
    }

    #[test]
    fn test_parse_upload_body_empty_variants_is_error() {
        let body = r#"{
            "success": true,
            "result": {"id": "X", "variants": []},
            "errors": []
        }"#;

        let err = ImageStoreClient::parse_upload_body(body).expect_err("should fail");
        assert!(matches!(err, ImageStoreError::MissingVariant));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_parse_upload_body_remote_rejection() {
        let body = r#"{
            "success": false,
            "errors": [{"message": "image too large"}, {"message": "bad format"}]
        }"#;

        let err = ImageStoreClient::parse_upload_body(body).expect_err("should fail");
        match err {
            ImageStoreError::Rejected(message) => {
                assert!(message.contains("image too large"));
                assert!(message.contains("bad format"));
            }
            other => panic!("expected Rejected, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_upload_body_malformed_json() {
        let err = ImageStoreClient::parse_upload_body("not json").expect_err("should fail");
        assert!(matches!(err, ImageStoreError::Decode(_)));
    }

    #[test]
    fn test_transient_classification() {
        assert!(ImageStoreError::Transport("connection reset".to_string()).is_transient());
        assert!(ImageStoreError::Status {
            code: 500,
            message: String::new()
        }
        .is_transient());
        assert!(ImageStoreError::Status {
            code: 429,
            message: String::new()
        }
        .is_transient());
        assert!(!ImageStoreError::Status {
            code: 403,
            message: String::new()
        }
        .is_transient());
        assert!(!ImageStoreError::MissingVariant.is_transient());
        assert!(!ImageStoreError::Rejected("bad".to_string()).is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = ImageStoreError::Status {
            code: 502,
            message: "bad gateway".to_string(),
        };
        assert!(err.to_string().contains("502"));

        let err = ImageStoreError::MissingVariant;
        assert!(err.to_string().contains("variant"));
    }
}
