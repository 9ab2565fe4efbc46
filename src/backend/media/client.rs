//! Object Storage Client
//!
//! Uploads media to an S3-style bucket over plain HTTP: `PUT` stores an
//! object under the configured base URL and `DELETE` removes it again.

use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::shared::config::MediaConfig;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("upload is {size} bytes; the limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("upload is empty")]
    Empty,

    #[error("URL is not managed by this media store: {0}")]
    ForeignUrl(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("object storage returned {status}: {body}")]
    Rejected { status: u16, body: String },
}

impl From<MediaError> for BackendError {
    fn from(err: MediaError) -> Self {
        match err {
            MediaError::TooLarge { .. } | MediaError::Empty => BackendError::invalid("file", err.to_string()),
            MediaError::ForeignUrl(_) => BackendError::invalid("mediaUrl", err.to_string()),
            MediaError::Network(_) | MediaError::Rejected { .. } => {
                tracing::error!("[Media] object storage failure: {}", err);
                BackendError::upstream("Media storage is unavailable")
            }
        }
    }
}

/// Keep object keys URL-safe
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches('.').is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[derive(Clone, Debug)]
pub struct MediaClient {
    client: Client,
    config: MediaConfig,
}

impl MediaClient {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Store `body` and return the public URL of the new object
    pub async fn upload(&self, file_name: &str, content_type: &str, body: Bytes) -> Result<String, MediaError> {
        if body.is_empty() {
            return Err(MediaError::Empty);
        }
        if body.len() > self.config.max_upload_bytes {
            return Err(MediaError::TooLarge {
                size: body.len(),
                limit: self.config.max_upload_bytes,
            });
        }

        let url = format!("{}/{}-{}", self.base_url(), Uuid::new_v4(), sanitize_file_name(file_name));
        let size = body.len();

        let mut request = self
            .client
            .put(&url)
            .header("Content-Type", content_type)
            .body(body);
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| MediaError::Network(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MediaError::Rejected { status, body });
        }

        tracing::info!("[Media] uploaded {} ({} bytes)", url, size);
        Ok(url)
    }

    /// Remove an object previously returned by [`upload`](Self::upload)
    pub async fn delete(&self, url: &str) -> Result<(), MediaError> {
        if !url.starts_with(&format!("{}/", self.base_url())) {
            return Err(MediaError::ForeignUrl(url.to_string()));
        }

        let mut request = self.client.delete(url);
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }
        let response = request
            .send()
            .await
            .map_err(|e| MediaError::Network(e.to_string()))?;

        // Already gone is fine
        if response.status().is_success() || response.status().as_u16() == 404 {
            tracing::info!("[Media] deleted {}", url);
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            Err(MediaError::Rejected { status, body })
        }
    }
}
