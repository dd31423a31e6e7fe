//! Supabase Storage blob store

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;

use super::blob::BlobStore;
use crate::error::BlobStoreError;

/// Connection settings for a Supabase Storage bucket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: String,
    /// API key sent as both `apikey` and bearer token
    pub key: String,
    /// Target bucket
    pub bucket: String,
}

/// Uploads objects through the Supabase Storage REST API
pub struct SupabaseStorage {
    config: SupabaseConfig,
    http_client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(rename = "Key")]
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl SupabaseStorage {
    /// Create a new client for the configured bucket
    pub fn new(config: SupabaseConfig) -> Self {
        Self {
            config,
            http_client: reqwest::Client::new(),
        }
    }

    /// Endpoint for an object key
    pub fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.url.trim_end_matches('/'),
            self.config.bucket,
            key
        )
    }
}

#[async_trait]
impl BlobStore for SupabaseStorage {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobStoreError> {
        let url = self.object_url(key);
        debug!("Uploading {} bytes to {}", bytes.len(), url);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.config.key)
            .header("apikey", &self.config.key)
            .header("x-upsert", "true")
            .header(CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message.or(e.error))
                .unwrap_or(body);
            return Err(BlobStoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let stored = response
            .json::<UploadResponse>()
            .await
            .ok()
            .and_then(|r| r.key)
            .unwrap_or_else(|| format!("{}/{}", self.config.bucket, key));
        Ok(stored)
    }
}
