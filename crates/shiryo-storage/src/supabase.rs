//! Supabase-style HTTP object store.
//!
//! Talks to the storage REST surface: objects are uploaded with
//! `POST /storage/v1/object/{bucket}/{key}` (upsert on), fetched from the
//! same path, and shared through the sign endpoint. Transient 5xx
//! responses are retried with backoff.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use shiryo_core::ports::{BlobError, BlobStorePort};

/// Connection settings for the HTTP store.
#[derive(Clone, Debug)]
pub struct SupabaseConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub base_url: String,
    /// Service-role key with storage permissions.
    pub api_key: String,
    /// Bucket objects land in.
    pub bucket: String,
    /// Attempts per request, including the first.
    pub max_retries: u8,
    /// Base delay between retries.
    pub retry_base_delay: Duration,
}

impl SupabaseConfig {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            bucket: bucket.into(),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
        }
    }
}

/// HTTP-backed object store.
pub struct SupabaseStore {
    client: reqwest::Client,
    config: SupabaseConfig,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseStore {
    /// Build a store with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(config: SupabaseConfig) -> Result<Self, BlobError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn object_url(&self, key: &str) -> String {
        // Reads may hand back the storage key `put` returned; strip the
        // bucket prefix so both spellings address the same object.
        let key = key
            .strip_prefix(&format!("{}/", self.config.bucket))
            .unwrap_or(key);
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bucket,
            key
        )
    }

    async fn send_with_retry(
        &self,
        build: impl Fn() -> reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, BlobError> {
        let mut last_error: Option<BlobError> = None;
        for attempt in 0..self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.config.retry_base_delay * u32::from(attempt)).await;
            }
            match build()
                .header("Authorization", format!("Bearer {}", self.config.api_key))
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    if status.as_u16() == 404 {
                        return Err(BlobError::NotFound(status.to_string()));
                    }
                    let err = BlobError::Backend(format!("storage returned {status}"));
                    if status.is_server_error() {
                        last_error = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_error = Some(BlobError::Backend(e.to_string()));
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| BlobError::Backend("request retries exhausted".to_string())))
    }
}

#[async_trait]
impl BlobStorePort for SupabaseStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str)
        -> Result<String, BlobError> {
        let url = self.object_url(key);
        let body = bytes.to_vec();
        let content_type = content_type.to_string();
        self.send_with_retry(|| {
            self.client
                .post(&url)
                .header("Content-Type", content_type.clone())
                .header("x-upsert", "true")
                .body(body.clone())
        })
        .await?;
        tracing::debug!(key, size = bytes.len(), "uploaded object");
        Ok(format!("{}/{}", self.config.bucket, key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let url = self.object_url(key);
        let response = self.send_with_retry(|| self.client.get(&url)).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn signed_url(&self, key: &str, ttl: Duration) -> Result<String, BlobError> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bucket,
            key
        );
        let expires_in = ttl.as_secs();
        let response = self
            .send_with_retry(|| {
                self.client
                    .post(&url)
                    .json(&serde_json::json!({ "expiresIn": expires_in }))
            })
            .await?;
        let signed: SignedUrlResponse = response
            .json()
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        Ok(format!(
            "{}/storage/v1{}",
            self.config.base_url.trim_end_matches('/'),
            signed.signed_url
        ))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let url = self.object_url(key);
        match self.send_with_retry(|| self.client.delete(&url)).await {
            Ok(_) | Err(BlobError::NotFound(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_urls_include_bucket_and_key() {
        let store = SupabaseStore::new(SupabaseConfig::new(
            "https://proj.supabase.co/",
            "key",
            "university-files",
        ))
        .unwrap();
        assert_eq!(
            store.object_url("task_1/raw/a.pdf"),
            "https://proj.supabase.co/storage/v1/object/university-files/task_1/raw/a.pdf"
        );
    }

    #[test]
    fn signed_url_response_parses() {
        let parsed: SignedUrlResponse =
            serde_json::from_str(r#"{"signedURL":"/object/sign/b/k?token=abc"}"#).unwrap();
        assert_eq!(parsed.signed_url, "/object/sign/b/k?token=abc");
    }
}
