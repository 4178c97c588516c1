//! Google Cloud Storage backend using the JSON API media upload.
//!
//! Credentials come from `GCS_ACCESS_TOKEN` when set. Otherwise a token is
//! fetched from the GCE metadata server and cached until shortly before it
//! expires.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{MediaError, MediaStore};

const UPLOAD_ENDPOINT: &str = "https://storage.googleapis.com/upload/storage/v1/b";

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the metadata token expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: SecretString,
    refresh_at: Instant,
}

pub struct GcsStore {
    client: reqwest::Client,
    bucket: String,
    public_base_url: String,
    static_token: Option<SecretString>,
    cached: Mutex<Option<CachedToken>>,
}

impl GcsStore {
    #[must_use]
    pub fn new(
        client: reqwest::Client,
        bucket: String,
        public_base_url: String,
        static_token: Option<SecretString>,
    ) -> Self {
        Self {
            client,
            bucket,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            static_token,
            cached: Mutex::new(None),
        }
    }

    fn upload_url(&self, key: &str) -> String {
        format!(
            "{UPLOAD_ENDPOINT}/{}/o?uploadType=media&name={}",
            urlencoding::encode(&self.bucket),
            urlencoding::encode(key)
        )
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{key}", self.public_base_url)
    }

    async fn access_token(&self) -> Result<SecretString, MediaError> {
        if let Some(token) = &self.static_token {
            return Ok(token.clone());
        }

        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| MediaError::Storage(format!("metadata server: {e}")))?;

        if !response.status().is_success() {
            return Err(MediaError::Storage(format!(
                "metadata server returned {}",
                response.status()
            )));
        }

        let token: MetadataToken = response
            .json()
            .await
            .map_err(|e| MediaError::Storage(format!("metadata token: {e}")))?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_REFRESH_MARGIN);
        let value = SecretString::from(token.access_token);
        *cached = Some(CachedToken {
            value: value.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        tracing::debug!(expires_in = token.expires_in, "Fetched GCS access token");
        Ok(value)
    }
}

#[async_trait]
impl MediaStore for GcsStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, MediaError> {
        let token = self.access_token().await?;

        let response = self
            .client
            .post(self.upload_url(key))
            .bearer_auth(token.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await
            .map_err(|e| MediaError::Storage(format!("upload request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, key = %key, body = %message, "GCS upload failed");
            return Err(MediaError::Storage(format!("GCS returned {status}")));
        }

        Ok(self.public_url(key))
    }

    fn name(&self) -> &'static str {
        "gcs"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> GcsStore {
        GcsStore::new(
            reqwest::Client::new(),
            "harvest-media".to_string(),
            "https://cdn.harvest.example/".to_string(),
            Some(SecretString::from("token")),
        )
    }

    #[test]
    fn test_upload_url_encodes_object_name() {
        assert_eq!(
            store().upload_url("products/2026/06/a.png"),
            "https://storage.googleapis.com/upload/storage/v1/b/harvest-media/o?uploadType=media&name=products%2F2026%2F06%2Fa.png"
        );
    }

    #[test]
    fn test_public_url_trims_trailing_slash() {
        assert_eq!(
            store().public_url("banners/2026/01/b.webp"),
            "https://cdn.harvest.example/banners/2026/01/b.webp"
        );
    }

    #[tokio::test]
    async fn test_static_token_skips_metadata_server() {
        let token = store().access_token().await;
        assert!(token.is_ok());
    }
}
