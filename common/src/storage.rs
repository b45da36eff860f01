//! Object storage used for voice message audio.
//!
//! The REST layout follows the storage API of the backend-as-a-service:
//! uploads go to `POST {base}/storage/v1/object/{bucket}/{key}` and public
//! objects are served from `{base}/storage/v1/object/public/{bucket}/{key}`.

use async_trait::async_trait;
use reqwest::{Client, header};

use crate::{
    env_config::StorageConfig,
    error::{AppError, Res},
};

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn upload(&self, bucket: &str, key: &str, bytes: Vec<u8>, content_type: &str)
    -> Res<()>;

    fn public_url(&self, bucket: &str, key: &str) -> String;
}

#[derive(Clone)]
pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_key: String,
}

impl SupabaseStorage {
    pub fn new(config: &StorageConfig) -> Res<Self> {
        Ok(SupabaseStorage {
            client: Client::builder().timeout(config.timeout).build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
        })
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(
        &self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Res<()> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, key);
        log::debug!("Uploading {} bytes to {}", bytes.len(), url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.service_key)
            .header(header::CONTENT_TYPE, content_type)
            .body(bytes)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream(format!(
                "Upload of {}/{} failed with {}: {}",
                bucket, key, status, body
            )));
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, bucket, key
        )
    }
}
