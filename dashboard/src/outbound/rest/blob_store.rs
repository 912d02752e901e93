//! Storage API adapter.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::json;
use tracing::debug;

use super::{RestClient, status_message};
use crate::domain::ports::{BlobStore, BlobStoreError};

const OBJECT_PREFIX: &str = "storage/v1/object";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Blob store backed by one bucket of the hosted storage API.
#[derive(Debug, Clone)]
pub struct RestBlobStore {
    client: RestClient,
    bucket: String,
}

impl RestBlobStore {
    /// Adapter for `bucket`, sharing `client`'s session.
    #[must_use]
    pub fn new(client: RestClient, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Public URL of the object at `path`.
    #[must_use]
    pub fn public_url(&self, path: &str) -> String {
        self.client
            .endpoint(&[OBJECT_PREFIX, "public", &self.bucket, path])
            .to_string()
    }
}

#[async_trait]
impl BlobStore for RestBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String, BlobStoreError> {
        let url = self.client.endpoint(&[OBJECT_PREFIX, &self.bucket, path]);
        let size = bytes.len();
        let response = self
            .client
            .authorize(self.client.http().post(url))
            .header(
                reqwest::header::CONTENT_TYPE,
                content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE),
            )
            .body(bytes)
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.map_err(map_transport_error)?;
            return Err(map_status_error(status, body.as_ref()));
        }
        debug!(bucket = %self.bucket, path, size, "object uploaded");
        Ok(self.public_url(path))
    }

    async fn remove(&self, paths: &[String]) -> Result<(), BlobStoreError> {
        if paths.is_empty() {
            return Ok(());
        }
        let url = self.client.endpoint(&[OBJECT_PREFIX, &self.bucket]);
        let response = self
            .client
            .authorize(self.client.http().delete(url))
            .json(&json!({ "prefixes": paths }))
            .send()
            .await
            .map_err(map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.map_err(map_transport_error)?;
            return Err(map_status_error(status, body.as_ref()));
        }
        debug!(bucket = %self.bucket, count = paths.len(), "objects removed");
        Ok(())
    }
}

fn map_transport_error(error: reqwest::Error) -> BlobStoreError {
    BlobStoreError::connection(error.to_string())
}

fn map_status_error(status: StatusCode, body: &[u8]) -> BlobStoreError {
    let message = status_message(status, body);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        BlobStoreError::connection(message)
    } else {
        BlobStoreError::rejected(message)
    }
}
