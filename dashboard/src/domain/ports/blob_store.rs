//! Port for the hosted backend's file storage.

use async_trait::async_trait;

use super::define_port_error;

define_port_error! {
    /// Errors raised by blob store adapters.
    pub enum BlobStoreError {
        /// Storage could not be reached.
        Connection { message: String } =>
            backend_transient, "blob store connection failed: {message}",
        /// Storage refused the request (quota, duplicate path, policy).
        Rejected { message: String } =>
            backend_permanent, "blob store rejected the request: {message}",
    }
}

/// Port for storing uploaded files.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path` and return the object's public URL.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String, BlobStoreError>;

    /// Remove the objects at `paths`. Missing objects are not an error.
    async fn remove(&self, paths: &[String]) -> Result<(), BlobStoreError>;
}

/// Fixture store that accepts everything and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct FixtureBlobStore;

#[async_trait]
impl BlobStore for FixtureBlobStore {
    async fn upload(
        &self,
        path: &str,
        _bytes: Vec<u8>,
        _content_type: Option<String>,
    ) -> Result<String, BlobStoreError> {
        Ok(format!("fixture://documents/{path}"))
    }

    async fn remove(&self, _paths: &[String]) -> Result<(), BlobStoreError> {
        Ok(())
    }
}
