//! In-process blob store.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::domain::ports::{BlobStore, BlobStoreError};

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    content_type: Option<String>,
}

/// Objects held in memory under their path. Clones share the same objects.
#[derive(Debug, Clone)]
pub struct InMemoryBlobStore {
    public_base: String,
    objects: Arc<Mutex<BTreeMap<String, StoredBlob>>>,
}

impl Default for InMemoryBlobStore {
    fn default() -> Self {
        Self::new("memory://documents")
    }
}

impl InMemoryBlobStore {
    /// Store whose public URLs start with `public_base`.
    #[must_use]
    pub fn new(public_base: impl Into<String>) -> Self {
        Self {
            public_base: public_base.into().trim_end_matches('/').to_owned(),
            objects: Arc::default(),
        }
    }

    /// Stored paths, sorted.
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    /// Bytes and content type stored at `path`.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<(Vec<u8>, Option<String>)> {
        self.lock()
            .get(path)
            .map(|blob| (blob.bytes.clone(), blob.content_type.clone()))
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, StoredBlob>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<String, BlobStoreError> {
        let mut objects = self.lock();
        if objects.contains_key(path) {
            return Err(BlobStoreError::rejected(format!("object {path} already exists")));
        }
        objects.insert(path.to_owned(), StoredBlob { bytes, content_type });
        Ok(format!("{}/{path}", self.public_base))
    }

    async fn remove(&self, paths: &[String]) -> Result<(), BlobStoreError> {
        let mut objects = self.lock();
        for path in paths {
            objects.remove(path);
        }
        Ok(())
    }
}
