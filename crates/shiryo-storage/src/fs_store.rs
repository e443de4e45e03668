//! Filesystem-backed object store.
//!
//! Lays objects out under a root directory using the blob key as the
//! relative path. Storage keys are reported as `{bucket}/{key}` so catalog
//! rows look the same regardless of which store produced them.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

use shiryo_core::ports::{BlobError, BlobStorePort};

/// Object store rooted at a local directory.
pub struct FsObjectStore {
    root: PathBuf,
    bucket: String,
}

impl FsObjectStore {
    /// Default logical bucket name, mirroring the production store.
    pub const DEFAULT_BUCKET: &'static str = "university-files";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            bucket: Self::DEFAULT_BUCKET.to_string(),
        }
    }

    #[must_use]
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, BlobError> {
        // Reads may hand back the storage key `put` returned; strip the
        // bucket prefix so both spellings address the same object.
        let key = key
            .strip_prefix(&format!("{}/", self.bucket))
            .unwrap_or(key);
        // Keys are forward-slash paths; refuse anything that could escape
        // the root.
        if key.is_empty()
            || key.starts_with('/')
            || key.split('/').any(|seg| seg.is_empty() || seg == "..")
        {
            return Err(BlobError::Rejected(format!("invalid key: {key:?}")));
        }
        Ok(key.split('/').fold(self.root.clone(), |p, seg| p.join(seg)))
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }

    /// The on-disk path an object key maps to.
    pub fn path_for(&self, key: &str) -> Result<PathBuf, BlobError> {
        self.resolve(key)
    }
}

#[async_trait]
impl BlobStorePort for FsObjectStore {
    async fn put(
        &self,
        key: &str,
        bytes: &[u8],
        _content_type: &str,
    ) -> Result<String, BlobError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::Backend(e.to_string()))?;
        }
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| BlobError::Backend(e.to_string()))?;
        tracing::debug!(key, size = bytes.len(), "stored object");
        Ok(self.storage_key(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.resolve(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(BlobError::NotFound(key.to_string()))
            }
            Err(e) => Err(BlobError::Backend(e.to_string())),
        }
    }

    async fn signed_url(&self, key: &str, _ttl: Duration) -> Result<String, BlobError> {
        // Local objects need no signature; hand back a file URL.
        let path = self.resolve(key)?;
        if !path.exists() {
            return Err(BlobError::NotFound(key.to_string()));
        }
        Ok(format!("file://{}", path.display()))
    }

    async fn delete(&self, key: &str) -> Result<(), BlobError> {
        let path = self.resolve(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(BlobError::Backend(e.to_string())),
        }
    }
}

/// Convert a stored `{bucket}/{key}` back into the object key.
#[must_use]
pub fn key_from_storage_key<'a>(storage_key: &'a str, bucket: &str) -> &'a str {
    storage_key
        .strip_prefix(bucket)
        .and_then(|rest| rest.strip_prefix('/'))
        .unwrap_or(storage_key)
}

impl FsObjectStore {
    /// The configured bucket name.
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// The root directory objects live under.
    pub fn root(&self) -> &Path {
        &self.root
    }
}
