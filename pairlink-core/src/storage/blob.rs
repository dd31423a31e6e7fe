//! Blob store abstraction for credential archives

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::error::BlobStoreError;

/// Remote object storage accepting whole-object uploads
///
/// Uploads are upserts: a second upload under the same key replaces the first.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` under `key`, returning the stored object path
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobStoreError>;
}

/// Blob store writing objects into a local directory
pub struct LocalBlobStore {
    dir: PathBuf,
}

impl LocalBlobStore {
    /// Create a store writing into `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BlobStoreError> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(BlobStoreError::Rejected {
                status: 400,
                message: format!("invalid object key: {key}"),
            });
        }
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(key);
        fs::write(&path, bytes).await?;
        Ok(path.display().to_string())
    }
}

/// Blob store that refuses every upload
///
/// Selected when no storage backend is configured; the uploader logs the
/// refusal like any other failure.
#[derive(Debug, Default)]
pub struct DisabledBlobStore;

#[async_trait]
impl BlobStore for DisabledBlobStore {
    async fn upload(
        &self,
        _key: &str,
        _bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, BlobStoreError> {
        Err(BlobStoreError::Disabled)
    }
}

/// A stored object in [`MemoryBlobStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// In-memory blob store, mostly for tests
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, StoredBlob>>,
    uploads: RwLock<Vec<String>>,
    reject: AtomicBool,
}

impl MemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later upload fail with a rejection
    pub fn reject_uploads(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    /// Fetch a stored object
    pub async fn get(&self, key: &str) -> Option<StoredBlob> {
        self.objects.read().await.get(key).cloned()
    }

    /// Keys of every accepted upload, in order (repeats included)
    pub async fn upload_log(&self) -> Vec<String> {
        self.uploads.read().await.clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, BlobStoreError> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(BlobStoreError::Rejected {
                status: 403,
                message: "uploads rejected".to_string(),
            });
        }
        self.objects.write().await.insert(
            key.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        self.uploads.write().await.push(key.to_string());
        Ok(key.to_string())
    }
}
