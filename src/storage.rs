use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use thiserror::Error;

use crate::config::{ConfigError, ThumbnailConfig};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob {container}/{name} not found")]
    NotFound { container: String, name: String },
    #[error("storage request for {container}/{name} failed with status {status}: {body}")]
    Status {
        container: String,
        name: String,
        status: u16,
        body: String,
    },
    #[error("storage transport error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid storage credential: {0}")]
    Credential(String),
}

pub type BlobStream = BoxStream<'static, Result<Bytes, StorageError>>;

/// Minimal object-store surface the handler needs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Open a read stream over an existing blob.
    async fn open_read(&self, container: &str, name: &str) -> Result<BlobStream, StorageError>;

    /// Write `data` under `name`, replacing any existing blob.
    async fn upload(&self, container: &str, name: &str, data: Bytes, content_type: &str) -> Result<(), StorageError>;

    fn name(&self) -> &'static str;
}

/// Builds a store from the credential read for the current invocation.
pub trait StoreFactory: Send + Sync {
    fn connect(&self, config: &ThumbnailConfig) -> Result<Arc<dyn BlobStore>, ConfigError>;
}

/// Drain a blob stream into one buffer.
pub async fn read_to_end(mut stream: BlobStream) -> Result<Vec<u8>, StorageError> {
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Bytes,
    pub content_type: String,
}

/// In-process store keyed by `(container, name)`; also its own factory.
#[derive(Clone, Default)]
pub struct MemoryBlobStore {
    blobs: Arc<Mutex<HashMap<(String, String), StoredBlob>>>,
    uploads: Arc<Mutex<u64>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, container: &str, name: &str, data: impl Into<Bytes>, content_type: &str) {
        let blob = StoredBlob { data: data.into(), content_type: content_type.to_string() };
        self.lock().insert((container.to_string(), name.to_string()), blob);
    }

    pub fn get(&self, container: &str, name: &str) -> Option<StoredBlob> {
        self.lock().get(&(container.to_string(), name.to_string())).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of successful uploads since creation.
    pub fn upload_count(&self) -> u64 {
        *self.uploads.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), StoredBlob>> {
        self.blobs.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn open_read(&self, container: &str, name: &str) -> Result<BlobStream, StorageError> {
        let blob = self.get(container, name).ok_or_else(|| StorageError::NotFound {
            container: container.to_string(),
            name: name.to_string(),
        })?;
        // Hand the data out in small chunks like a network body would arrive.
        let chunks: Vec<Result<Bytes, StorageError>> = blob
            .data
            .chunks(8 * 1024)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();
        Ok(stream::iter(chunks).boxed())
    }

    async fn upload(&self, container: &str, name: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        self.insert(container, name, data, content_type);
        *self.uploads.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

impl StoreFactory for MemoryBlobStore {
    fn connect(&self, _config: &ThumbnailConfig) -> Result<Arc<dyn BlobStore>, ConfigError> {
        Ok(Arc::new(self.clone()))
    }
}
