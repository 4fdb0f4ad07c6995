use thiserror::Error;

use crate::blob_url::ObjectUrlError;
use crate::config::ConfigError;
use crate::storage::StorageError;
use crate::thumbnail::{DimensionError, ThumbnailError};

/// Fatal outcome of one invocation. Skips are not errors; see `Outcome`.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("unreadable event payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error(transparent)]
    ObjectUrl(#[from] ObjectUrlError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("{0}")]
    Image(#[source] ThumbnailError),
    #[error("thumbnail precondition failed: {0}")]
    Dimensions(#[source] DimensionError),
    #[error("thumbnail worker stopped: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

impl From<ThumbnailError> for HandlerError {
    fn from(e: ThumbnailError) -> Self {
        match e {
            ThumbnailError::Dimensions(d) => Self::Dimensions(d),
            other => Self::Image(other),
        }
    }
}

impl HandlerError {
    /// Short machine-readable category used in webhook responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "configuration",
            Self::Payload(_) => "payload",
            Self::ObjectUrl(_) => "object_url",
            Self::Storage(_) => "storage",
            Self::Image(ThumbnailError::Encode(_)) => "encode",
            Self::Image(_) => "decode",
            Self::Dimensions(_) => "precondition",
            Self::Worker(_) => "internal",
        }
    }
}
