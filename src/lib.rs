//! Blob-created event handler that writes resized thumbnails to a second container.

pub mod api;
pub mod azure;
pub mod blob_url;
pub mod config;
pub mod encoder;
pub mod error;
pub mod events;
pub mod handler;
pub mod storage;
pub mod thumbnail;

pub use config::{EnvSettings, SettingsSource, ThumbnailConfig};
pub use encoder::EncoderChoice;
pub use error::HandlerError;
pub use events::StorageEvent;
pub use handler::{Outcome, ThumbnailHandler, ThumbnailReport};
pub use storage::{BlobStore, MemoryBlobStore, StoreFactory};
