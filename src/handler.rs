//! The blob-created → thumbnail pipeline.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::blob_url::ObjectReference;
use crate::config::{SettingsSource, ThumbnailConfig};
use crate::encoder::{extension_of, EncoderChoice};
use crate::error::HandlerError;
use crate::events::{Gate, StorageEvent};
use crate::storage::{read_to_end, StoreFactory};
use crate::thumbnail::ThumbnailProcessor;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThumbnailReport {
    pub container: String,
    pub name: String,
    pub content_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub source_width: u32,
    pub source_height: u32,
    pub size_bytes: usize,
}

/// How a successful invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    SkippedOperation { operation: String },
    SkippedFormat { url: String, extension: String },
    Thumbnail(ThumbnailReport),
}

pub struct ThumbnailHandler {
    settings: Arc<dyn SettingsSource>,
    stores: Arc<dyn StoreFactory>,
}

impl ThumbnailHandler {
    pub fn new(settings: Arc<dyn SettingsSource>, stores: Arc<dyn StoreFactory>) -> Self {
        Self { settings, stores }
    }

    /// Parse a raw event document and run one invocation for it.
    pub async fn handle_json(&self, raw: &str) -> Result<Outcome, HandlerError> {
        let event = StorageEvent::from_json(raw).map_err(|e| {
            error!(kind = "payload", "{e}");
            HandlerError::Payload(e)
        })?;
        self.handle(&event).await
    }

    /// Run one invocation. Fatal errors are logged here and then returned.
    pub async fn handle(&self, event: &StorageEvent) -> Result<Outcome, HandlerError> {
        let event_id = if event.id.is_empty() { uuid::Uuid::new_v4().to_string() } else { event.id.clone() };
        let span = info_span!("invocation", event_id = %event_id);

        async move {
            info!(payload = %event.data, "event received");
            match self.run(event).await {
                Ok(outcome) => Ok(outcome),
                Err(e) => {
                    error!(kind = e.kind(), "{e}");
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, event: &StorageEvent) -> Result<Outcome, HandlerError> {
        let url = match event.gate()? {
            Gate::Proceed { url } => url,
            Gate::Skip { operation } => {
                info!(%operation, "not a blob creation, nothing to do");
                return Ok(Outcome::SkippedOperation { operation });
            }
        };

        let extension = extension_of(&url);
        let Some(encoder) = EncoderChoice::from_extension(extension) else {
            info!("No encoder support for: {url}");
            return Ok(Outcome::SkippedFormat { extension: extension.to_string(), url });
        };

        let config = ThumbnailConfig::load(self.settings.as_ref())?;
        let store = self.stores.connect(&config)?;

        let reference = ObjectReference::parse(&url)?;
        if reference.container != config.images_container {
            warn!(
                url_container = %reference.container,
                configured = %config.images_container,
                "event container differs from configured source container"
            );
        }
        let name = reference.name;

        let source = read_to_end(store.open_read(&config.images_container, &name).await?).await?;

        let processor = ThumbnailProcessor::new(config.thumbnail_width, encoder);
        let thumb = tokio::task::spawn_blocking(move || processor.process(&source)).await??;

        let report = ThumbnailReport {
            container: config.thumbnail_container.clone(),
            name: name.clone(),
            content_type: encoder.content_type(),
            width: thumb.width,
            height: thumb.height,
            source_width: thumb.source_width,
            source_height: thumb.source_height,
            size_bytes: thumb.bytes.len(),
        };

        store
            .upload(&config.thumbnail_container, &name, Bytes::from(thumb.bytes), encoder.content_type())
            .await?;

        info!(
            container = %report.container,
            name = %report.name,
            width = report.width,
            height = report.height,
            size = report.size_bytes,
            store = store.name(),
            "thumbnail uploaded"
        );
        Ok(Outcome::Thumbnail(report))
    }
}
