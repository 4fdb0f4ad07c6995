//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use blob_thumbnailer::config::{
    CONNECTION_STRING_KEY, IMAGES_CONTAINER_KEY, THUMBNAIL_CONTAINER_KEY, THUMBNAIL_WIDTH_KEY,
};
use blob_thumbnailer::{MemoryBlobStore, StorageEvent, ThumbnailHandler};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use serde_json::json;

pub const ACCOUNT_URL: &str = "https://photos.blob.core.windows.net";

pub fn settings(width: &str) -> HashMap<String, String> {
    HashMap::from([
        (THUMBNAIL_WIDTH_KEY.to_string(), width.to_string()),
        (IMAGES_CONTAINER_KEY.to_string(), "images".to_string()),
        (THUMBNAIL_CONTAINER_KEY.to_string(), "thumbnails".to_string()),
        (CONNECTION_STRING_KEY.to_string(), "UseDevelopmentStorage=true".to_string()),
    ])
}

/// Handler over an in-memory store with the given settings.
pub fn handler(settings: HashMap<String, String>) -> (ThumbnailHandler, MemoryBlobStore) {
    let store = MemoryBlobStore::new();
    let handler = ThumbnailHandler::new(Arc::new(settings), Arc::new(store.clone()));
    (handler, store)
}

pub fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| Rgb([(x * 7 % 256) as u8, (y * 3 % 256) as u8, 200u8]));
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(img)
        .write_to(&mut Cursor::new(&mut out), format)
        .expect("encode fixture");
    out
}

pub fn event_json(api: &str, name: &str) -> serde_json::Value {
    json!({
        "id": format!("evt-{name}"),
        "topic": "/subscriptions/x/resourceGroups/rg/providers/Microsoft.Storage/storageAccounts/photos",
        "subject": format!("/blobServices/default/containers/images/blobs/{name}"),
        "eventType": "Microsoft.Storage.BlobCreated",
        "eventTime": "2024-05-01T10:00:00.000Z",
        "dataVersion": "",
        "data": {
            "api": api,
            "url": format!("{ACCOUNT_URL}/images/{name}"),
            "contentType": "application/octet-stream",
            "blobType": "BlockBlob"
        }
    })
}

pub fn event(api: &str, name: &str) -> StorageEvent {
    serde_json::from_value(event_json(api, name)).expect("valid event")
}
