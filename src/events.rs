use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation reported by the storage service when a blob is created.
pub const CREATE_OPERATION: &str = "CreateBlob";
pub const BLOB_CREATED_EVENT: &str = "Microsoft.Storage.BlobCreated";
pub const SUBSCRIPTION_VALIDATION_EVENT: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";

/// One Event Grid event as delivered to a webhook or a local trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub topic: Option<String>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub event_type: String,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub data_version: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobCreatedData {
    pub api: String,
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub content_length: Option<u64>,
    #[serde(default)]
    pub blob_type: Option<String>,
    #[serde(default)]
    pub e_tag: Option<String>,
    #[serde(default)]
    pub client_request_id: Option<String>,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubscriptionValidationData {
    validation_code: String,
}

/// Result of looking at an incoming event before any storage I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    /// A blob was created; carries the object URL.
    Proceed { url: String },
    /// Any other operation; nothing to do.
    Skip { operation: String },
}

impl StorageEvent {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    /// Read the payload as blob-created data.
    pub fn blob_created(&self) -> serde_json::Result<BlobCreatedData> {
        BlobCreatedData::deserialize(&self.data)
    }

    /// Continue only for blob creation; every other operation is a no-op.
    pub fn gate(&self) -> serde_json::Result<Gate> {
        let data = self.blob_created()?;
        if data.api == CREATE_OPERATION {
            Ok(Gate::Proceed { url: data.url })
        } else {
            Ok(Gate::Skip { operation: data.api })
        }
    }

    /// Validation code when this is an Event Grid subscription handshake.
    pub fn validation_code(&self) -> Option<String> {
        if self.event_type != SUBSCRIPTION_VALIDATION_EVENT {
            return None;
        }
        SubscriptionValidationData::deserialize(&self.data).ok().map(|d| d.validation_code)
    }
}

/// Webhook deliveries are arrays; local triggers often pass a single object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Delivery {
    Batch(Vec<StorageEvent>),
    Single(StorageEvent),
}

impl Delivery {
    pub fn into_events(self) -> Vec<StorageEvent> {
        match self {
            Self::Batch(events) => events,
            Self::Single(event) => vec![event],
        }
    }
}
