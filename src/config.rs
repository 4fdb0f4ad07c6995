use std::collections::HashMap;

use thiserror::Error;

pub const CONNECTION_STRING_KEY: &str = "AzureBlobStorage";
pub const THUMBNAIL_WIDTH_KEY: &str = "THUMBNAIL_WIDTH";
pub const THUMBNAIL_CONTAINER_KEY: &str = "THUMBNAIL_CONTAINER_NAME";
pub const IMAGES_CONTAINER_KEY: &str = "IMAGES_CONTAINER_NAME";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required setting {0} is not set")]
    Missing(&'static str),
    #[error("setting {key} must be a positive integer, got {value:?}")]
    InvalidWidth { key: &'static str, value: String },
    #[error("invalid storage connection string: {0}")]
    ConnectionString(String),
}

/// Where per-invocation settings come from.
pub trait SettingsSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads the process environment on every lookup.
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSettings;

impl SettingsSource for EnvSettings {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl SettingsSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key).cloned()
    }
}

#[derive(Clone)]
pub struct ThumbnailConfig {
    pub thumbnail_width: u32,
    pub images_container: String,
    pub thumbnail_container: String,
    pub connection_string: String,
}

// Keep the account key out of logs.
impl std::fmt::Debug for ThumbnailConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThumbnailConfig")
            .field("thumbnail_width", &self.thumbnail_width)
            .field("images_container", &self.images_container)
            .field("thumbnail_container", &self.thumbnail_container)
            .field("connection_string", &"<redacted>")
            .finish()
    }
}

impl ThumbnailConfig {
    pub fn load(source: &dyn SettingsSource) -> Result<Self, ConfigError> {
        let thumbnail_width = parse_width(source.get(THUMBNAIL_WIDTH_KEY))?;
        Ok(Self {
            thumbnail_width,
            images_container: required(source, IMAGES_CONTAINER_KEY)?,
            thumbnail_container: required(source, THUMBNAIL_CONTAINER_KEY)?,
            connection_string: required(source, CONNECTION_STRING_KEY)?,
        })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(&EnvSettings)
    }
}

fn required(source: &dyn SettingsSource, key: &'static str) -> Result<String, ConfigError> {
    match source.get(key) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::Missing(key)),
    }
}

fn parse_width(raw: Option<String>) -> Result<u32, ConfigError> {
    let raw = raw.ok_or(ConfigError::Missing(THUMBNAIL_WIDTH_KEY))?;
    match raw.trim().parse::<u32>() {
        Ok(w) if w > 0 => Ok(w),
        _ => Err(ConfigError::InvalidWidth { key: THUMBNAIL_WIDTH_KEY, value: raw }),
    }
}
