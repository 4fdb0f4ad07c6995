//! Parsing of blob URLs into container and object name.

use percent_encoding::percent_decode_str;
use thiserror::Error;
use url::{Host, Url};

#[derive(Debug, Error)]
pub enum ObjectUrlError {
    #[error("invalid object url {url:?}: {source}")]
    Parse {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("object url {0:?} has no container")]
    MissingContainer(String),
    #[error("object url {0:?} has no object name")]
    MissingName(String),
    #[error("object url {0:?} is not valid utf-8 once decoded")]
    Encoding(String),
}

/// Location of a blob as described by its URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReference {
    /// Account name, only present for path-style URLs (emulator, IP hosts).
    pub account: Option<String>,
    pub container: String,
    pub name: String,
}

impl ObjectReference {
    pub fn parse(raw: &str) -> Result<Self, ObjectUrlError> {
        let url = Url::parse(raw).map_err(|source| ObjectUrlError::Parse {
            url: raw.to_string(),
            source,
        })?;

        let mut segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.collect())
            .unwrap_or_default();
        // A trailing slash yields an empty last segment.
        while segments.last() == Some(&"") {
            segments.pop();
        }
        let mut segments = segments.into_iter();

        let account = if is_path_style(&url) {
            Some(decode(raw, segments.next().unwrap_or_default())?)
        } else {
            None
        };

        let container = match segments.next() {
            Some(c) if !c.is_empty() => decode(raw, c)?,
            _ => return Err(ObjectUrlError::MissingContainer(raw.to_string())),
        };

        let rest: Vec<&str> = segments.collect();
        if rest.is_empty() {
            return Err(ObjectUrlError::MissingName(raw.to_string()));
        }
        let name = decode(raw, &rest.join("/"))?;

        Ok(Self { account, container, name })
    }
}

/// Bare object name of a blob URL: no container prefix, no query string.
pub fn object_name(raw: &str) -> Result<String, ObjectUrlError> {
    ObjectReference::parse(raw).map(|r| r.name)
}

fn is_path_style(url: &Url) -> bool {
    match url.host() {
        Some(Host::Ipv4(_)) | Some(Host::Ipv6(_)) => true,
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        None => false,
    }
}

fn decode(raw: &str, segment: &str) -> Result<String, ObjectUrlError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| ObjectUrlError::Encoding(raw.to_string()))
}
