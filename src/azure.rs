//! Azure Blob Storage over its REST API.
//!
//! Supports the three connection-string shapes the storage tooling hands out:
//! account name + key (SharedKey signing), a blob endpoint with a SAS token,
//! and `UseDevelopmentStorage=true` for the local emulator.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use bytes::Bytes;
use chrono::Utc;
use futures_util::StreamExt;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use sha2::Sha256;
use tracing::debug;
use url::Url;

use crate::config::{ConfigError, ThumbnailConfig};
use crate::storage::{BlobStore, BlobStream, StorageError, StoreFactory};

pub const API_VERSION: &str = "2021-08-06";

const EMULATOR_ACCOUNT: &str = "devstoreaccount1";
const EMULATOR_KEY: &str = "Eby8vdM02xNOcqFlqUwJPLlmEtlCDXJ1OUzFT50uSRZ6IFsuFq2UVErCz4I6tq/K1SZFPTOtr/KBHBeksoGMGw==";
const EMULATOR_BLOB_ENDPOINT: &str = "http://127.0.0.1:10000/devstoreaccount1";

/// Characters left as-is in blob paths.
const PATH_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    SharedKey { account: String, key: Vec<u8> },
    Sas(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SharedKey { account, .. } => f.debug_struct("SharedKey").field("account", account).finish_non_exhaustive(),
            Self::Sas(_) => f.write_str("Sas(<redacted>)"),
        }
    }
}

/// Blob endpoint plus credential, parsed from a storage connection string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageAccount {
    pub blob_endpoint: Url,
    pub credential: Credential,
}

impl StorageAccount {
    pub fn from_connection_string(raw: &str) -> Result<Self, ConfigError> {
        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        for part in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (k, v) = part
                .split_once('=')
                .ok_or_else(|| ConfigError::ConnectionString(format!("segment {part:?} is not key=value")))?;
            fields.insert(k.trim().to_ascii_lowercase(), v.trim().to_string());
        }
        let field = |k: &str| fields.get(k).map(String::as_str);

        if field("usedevelopmentstorage").is_some_and(|v| v.eq_ignore_ascii_case("true")) {
            return Ok(Self {
                blob_endpoint: parse_endpoint(EMULATOR_BLOB_ENDPOINT)?,
                credential: shared_key(EMULATOR_ACCOUNT, EMULATOR_KEY)?,
            });
        }

        let account = field("accountname");
        let blob_endpoint = match (field("blobendpoint"), account) {
            (Some(endpoint), _) => parse_endpoint(endpoint)?,
            (None, Some(account)) => {
                let protocol = field("defaultendpointsprotocol").unwrap_or("https");
                let suffix = field("endpointsuffix").unwrap_or("core.windows.net");
                parse_endpoint(&format!("{protocol}://{account}.blob.{suffix}"))?
            }
            (None, None) => {
                return Err(ConfigError::ConnectionString("neither BlobEndpoint nor AccountName is set".into()));
            }
        };

        let credential = match (account, field("accountkey"), field("sharedaccesssignature")) {
            (Some(account), Some(key), _) => shared_key(account, key)?,
            (_, _, Some(sas)) => Credential::Sas(sas.trim_start_matches('?').to_string()),
            _ => {
                return Err(ConfigError::ConnectionString(
                    "expected AccountName with AccountKey, or SharedAccessSignature".into(),
                ));
            }
        };

        Ok(Self { blob_endpoint, credential })
    }

    /// Absolute URL of a blob; SAS tokens are appended as the query string.
    pub fn blob_url(&self, container: &str, name: &str) -> Result<Url, StorageError> {
        let base = self.blob_endpoint.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!(
            "{base}/{}/{}",
            utf8_percent_encode(container, PATH_SET),
            utf8_percent_encode(name, PATH_SET)
        ))
        .map_err(|e| StorageError::Credential(format!("cannot build blob url: {e}")))?;
        if let Credential::Sas(token) = &self.credential {
            url.set_query(Some(token));
        }
        Ok(url)
    }
}

fn parse_endpoint(raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|e| ConfigError::ConnectionString(format!("invalid blob endpoint {raw:?}: {e}")))
}

fn shared_key(account: &str, key: &str) -> Result<Credential, ConfigError> {
    let key = STANDARD
        .decode(key)
        .map_err(|e| ConfigError::ConnectionString(format!("AccountKey is not valid base64: {e}")))?;
    Ok(Credential::SharedKey { account: account.to_string(), key })
}

/// String-to-sign for the SharedKey scheme of the Blob service.
///
/// `ms_headers` holds every `x-ms-*` header sent with the request;
/// `path` is the encoded URL path including the leading slash.
pub fn string_to_sign(
    method: &Method,
    content_length: Option<usize>,
    ms_headers: &BTreeMap<String, String>,
    account: &str,
    path: &str,
    query: &BTreeMap<String, String>,
) -> String {
    let length = match content_length {
        Some(0) | None => String::new(),
        Some(n) => n.to_string(),
    };
    let mut out = format!("{method}\n\n\n{length}\n\n\n\n\n\n\n\n\n");
    for (name, value) in ms_headers {
        out.push_str(&format!("{}:{}\n", name.to_ascii_lowercase(), value.trim()));
    }
    out.push_str(&format!("/{account}{path}"));
    for (name, value) in query {
        out.push_str(&format!("\n{}:{}", name.to_ascii_lowercase(), value));
    }
    out
}

/// Base64 HMAC-SHA256 of `string_to_sign` under the decoded account key.
pub fn sign(key: &[u8], string_to_sign: &str) -> Result<String, StorageError> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| StorageError::Credential(e.to_string()))?;
    mac.update(string_to_sign.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

pub struct AzureBlobStore {
    client: Client,
    account: StorageAccount,
}

impl AzureBlobStore {
    pub fn new(client: Client, account: StorageAccount) -> Self {
        Self { client, account }
    }

    fn request(
        &self,
        method: Method,
        container: &str,
        name: &str,
        mut ms_headers: BTreeMap<String, String>,
        content_length: Option<usize>,
    ) -> Result<RequestBuilder, StorageError> {
        let url = self.account.blob_url(container, name)?;
        ms_headers.insert("x-ms-date".into(), Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string());
        ms_headers.insert("x-ms-version".into(), API_VERSION.into());

        let mut req = self.client.request(method.clone(), url.clone());
        if let Credential::SharedKey { account, key } = &self.account.credential {
            let to_sign = string_to_sign(&method, content_length, &ms_headers, account, url.path(), &BTreeMap::new());
            let signature = sign(key, &to_sign)?;
            req = req.header("Authorization", format!("SharedKey {account}:{signature}"));
        }
        for (k, v) in &ms_headers {
            req = req.header(k.as_str(), v.as_str());
        }
        Ok(req)
    }
}

async fn check(resp: Response, container: &str, name: &str) -> Result<Response, StorageError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(StorageError::NotFound { container: container.to_string(), name: name.to_string() });
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StorageError::Status {
        container: container.to_string(),
        name: name.to_string(),
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn open_read(&self, container: &str, name: &str) -> Result<BlobStream, StorageError> {
        debug!(container, name, "downloading blob");
        let resp = self.request(Method::GET, container, name, BTreeMap::new(), None)?.send().await?;
        let resp = check(resp, container, name).await?;
        Ok(resp.bytes_stream().map(|chunk| chunk.map_err(StorageError::from)).boxed())
    }

    async fn upload(&self, container: &str, name: &str, data: Bytes, content_type: &str) -> Result<(), StorageError> {
        debug!(container, name, size = data.len(), "uploading blob");
        let headers = BTreeMap::from([
            ("x-ms-blob-type".to_string(), "BlockBlob".to_string()),
            ("x-ms-blob-content-type".to_string(), content_type.to_string()),
        ]);
        let resp = self
            .request(Method::PUT, container, name, headers, Some(data.len()))?
            .body(data)
            .send()
            .await?;
        check(resp, container, name).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "azure-blob"
    }
}

/// Shares one HTTP connection pool across invocations; the credential is
/// parsed again for every invocation.
#[derive(Clone)]
pub struct AzureStoreFactory {
    client: Client,
}

impl AzureStoreFactory {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(300)).build()?;
        Ok(Self { client })
    }
}

impl StoreFactory for AzureStoreFactory {
    fn connect(&self, config: &ThumbnailConfig) -> Result<Arc<dyn BlobStore>, ConfigError> {
        let account = StorageAccount::from_connection_string(&config.connection_string)?;
        Ok(Arc::new(AzureBlobStore::new(self.client.clone(), account)))
    }
}
