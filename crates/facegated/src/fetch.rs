//! Network access for kiosk assets.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Default,
    /// Ask every intermediary for a fresh copy.
    NoStore,
}

#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue a GET; non-2xx answers are returned, not turned into errors.
    async fn get(&self, url: &str, mode: CacheMode) -> Result<Response, FetchError>;

    /// GET that requires HTTP 200 and yields the body.
    async fn get_ok(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let resp = self.get(url, CacheMode::Default).await?;
        if resp.is_ok() {
            Ok(resp.body)
        } else {
            Err(FetchError::Status { url: url.to_string(), status: resp.status })
        }
    }
}

/// `reqwest`-backed fetcher.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| FetchError::Request { url: String::new(), message: e.to_string() })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str, mode: CacheMode) -> Result<Response, FetchError> {
        let mut headers = HeaderMap::new();
        if mode == CacheMode::NoStore {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert("cache", HeaderValue::from_static("no-store"));
        }

        let request_error = |e: reqwest::Error| FetchError::Request { url: url.to_string(), message: e.to_string() };
        let resp = self.client.get(url).headers(headers).send().await.map_err(request_error)?;
        let status = resp.status().as_u16();
        let body = resp.bytes().await.map_err(request_error)?.to_vec();
        tracing::trace!(url, status, bytes = body.len(), "fetched");
        Ok(Response { status, body })
    }
}

/// Host connectivity, consulted before polling the network.
pub trait Connectivity: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Reads `/sys/class/net/*/operstate`; online when any non-loopback link is up.
pub struct SysfsConnectivity {
    root: PathBuf,
}

impl SysfsConnectivity {
    pub fn new() -> Self {
        Self { root: PathBuf::from("/sys/class/net") }
    }
}

impl Default for SysfsConnectivity {
    fn default() -> Self {
        Self::new()
    }
}

impl Connectivity for SysfsConnectivity {
    fn is_online(&self) -> bool {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            // No sysfs: assume online and let the request fail if not.
            return true;
        };
        entries.flatten().any(|entry| {
            entry.file_name() != "lo"
                && std::fs::read_to_string(entry.path().join("operstate"))
                    .map(|s| matches!(s.trim(), "up" | "unknown"))
                    .unwrap_or(false)
        })
    }
}
