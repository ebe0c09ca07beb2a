//! Transport and credential collaborators
//!
//! Fetchers never build an HTTP client themselves. They describe a request
//! with [`RequestSpec`] and hand it to a [`Transport`], which returns the raw
//! body or a [`FetchError`]. Non-success HTTP statuses are mapped to
//! `FetchError::Transport` so callers only deal with one failure channel.

use super::FetchError;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;

/// Browser-like user agent; some providers reject obvious bots
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSpec {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl RequestSpec {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn issue(&self, request: &RequestSpec) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn issue(&self, request: &RequestSpec) -> Result<Vec<u8>, FetchError> {
        let mut builder = self.client.get(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Transport(format!("HTTP {} from {}", status, request.url)));
        }

        let body = response.bytes().await?;
        log::debug!("📡 {} → {} bytes", request.url, body.len());
        Ok(body.to_vec())
    }
}

/// Source of provider secrets (cookies, API keys)
///
/// An absent credential is treated by fetchers exactly like a failed fetch.
pub trait CredentialStore: Send + Sync {
    fn load_credential(&self, name: &str) -> Option<String>;
}

/// Reads `<dir>/<name>` and trims it; missing or blank files are absent
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    dir: PathBuf,
}

impl FileCredentialStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load_credential(&self, name: &str) -> Option<String> {
        let path = self.dir.join(name);
        match std::fs::read_to_string(&path) {
            Ok(contents) => {
                let secret = contents.trim();
                if secret.is_empty() {
                    log::warn!("⚠️  Credential file {} is empty", path.display());
                    None
                } else {
                    Some(secret.to_string())
                }
            }
            Err(e) => {
                log::debug!("Credential {} not readable at {}: {}", name, path.display(), e);
                None
            }
        }
    }
}

/// Reads credentials from environment variables
///
/// `baidu_cookie` is looked up as `BAIDU_COOKIE`.
#[derive(Debug, Clone, Default)]
pub struct EnvCredentialStore;

impl CredentialStore for EnvCredentialStore {
    fn load_credential(&self, name: &str) -> Option<String> {
        std::env::var(name.to_uppercase())
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

/// Tries each store in order and returns the first credential found
pub struct ChainedCredentialStore {
    stores: Vec<Box<dyn CredentialStore>>,
}

impl ChainedCredentialStore {
    pub fn new(stores: Vec<Box<dyn CredentialStore>>) -> Self {
        Self { stores }
    }
}

impl CredentialStore for ChainedCredentialStore {
    fn load_credential(&self, name: &str) -> Option<String> {
        self.stores.iter().find_map(|s| s.load_credential(name))
    }
}
