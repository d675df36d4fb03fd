use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{CACHE_CONTROL, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use url::Url;

use super::Transport;
use crate::http::encoders::iso8601;
use crate::http::error::{HttpError, Result};
use crate::http::request::HttpRequest;
use crate::http::response::{HttpResponse, ResponseBody};

/// Statuses whose responses are stored.
const CACHEABLE_STATUSES: [StatusCode; 3] = [
    StatusCode::OK,
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::PERMANENT_REDIRECT,
];

/// Status line and headers of a stored response.
#[derive(Debug, Serialize, Deserialize)]
struct CachedHead {
    status: u16,
    url: String,
    headers: Vec<(String, String)>,
    #[serde(with = "iso8601")]
    stored_at: DateTime<Utc>,
}

/// File-system response store backed by `cacache`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
    ttl: Option<Duration>,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>, ttl: Option<Duration>) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    fn is_expired(&self, stored_at: DateTime<Utc>) -> bool {
        let Some(ttl) = self.ttl else {
            return false;
        };
        let age = (Utc::now() - stored_at).to_std().unwrap_or(Duration::ZERO);
        age >= ttl
    }

    /// Stored response for `key`, or `None` on a miss or an expired entry.
    pub async fn load(&self, key: &str) -> Result<Option<HttpResponse>> {
        let head_bytes = match cacache::read(&self.dir, head_key(key)).await {
            Ok(bytes) => bytes,
            Err(cacache::Error::EntryNotFound(_, _)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let head: CachedHead = match serde_json::from_slice(&head_bytes) {
            Ok(head) => head,
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable cache entry");
                self.remove(key).await;
                return Ok(None);
            }
        };

        if self.is_expired(head.stored_at) {
            debug!(key, stored_at = %head.stored_at, "Cache entry expired");
            self.remove(key).await;
            return Ok(None);
        }

        let body = match cacache::read(&self.dir, key).await {
            Ok(body) => body,
            Err(cacache::Error::EntryNotFound(_, _)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let status = StatusCode::from_u16(head.status)
            .map_err(|e| HttpError::Validation(format!("cached status {}: {e}", head.status)))?;
        let url = Url::parse(&head.url)
            .map_err(|e| HttpError::Validation(format!("cached url {}: {e}", head.url)))?;
        let mut headers = HeaderMap::new();
        for (name, value) in &head.headers {
            if let (Ok(name), Ok(value)) = (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                headers.append(name, value);
            }
        }

        let mut response = HttpResponse::new(status, headers, url, ResponseBody::Buffered(body));
        response.set_from_cache(true);
        Ok(Some(response))
    }

    /// Stores a response under `key`.
    pub async fn store(
        &self,
        key: &str,
        status: StatusCode,
        url: &Url,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<()> {
        let head = CachedHead {
            status: status.as_u16(),
            url: url.to_string(),
            headers: headers
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|value| (name.to_string(), value.to_string()))
                })
                .collect(),
            stored_at: Utc::now(),
        };

        cacache::write(&self.dir, key, body).await?;
        cacache::write(&self.dir, head_key(key), serde_json::to_vec(&head)?).await?;
        Ok(())
    }

    /// Drops both entries of `key`. Missing entries are not an error.
    pub async fn remove(&self, key: &str) {
        for entry in [head_key(key), key.to_string()] {
            let opts = cacache::index::RemoveOpts::new().remove_fully(true);
            if let Err(e) = opts.remove(&self.dir, &entry).await {
                debug!(key = %entry, error = %e, "Cache entry not removed");
            }
        }
    }
}

fn head_key(key: &str) -> String {
    format!("{key}:head")
}

/// Cache key of a request: hex SHA-256 of method and URL.
pub(crate) fn cache_key(request: &HttpRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.method.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(request.url.as_str().as_bytes());
    hex::encode(hasher.finalize())
}

fn has_no_store(headers: &HeaderMap) -> bool {
    headers
        .get_all(CACHE_CONTROL)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|directive| directive.trim().eq_ignore_ascii_case("no-store"))
}

/// Transport that answers GET and HEAD requests from a [`FileStorage`]
/// before falling back to the wrapped transport.
pub struct CacheTransport {
    inner: Arc<dyn Transport>,
    storage: FileStorage,
}

impl CacheTransport {
    pub fn new(inner: Arc<dyn Transport>, storage: FileStorage) -> Self {
        Self { inner, storage }
    }

    pub fn storage(&self) -> &FileStorage {
        &self.storage
    }

    fn is_cacheable(request: &HttpRequest) -> bool {
        (request.method == Method::GET || request.method == Method::HEAD)
            && !has_no_store(&request.headers)
    }
}

#[async_trait]
impl Transport for CacheTransport {
    async fn handle_request(&self, request: &HttpRequest, stream: bool) -> Result<HttpResponse> {
        if !Self::is_cacheable(request) {
            return self.inner.handle_request(request, stream).await;
        }

        let key = cache_key(request);
        if let Some(response) = self.storage.load(&key).await? {
            debug!(url = %request.url, key = %key, "Cache hit");
            return Ok(response);
        }

        // Buffered so the body can be stored
        let response = self.inner.handle_request(request, false).await?;
        if CACHEABLE_STATUSES.contains(&response.status()) && !has_no_store(response.headers()) {
            // Owned parts only: a streaming body makes the response !Sync
            let status = response.status();
            let url = response.url().clone();
            let headers = response.headers().clone();
            let body = response.content().map(<[u8]>::to_vec);
            let stored = match body {
                Ok(body) => {
                    self.storage
                        .store(&key, status, &url, &headers, &body)
                        .await
                }
                Err(e) => Err(e),
            };
            match stored {
                Ok(()) => debug!(url = %request.url, key = %key, "Response cached"),
                Err(e) => warn!(url = %request.url, error = %e, "Failed to cache response"),
            }
        }
        Ok(response)
    }

    async fn close(&self) {
        self.inner.close().await;
    }
}
