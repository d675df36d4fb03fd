//! Transports that carry an [`HttpRequest`] to the network (or the cache).

mod cache;
mod plain;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::error;

use super::error::{HttpError, Result};
use super::request::HttpRequest;
use super::response::HttpResponse;

pub use cache::{CacheTransport, FileStorage};
pub use plain::{PlainTransport, PlainTransportBuilder};

/// Default cache directory of [`get_cache_transport`].
pub const DEFAULT_CACHE_DIR: &str = ".cache/http";

/// Transport trait implemented by everything that can answer a request.
///
/// Redirects are not followed here; the controller's client does that.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends one request and returns the response as-is.
    /// With `stream` set the body is left unread.
    async fn handle_request(&self, request: &HttpRequest, stream: bool) -> Result<HttpResponse>;

    /// Releases pooled connections. Safe to call more than once.
    async fn close(&self) {}
}

/// Client certificate used for TLS client authentication.
///
/// Both files are PEM; without `key` the certificate file must also hold
/// the PKCS#8 private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCert {
    pub cert: PathBuf,
    pub key: Option<PathBuf>,
}

impl ClientCert {
    pub fn new(cert: impl Into<PathBuf>) -> Self {
        Self {
            cert: cert.into(),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<PathBuf>) -> Self {
        self.key = Some(key.into());
        self
    }

    fn identity(&self) -> Result<reqwest::Identity> {
        let cert = std::fs::read(&self.cert)?;
        let key = match &self.key {
            Some(path) => std::fs::read(path)?,
            None => cert.clone(),
        };
        reqwest::Identity::from_pkcs8_pem(&cert, &key).map_err(HttpError::client_build)
    }
}

/// Connection pool limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of requests in flight at once.
    pub max_connections: Option<usize>,
    /// Idle connections kept per host.
    pub max_keepalive_connections: Option<usize>,
    /// How long an idle connection is kept.
    pub keepalive_expiry: Option<Duration>,
}

/// Builds a caching transport over a plain network transport.
///
/// Responses to GET and HEAD requests are stored under `cache_dir`.
/// Entries older than `ttl` are refetched; `None` keeps them forever.
pub fn get_cache_transport(
    cache_dir: impl AsRef<Path>,
    ttl: Option<Duration>,
    verify: bool,
    retries: u32,
    cert: Option<ClientCert>,
) -> Result<CacheTransport> {
    let mut builder = PlainTransport::builder().verify(verify).retries(retries);
    if let Some(cert) = cert {
        builder = builder.cert(cert);
    }

    let inner = builder.build().map_err(|e| {
        error!(error = %e, cache_dir = %cache_dir.as_ref().display(), "Failed to build cache transport");
        e
    })?;

    Ok(CacheTransport::new(
        Arc::new(inner),
        FileStorage::new(cache_dir.as_ref(), ttl),
    ))
}
