use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{ClientCert, Limits, Transport};
use crate::http::error::{HttpError, Result};
use crate::http::request::HttpRequest;
use crate::http::response::{HttpResponse, ResponseBody};

const RETRY_BACKOFF: Duration = Duration::from_millis(500);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Sleep before retry number `attempt` (1-based). The first retry is immediate.
fn retry_delay(attempt: u32) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    RETRY_BACKOFF
        .checked_mul(2u32.saturating_pow(attempt - 2))
        .map_or(MAX_RETRY_BACKOFF, |delay| delay.min(MAX_RETRY_BACKOFF))
}

/// Network transport on top of a pooled `reqwest::Client`.
pub struct PlainTransport {
    client: reqwest::Client,
    retries: u32,
    permits: Option<Arc<Semaphore>>,
}

#[derive(Debug, Clone)]
pub struct PlainTransportBuilder {
    verify: bool,
    cert: Option<ClientCert>,
    retries: u32,
    proxy: Option<String>,
    limits: Limits,
    timeout: Option<Duration>,
}

impl Default for PlainTransportBuilder {
    fn default() -> Self {
        Self {
            verify: true,
            cert: None,
            retries: 0,
            proxy: None,
            limits: Limits::default(),
            timeout: None,
        }
    }
}

impl PlainTransportBuilder {
    /// Verify server certificates (on by default).
    pub fn verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn cert(mut self, cert: ClientCert) -> Self {
        self.cert = Some(cert);
        self
    }

    /// Extra attempts after a failed connect.
    pub fn retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Default timeout for requests that carry none.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn build(self) -> Result<PlainTransport> {
        let mut builder = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .danger_accept_invalid_certs(!self.verify);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str()).map_err(HttpError::client_build)?;
            builder = builder.proxy(proxy);
        }
        if let Some(idle) = self.limits.max_keepalive_connections {
            builder = builder.pool_max_idle_per_host(idle);
        }
        if let Some(expiry) = self.limits.keepalive_expiry {
            builder = builder.pool_idle_timeout(expiry);
        }
        if let Some(cert) = &self.cert {
            builder = builder.identity(cert.identity()?);
        }

        let client = builder.build().map_err(HttpError::client_build)?;
        let permits = match self.limits.max_connections {
            Some(0) => {
                return Err(HttpError::Validation(
                    "max_connections must be greater than zero".into(),
                ));
            }
            Some(max) => Some(Arc::new(Semaphore::new(max))),
            None => None,
        };

        debug!(
            verify = self.verify,
            retries = self.retries,
            proxy = self.proxy.is_some(),
            "Http transport created"
        );

        Ok(PlainTransport {
            client,
            retries: self.retries,
            permits,
        })
    }
}

impl PlainTransport {
    pub fn builder() -> PlainTransportBuilder {
        PlainTransportBuilder::default()
    }

    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    async fn send_once(&self, request: &HttpRequest) -> reqwest::Result<reqwest::Response> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        builder.send().await
    }

    /// Connect failures are retried with exponential backoff; the first retry is immediate.
    async fn send_with_retries(&self, request: &HttpRequest) -> Result<reqwest::Response> {
        let mut attempt = 0;
        loop {
            match self.send_once(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_connect() && attempt < self.retries => {
                    attempt += 1;
                    let delay = retry_delay(attempt);
                    warn!(
                        url = %request.url,
                        attempt,
                        retries = self.retries,
                        error = %e,
                        "Connect failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_connect() => {
                    return Err(HttpError::Connect {
                        url: request.url.to_string(),
                        message: e.to_string(),
                    });
                }
                Err(e) if e.is_timeout() => {
                    return Err(HttpError::Timeout {
                        url: request.url.to_string(),
                    });
                }
                Err(e) => return Err(HttpError::Request(e)),
            }
        }
    }
}

#[async_trait]
impl Transport for PlainTransport {
    async fn handle_request(&self, request: &HttpRequest, stream: bool) -> Result<HttpResponse> {
        let permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|e| HttpError::Validation(format!("connection pool closed: {e}")))?,
            ),
            None => None,
        };

        let response = self.send_with_retries(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();

        let body = if stream {
            let chunks = response.bytes_stream().map(move |chunk| {
                // Held until the stream is dropped
                let _permit = &permit;
                chunk.map(|bytes| bytes.to_vec()).map_err(HttpError::from)
            });
            ResponseBody::Streaming(chunks.boxed())
        } else {
            ResponseBody::Buffered(response.bytes().await?.to_vec())
        };

        Ok(HttpResponse::new(status, headers, url, body))
    }

    async fn close(&self) {
        if let Some(permits) = &self.permits {
            permits.close();
        }
        debug!("Http transport closed");
    }
}
