use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, LOCATION};
use reqwest::{Method, StatusCode};
use tracing::debug;

use super::charset::DefaultEncoding;
use super::error::{HttpError, Result};
use super::request::{Auth, HttpRequest};
use super::response::HttpResponse;
use super::transport::Transport;

/// Client handle opened by the controller for one scope.
///
/// Applies auth and follows redirects over any [`Transport`].
pub struct Client {
    transport: Arc<dyn Transport>,
    follow_redirects: bool,
    max_redirects: usize,
    auth: Option<Auth>,
    default_encoding: DefaultEncoding,
    closed: AtomicBool,
}

impl Client {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        follow_redirects: bool,
        max_redirects: usize,
        auth: Option<Auth>,
        default_encoding: DefaultEncoding,
    ) -> Self {
        Self {
            transport,
            follow_redirects,
            max_redirects,
            auth,
            default_encoding,
            closed: AtomicBool::new(false),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Sends `request`; `auth` overrides the client default.
    pub async fn send(
        &self,
        request: &HttpRequest,
        stream: bool,
        auth: Option<&Auth>,
    ) -> Result<HttpResponse> {
        if self.is_closed() {
            return Err(HttpError::NotEntered);
        }

        let mut current = request.clone();
        if let Some(auth) = auth.or(self.auth.as_ref()) {
            current.headers.insert(AUTHORIZATION, auth.header_value()?);
        }

        let mut redirects = 0;
        loop {
            let mut response = self.transport.handle_request(&current, stream).await?;
            let Some(next) = self.redirect_request(&current, &response)? else {
                response.set_default_encoding(self.default_encoding);
                return Ok(response);
            };
            if redirects >= self.max_redirects {
                return Err(HttpError::TooManyRedirects {
                    max: self.max_redirects,
                });
            }
            redirects += 1;
            debug!(
                from = %current.url,
                to = %next.url,
                status = response.status().as_u16(),
                redirects,
                "Following redirect"
            );
            current = next;
        }
    }

    /// Request for the next hop, or `None` when the response is final.
    fn redirect_request(
        &self,
        request: &HttpRequest,
        response: &HttpResponse,
    ) -> Result<Option<HttpRequest>> {
        if !self.follow_redirects {
            return Ok(None);
        }
        let status = response.status();
        if !matches!(
            status,
            StatusCode::MOVED_PERMANENTLY
                | StatusCode::FOUND
                | StatusCode::SEE_OTHER
                | StatusCode::TEMPORARY_REDIRECT
                | StatusCode::PERMANENT_REDIRECT
        ) {
            return Ok(None);
        }
        let Some(location) = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
        else {
            return Ok(None);
        };

        let url = request.url.join(location).map_err(|e| {
            HttpError::Validation(format!("invalid redirect location {location:?}: {e}"))
        })?;

        let mut next = request.clone();
        let downgrade = match status {
            StatusCode::SEE_OTHER => request.method != Method::HEAD,
            StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND => {
                request.method != Method::GET && request.method != Method::HEAD
            }
            _ => false,
        };
        if downgrade {
            next.method = Method::GET;
            next.body = None;
            next.headers.remove(CONTENT_TYPE);
            next.headers.remove(CONTENT_LENGTH);
        }
        if url.origin() != request.url.origin() {
            next.headers.remove(AUTHORIZATION);
        }
        next.url = url;
        Ok(Some(next))
    }

    /// Closes the transport; later calls are no-ops.
    pub async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.transport.close().await;
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("follow_redirects", &self.follow_redirects)
            .field("max_redirects", &self.max_redirects)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
