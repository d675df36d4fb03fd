use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use reqwest::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};
use url::Url;

use super::charset::{DefaultEncoding, decode_content};
use super::client::Client;
use super::error::{HttpError, Result};
use super::request::{
    Auth, HttpRequest, RequestOptions, RequestUrl, append_params, insert_headers, parse_method,
    timeout_from_secs,
};
use super::response::HttpResponse;
use super::transport::{Limits, PlainTransport, Transport};

const DEFAULT_TIMEOUT_SECS: f64 = 60.0;
const DEFAULT_MAX_REDIRECTS: usize = 20;

/// Construction parameters of an [`HttpController`].
#[derive(Clone)]
pub struct ControllerConfig {
    /// Target URL used when a request names none.
    pub url: Option<String>,
    /// Base URL that relative request URLs are joined onto.
    pub base_url: Option<String>,
    pub proxy: Option<String>,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub auth: Option<Auth>,
    pub follow_redirects: bool,
    pub max_redirects: usize,
    /// Extra attempts after a failed connect.
    pub retries: u32,
    /// Seconds; must be positive.
    pub timeout: f64,
    pub limits: Limits,
    /// Transport to use instead of a plain network one.
    pub transport: Option<Arc<dyn Transport>>,
    pub default_encoding: DefaultEncoding,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            url: None,
            base_url: None,
            proxy: None,
            headers: Vec::new(),
            params: Vec::new(),
            cookies: Vec::new(),
            auth: None,
            follow_redirects: false,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            retries: 0,
            timeout: DEFAULT_TIMEOUT_SECS,
            limits: Limits::default(),
            transport: None,
            default_encoding: DefaultEncoding::default(),
        }
    }
}

impl fmt::Debug for ControllerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerConfig")
            .field("url", &self.url)
            .field("base_url", &self.base_url)
            .field("proxy", &self.proxy)
            .field("headers", &self.headers)
            .field("params", &self.params)
            .field("auth", &self.auth)
            .field("follow_redirects", &self.follow_redirects)
            .field("max_redirects", &self.max_redirects)
            .field("retries", &self.retries)
            .field("timeout", &self.timeout)
            .field("limits", &self.limits)
            .field("custom_transport", &self.transport.is_some())
            .field("default_encoding", &self.default_encoding)
            .finish_non_exhaustive()
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn with_auth(mut self, auth: Auth) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_follow_redirects(mut self, follow: bool) -> Self {
        self.follow_redirects = follow;
        self
    }

    pub fn with_max_redirects(mut self, max: usize) -> Self {
        self.max_redirects = max;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = seconds;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_default_encoding(mut self, encoding: DefaultEncoding) -> Self {
        self.default_encoding = encoding;
        self
    }
}

/// Scoped owner of one HTTP client handle.
///
/// `enter` opens the handle and `exit` closes it exactly once; [`HttpController::scope`]
/// pairs them around a closure.
#[derive(Debug)]
pub struct HttpController {
    config: ControllerConfig,
    target_url: Option<Url>,
    base_url: Option<Url>,
    client: Option<Client>,
}

impl HttpController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            target_url: None,
            base_url: None,
            client: None,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.client.is_some()
    }

    /// Opens the client handle.
    pub fn enter(&mut self) -> Result<()> {
        if self.client.is_some() {
            return Ok(());
        }
        match self.open_client() {
            Ok(client) => {
                debug!(
                    url = ?self.target_url.as_ref().map(Url::as_str),
                    base_url = ?self.base_url.as_ref().map(Url::as_str),
                    "Http client opened"
                );
                self.client = Some(client);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize http client");
                Err(e)
            }
        }
    }

    fn open_client(&mut self) -> Result<Client> {
        let timeout = timeout_from_secs(self.config.timeout)?;
        let target_url = parse_config_url("url", self.config.url.as_deref())?;
        let base_url = parse_config_url("base_url", self.config.base_url.as_deref())?;

        let transport: Arc<dyn Transport> = match &self.config.transport {
            Some(transport) => transport.clone(),
            None => {
                let mut builder = PlainTransport::builder()
                    .retries(self.config.retries)
                    .limits(self.config.limits)
                    .timeout(timeout);
                if let Some(proxy) = &self.config.proxy {
                    builder = builder.proxy(proxy.clone());
                }
                Arc::new(builder.build()?)
            }
        };

        let client = Client::new(
            transport,
            self.config.follow_redirects,
            self.config.max_redirects,
            self.config.auth.clone(),
            self.config.default_encoding,
        );

        self.target_url = target_url;
        // Only applied when supplied
        if base_url.is_some() {
            self.base_url = base_url;
        }
        Ok(client)
    }

    /// Closes the client handle, logging `error` if the scope failed.
    ///
    /// The error itself stays with the caller.
    pub async fn exit(&mut self, error: Option<&HttpError>) {
        if let Some(e) = error {
            error!(error = %e, "Http client scope exited with error");
        }
        if let Some(client) = self.client.take() {
            client.close().await;
            debug!("Http client closed");
        }
    }

    /// Runs `f` with an open controller and closes it on every exit path.
    ///
    /// A panic inside `f` is re-raised after the handle is closed.
    pub async fn scope<T, F>(config: ControllerConfig, f: F) -> Result<T>
    where
        F: for<'c> FnOnce(&'c HttpController) -> BoxFuture<'c, Result<T>>,
    {
        let mut controller = Self::new(config);
        controller.enter()?;

        let outcome = AssertUnwindSafe(f(&controller)).catch_unwind().await;
        match outcome {
            Ok(result) => {
                controller.exit(result.as_ref().err()).await;
                result
            }
            Err(panic) => {
                error!("Http client scope panicked");
                controller.exit(None).await;
                std::panic::resume_unwind(panic)
            }
        }
    }

    /// The open client handle.
    pub fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or(HttpError::NotEntered)
    }

    /// Builds a request bound to the controller defaults.
    ///
    /// An empty URL falls back to the target URL; relative URLs are
    /// appended to the base URL path.
    pub fn new_request(
        &self,
        method: &str,
        url: impl Into<RequestUrl>,
        options: RequestOptions,
    ) -> Result<HttpRequest> {
        self.client()?;
        let method = parse_method(method)?;
        let mut url = self.resolve_url(url.into())?;
        let timeout = match options.timeout {
            Some(seconds) => timeout_from_secs(seconds)?,
            None => timeout_from_secs(self.config.timeout)?,
        };

        append_params(&mut url, &self.config.params);
        append_params(&mut url, &options.params);

        let mut headers = HeaderMap::new();
        insert_headers(&mut headers, &self.config.headers)?;
        insert_headers(&mut headers, &options.headers)?;

        let cookies = merge_cookies(&self.config.cookies, &options.cookies);
        if !cookies.is_empty() {
            let value = HeaderValue::from_str(&cookies)
                .map_err(|e| HttpError::Validation(format!("invalid cookie: {e}")))?;
            headers.insert(COOKIE, value);
        }

        let body = match &options.json {
            Some(json) => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                Some(
                    serde_json::to_vec(json)
                        .map_err(|e| HttpError::Validation(format!("json body: {e}")))?,
                )
            }
            None => None,
        };

        Ok(HttpRequest {
            method,
            url,
            headers,
            body,
            timeout: Some(timeout),
        })
    }

    fn resolve_url(&self, url: RequestUrl) -> Result<Url> {
        let raw = match url {
            RequestUrl::Parsed(url) => return Ok(url),
            RequestUrl::Raw(raw) => raw,
        };
        let raw = raw.trim();
        if raw.is_empty() {
            return self
                .target_url
                .clone()
                .ok_or_else(|| HttpError::Validation("missing a URL to request".into()));
        }

        match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.base_url.as_ref().ok_or_else(|| {
                    HttpError::Validation(format!("relative url {raw:?} without a base url"))
                })?;
                join_base(base, raw)
            }
            Err(e) => Err(HttpError::Validation(format!("invalid url {raw:?}: {e}"))),
        }
    }

    /// Sends `request` through the open handle.
    pub async fn send_request(
        &self,
        request: &HttpRequest,
        stream: bool,
        auth: Option<&Auth>,
    ) -> Result<HttpResponse> {
        let client = self.client()?;
        match client.send(request, stream, auth).await {
            Ok(response) => {
                info!(
                    method = %request.method,
                    url = %request.url,
                    status = response.status().as_u16(),
                    reason = response.reason_phrase(),
                    from_cache = response.from_cache(),
                    "Http response"
                );
                Ok(response)
            }
            Err(e) if e.is_connect() => {
                error!(method = %request.method, url = %request.url, error = %e, "Connect error");
                Err(e)
            }
            Err(e) => {
                error!(
                    method = %request.method,
                    url = %request.url,
                    error = %e,
                    "Unhandled error sending request"
                );
                Err(e)
            }
        }
    }

    /// Like [`send_request`](Self::send_request) but a connect failure yields `Ok(None)`.
    pub async fn try_send_request(
        &self,
        request: &HttpRequest,
        stream: bool,
        auth: Option<&Auth>,
    ) -> Result<Option<HttpResponse>> {
        match self.send_request(request, stream, auth).await {
            Ok(response) => Ok(Some(response)),
            Err(e) if e.is_connect() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Decodes the body leniently and parses it as JSON.
    pub fn decode_res_content<T: DeserializeOwned>(&self, response: &HttpResponse) -> Result<T> {
        let content = response.content()?;
        if content.is_empty() {
            return Err(HttpError::Validation("response content is empty".into()));
        }

        let decoded = decode_content(content, response.encoding());
        debug!(encoding = decoded.encoding, step = ?decoded.step, "Response content decoded");

        serde_json::from_str(&decoded.text).map_err(|e| {
            warn!(url = %response.url(), error = %e, "Response content is not valid JSON");
            HttpError::Parse(e)
        })
    }
}

fn parse_config_url(field: &str, value: Option<&str>) -> Result<Option<Url>> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            Url::parse(v).map_err(|e| HttpError::Validation(format!("invalid {field} {v:?}: {e}")))
        })
        .transpose()
}

/// Appends `relative` to the base path, keeping the base's last segment.
fn join_base(base: &Url, relative: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(relative.trim_start_matches('/'))
        .map_err(|e| HttpError::Validation(format!("invalid url {relative:?}: {e}")))
}

/// `name=value; ...` with later values winning per name.
fn merge_cookies(defaults: &[(String, String)], overrides: &[(String, String)]) -> String {
    let mut merged: Vec<(&str, &str)> = Vec::new();
    for (name, value) in defaults.iter().chain(overrides) {
        match merged.iter_mut().find(|entry| entry.0 == name.as_str()) {
            Some(entry) => entry.1 = value.as_str(),
            None => merged.push((name.as_str(), value.as_str())),
        }
    }
    merged
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ")
}
