//! Request values passed to transports.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use super::error::{HttpError, Result};

/// Fully resolved outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        }
    }
}

/// Request authentication.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    Basic {
        username: String,
        password: Option<String>,
    },
    Bearer(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Auth::Bearer(_) => f.write_str("Bearer(***)"),
        }
    }
}

impl Auth {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Auth::Basic {
            username: username.into(),
            password: Some(password.into()),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Auth::Bearer(token.into())
    }

    /// Value of the `Authorization` header.
    pub fn header_value(&self) -> Result<HeaderValue> {
        let raw = match self {
            Auth::Basic { username, password } => {
                let credentials = format!("{}:{}", username, password.as_deref().unwrap_or(""));
                format!("Basic {}", STANDARD.encode(credentials))
            }
            Auth::Bearer(token) => format!("Bearer {token}"),
        };
        let mut value = HeaderValue::from_str(&raw)
            .map_err(|e| HttpError::Validation(format!("invalid auth header: {e}")))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// URL argument of [`HttpController::new_request`](super::HttpController::new_request).
///
/// An empty raw string means "use the controller's target URL".
#[derive(Debug, Clone)]
pub enum RequestUrl {
    Raw(String),
    Parsed(Url),
}

impl From<&str> for RequestUrl {
    fn from(value: &str) -> Self {
        RequestUrl::Raw(value.to_string())
    }
}

impl From<String> for RequestUrl {
    fn from(value: String) -> Self {
        RequestUrl::Raw(value)
    }
}

impl From<Url> for RequestUrl {
    fn from(value: Url) -> Self {
        RequestUrl::Parsed(value)
    }
}

impl From<&Url> for RequestUrl {
    fn from(value: &Url) -> Self {
        RequestUrl::Parsed(value.clone())
    }
}

/// Per-request additions merged over the controller defaults.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub json: Option<serde_json::Value>,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub timeout: Option<f64>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, body: serde_json::Value) -> Self {
        self.json = Some(body);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    /// Timeout in seconds; must be positive.
    pub fn timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }
}

/// Parses a method name, upper-casing it first.
pub(crate) fn parse_method(method: &str) -> Result<Method> {
    let method = method.trim();
    if method.is_empty() {
        return Err(HttpError::Validation("method must not be empty".into()));
    }
    Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| HttpError::Validation(format!("invalid method: {method:?}")))
}

/// Converts a timeout in seconds, rejecting zero, negative and non-finite values.
pub(crate) fn timeout_from_secs(seconds: f64) -> Result<Duration> {
    if !seconds.is_finite() || seconds <= 0.0 {
        return Err(HttpError::Validation(format!(
            "timeout must be a positive number of seconds, got {seconds}"
        )));
    }
    Duration::try_from_secs_f64(seconds)
        .map_err(|e| HttpError::Validation(format!("timeout of {seconds} seconds: {e}")))
}

/// Inserts `(name, value)` pairs, replacing existing headers of the same name.
pub(crate) fn insert_headers(map: &mut HeaderMap, headers: &[(String, String)]) -> Result<()> {
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HttpError::Validation(format!("invalid header name {name:?}: {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpError::Validation(format!("invalid value for header {name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(())
}

/// Appends query pairs to `url`.
pub(crate) fn append_params(url: &mut Url, params: &[(String, String)]) {
    if params.is_empty() {
        return;
    }
    let mut pairs = url.query_pairs_mut();
    for (name, value) in params {
        pairs.append_pair(name, value);
    }
}
