//! HTTP error types.

use thiserror::Error;

/// Errors raised by the HTTP controller, transports and helpers.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("http client is not open, call enter() first")]
    NotEntered,

    #[error("failed to build http client: {source}")]
    ClientBuild {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("connect error while requesting {url}: {message}")]
    Connect { url: String, message: String },

    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("too many redirects (max {max})")]
    TooManyRedirects { max: usize },

    #[error("cache error: {0}")]
    Cache(#[from] cacache::Error),

    #[error("response body has not been read")]
    ResponseNotRead,

    #[error("failed to parse response content: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpError {
    pub(crate) fn client_build(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::ClientBuild {
            source: source.into(),
        }
    }

    /// True for failures to reach the remote host.
    pub fn is_connect(&self) -> bool {
        matches!(self, HttpError::Connect { .. })
    }
}

/// Result type for HTTP operations.
pub type Result<T> = std::result::Result<T, HttpError>;
