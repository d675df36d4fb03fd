//! Response values returned by transports.

use std::fmt;

use encoding_rs::Encoding;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};
use url::Url;

use super::charset::{DefaultEncoding, charset_from_content_type};
use super::error::{HttpError, Result};

/// Body of a response, buffered or still on the wire.
pub enum ResponseBody {
    Buffered(Vec<u8>),
    Streaming(BoxStream<'static, Result<Vec<u8>>>),
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponseBody::Buffered(bytes) => write!(f, "Buffered({} bytes)", bytes.len()),
            ResponseBody::Streaming(_) => f.write_str("Streaming"),
        }
    }
}

#[derive(Debug)]
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    url: Url,
    body: ResponseBody,
    from_cache: bool,
    default_encoding: DefaultEncoding,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, url: Url, body: ResponseBody) -> Self {
        Self {
            status,
            headers,
            url,
            body,
            from_cache: false,
            default_encoding: DefaultEncoding::default(),
        }
    }

    /// Buffered response, handy for transports that synthesize responses.
    pub fn buffered(status: StatusCode, url: Url, content: impl Into<Vec<u8>>) -> Self {
        Self::new(
            status,
            HeaderMap::new(),
            url,
            ResponseBody::Buffered(content.into()),
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn reason_phrase(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("")
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Final URL, after redirects.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// True when the response was served from the HTTP cache.
    pub fn from_cache(&self) -> bool {
        self.from_cache
    }

    pub(crate) fn set_from_cache(&mut self, from_cache: bool) {
        self.from_cache = from_cache;
    }

    pub(crate) fn set_default_encoding(&mut self, encoding: DefaultEncoding) {
        self.default_encoding = encoding;
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.body, ResponseBody::Streaming(_))
    }

    /// Buffered body bytes; fails for a streaming body that was not read yet.
    pub fn content(&self) -> Result<&[u8]> {
        match &self.body {
            ResponseBody::Buffered(bytes) => Ok(bytes),
            ResponseBody::Streaming(_) => Err(HttpError::ResponseNotRead),
        }
    }

    /// Reads a streaming body to the end and buffers it.
    pub async fn read(&mut self) -> Result<&[u8]> {
        if let ResponseBody::Streaming(stream) = &mut self.body {
            let mut buffer = Vec::new();
            while let Some(chunk) = stream.next().await {
                buffer.extend_from_slice(&chunk?);
            }
            self.body = ResponseBody::Buffered(buffer);
        }
        self.content()
    }

    /// Next chunk of a streaming body. A buffered body is yielded whole, once.
    pub async fn next_chunk(&mut self) -> Option<Result<Vec<u8>>> {
        match &mut self.body {
            ResponseBody::Streaming(stream) => stream.next().await,
            ResponseBody::Buffered(bytes) if !bytes.is_empty() => Some(Ok(std::mem::take(bytes))),
            ResponseBody::Buffered(_) => None,
        }
    }

    /// Encoding declared in the `Content-Type` charset parameter.
    pub fn encoding(&self) -> Option<&'static Encoding> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(charset_from_content_type)
    }

    /// Body as text, replacing malformed sequences.
    ///
    /// Uses the declared charset, otherwise the controller's default encoding.
    pub fn text(&self) -> Result<String> {
        let content = self.content()?;
        let encoding = self
            .encoding()
            .unwrap_or_else(|| self.default_encoding.resolve(content));
        let (text, _, _) = encoding.decode(content);
        Ok(text.into_owned())
    }
}
