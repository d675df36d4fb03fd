//! Standalone request and file helpers.

use std::path::{Path, PathBuf};

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{info, warn};
use url::Url;

use super::error::{HttpError, Result};
use super::request::{HttpRequest, append_params, insert_headers, parse_method};

/// Body of a request built by [`build_request`].
#[derive(Debug, Clone, PartialEq)]
pub enum RequestData {
    Json(serde_json::Value),
    Text(String),
}

/// Builds a standalone request.
///
/// Without `headers` the request carries `Content-Type: application/json`.
pub fn build_request(
    method: &str,
    url: &str,
    headers: Option<&[(String, String)]>,
    params: &[(String, String)],
    data: Option<RequestData>,
) -> Result<HttpRequest> {
    let method = parse_method(method)?;
    let mut url = Url::parse(url.trim())
        .map_err(|e| HttpError::Validation(format!("invalid url {url:?}: {e}")))?;
    append_params(&mut url, params);

    let mut header_map = HeaderMap::new();
    match headers {
        Some(headers) => insert_headers(&mut header_map, headers)?,
        None => {
            header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
    }

    let body = match data {
        Some(RequestData::Json(value)) => Some(
            serde_json::to_vec(&value)
                .map_err(|e| HttpError::Validation(format!("json body: {e}")))?,
        ),
        Some(RequestData::Text(text)) => Some(text.into_bytes()),
        None => None,
    };

    Ok(HttpRequest {
        method,
        url,
        headers: header_map,
        body,
        timeout: None,
    })
}

/// Expands a leading `~` to the home directory.
pub(crate) fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Writes `bytes` to `output_dir/output_filename` and returns the path.
///
/// Missing directories are created.
pub async fn save_bytes(
    bytes: &[u8],
    output_dir: impl AsRef<Path>,
    output_filename: &str,
) -> Result<PathBuf> {
    if bytes.is_empty() {
        return Err(HttpError::Validation("nothing to save, bytes are empty".into()));
    }
    if output_filename.trim().is_empty() {
        return Err(HttpError::Validation("output filename must not be empty".into()));
    }

    let dir = expand_home(output_dir.as_ref());
    let path = dir.join(output_filename);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
        && !tokio::fs::try_exists(parent).await?
    {
        warn!(path = %parent.display(), "Output directory does not exist, creating it");
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::write(&path, bytes).await?;
    info!(path = %path.display(), size = bytes.len(), "Saved bytes to file");
    Ok(path)
}
