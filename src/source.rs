//! Document sources and their identities.
//!
//! A [`Source`] is where PDF bytes come from: an in-memory buffer, a local
//! file or a URL. Its [`source key`](Source::key) identifies the document in
//! the manager and in persisted caches: the URL itself, or `sha256:<hex>` of
//! the content for buffers and files.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::config::FetchConfig;
use crate::error::{IngestError, Result};

#[derive(Clone)]
pub enum Source {
    Bytes { name: String, bytes: Arc<[u8]> },
    Path(PathBuf),
    Url(String),
}

impl Source {
    pub fn bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Source::Bytes {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    /// `http(s)://` arguments become URLs, anything else a local path.
    pub fn parse(arg: &str) -> Self {
        if arg.starts_with("http://") || arg.starts_with("https://") {
            Source::Url(arg.to_string())
        } else {
            Source::Path(PathBuf::from(arg))
        }
    }

    /// Stable identity of the document behind this source.
    ///
    /// Reads local files to hash them; never touches the network.
    pub fn key(&self) -> Result<String> {
        match self {
            Source::Url(url) => Ok(url.clone()),
            Source::Bytes { bytes, .. } => Ok(content_key(bytes)),
            Source::Path(path) => {
                let bytes = std::fs::read(path).map_err(|e| {
                    IngestError::Io(format!("failed to read {}: {}", path.display(), e))
                })?;
                Ok(content_key(&bytes))
            }
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Bytes { name, bytes } => f
                .debug_struct("Bytes")
                .field("name", name)
                .field("len", &bytes.len())
                .finish(),
            Source::Path(p) => f.debug_tuple("Path").field(p).finish(),
            Source::Url(u) => f.debug_tuple("Url").field(u).finish(),
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Bytes { name, .. } => write!(f, "{}", name),
            Source::Path(p) => write!(f, "{}", p.display()),
            Source::Url(u) => write!(f, "{}", u),
        }
    }
}

/// `sha256:<hex>` of `bytes`.
pub fn content_key(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

/// Load the raw bytes of `source`.
pub async fn load_bytes(source: &Source, fetch: &FetchConfig) -> Result<Arc<[u8]>> {
    match source {
        Source::Bytes { bytes, .. } => Ok(bytes.clone()),
        Source::Path(path) => {
            let bytes = tokio::fs::read(path).await.map_err(|e| {
                IngestError::Io(format!("failed to read {}: {}", path.display(), e))
            })?;
            check_size(bytes.len() as u64, fetch.max_bytes)?;
            Ok(bytes.into())
        }
        Source::Url(url) => fetch_with_retry(url, fetch).await,
    }
}

/// [`fetch_url`], retrying retryable failures with a linear backoff.
pub async fn fetch_with_retry(url: &str, fetch: &FetchConfig) -> Result<Arc<[u8]>> {
    let mut attempt = 0;
    loop {
        match fetch_url(url, fetch).await {
            Err(e) if e.is_retryable() && attempt < fetch.retries => {
                attempt += 1;
                tracing::warn!(url, attempt, error = %e, "fetch failed, retrying");
                tokio::time::sleep(Duration::from_millis(500 * attempt as u64)).await;
            }
            other => return other,
        }
    }
}

fn check_size(len: u64, max_bytes: u64) -> Result<()> {
    if len > max_bytes {
        return Err(IngestError::Extraction(format!(
            "source is {} bytes, larger than the {} byte limit",
            len, max_bytes
        )));
    }
    Ok(())
}

/// GET `url` with a bounded timeout.
///
/// Timeouts, connection failures, 5xx and 429 are retryable; other
/// non-success statuses are not.
pub async fn fetch_url(url: &str, fetch: &FetchConfig) -> Result<Arc<[u8]>> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(fetch.timeout_secs))
        .build()
        .map_err(|e| IngestError::Internal(format!("failed to build HTTP client: {}", e)))?;

    tracing::info!(url, "fetching source");
    let resp = client.get(url).send().await?;

    let status = resp.status();
    if !status.is_success() {
        let retryable = status.is_server_error() || status.as_u16() == 429;
        return Err(IngestError::Network {
            message: format!("GET {} returned {}", url, status),
            retryable,
        });
    }

    if let Some(len) = resp.content_length() {
        check_size(len, fetch.max_bytes)?;
    }
    let bytes = resp.bytes().await?;
    check_size(bytes.len() as u64, fetch.max_bytes)?;
    Ok(Arc::from(bytes.as_ref()))
}
