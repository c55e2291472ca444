//! Page retrieval: the network client, the permanent cache, and the [Retriever] seam the
//! extractor fetches through.

mod cache;
mod client;

pub use cache::{CacheOpenError, PageCache};
pub use client::{PoliteClient, PoliteClientBuilder};

use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Raw markup plus the URL it was retrieved from (the base for relative links).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub url: Url,
    pub html: String,
}

impl Page {
    pub fn new(url: Url, html: impl Into<String>) -> Self {
        Self {
            url,
            html: html.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("Invalid URL: {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Network error: could not reach {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} when fetching: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to read response body from {url}: {source}")]
    BodyRead {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Cannot read {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Page cache error: {0}")]
    Cache(#[from] rusqlite::Error),
}

/// Anything that can turn a URL into a page. Errors for non-success responses; never hands back
/// an error page as if it were content.
pub trait Retriever {
    fn get_page(&mut self, url: &Url) -> Result<Page, RetrievalError>;
}

/// Cache key for `url`: the URL without its fragment.
pub fn cache_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_fragment(None);
    key.into()
}

/// Fetches `http(s)` URLs through a [PoliteClient] and `file` URLs from disk, consulting and
/// filling an optional [PageCache] first.
#[derive(Debug)]
pub struct CachingRetriever {
    client: PoliteClient,
    cache: Option<PageCache>,
}

impl CachingRetriever {
    pub fn new(client: PoliteClient, cache: Option<PageCache>) -> Self {
        Self { client, cache }
    }

    /// Remove `url` from the cache. Returns whether a cached copy existed.
    pub fn expire(&mut self, url: &Url) -> Result<bool, RetrievalError> {
        match &self.cache {
            Some(cache) => Ok(cache.expire(&cache_key(url))?),
            None => Ok(false),
        }
    }

    fn fetch(&mut self, url: &Url) -> Result<String, RetrievalError> {
        match url.scheme() {
            "http" | "https" => {
                let response =
                    self.client
                        .get_with_retry(url.as_str())
                        .map_err(|e| RetrievalError::Network {
                            url: url.to_string(),
                            source: e,
                        })?;
                let status = response.status();
                if !status.is_success() {
                    return Err(RetrievalError::HttpStatus {
                        status: status.as_u16(),
                        url: url.to_string(),
                    });
                }
                response.text().map_err(|e| RetrievalError::BodyRead {
                    url: url.to_string(),
                    source: e,
                })
            }
            "file" => {
                let path = url.to_file_path().map_err(|()| RetrievalError::InvalidUrl {
                    url: url.to_string(),
                    reason: "not a local file path".to_string(),
                })?;
                let bytes = std::fs::read(&path)
                    .map_err(|e| RetrievalError::File { path, source: e })?;
                Ok(String::from_utf8_lossy(&bytes).into_owned())
            }
            other => Err(RetrievalError::InvalidUrl {
                url: url.to_string(),
                reason: format!("unsupported scheme '{}'", other),
            }),
        }
    }
}

impl Retriever for CachingRetriever {
    fn get_page(&mut self, url: &Url) -> Result<Page, RetrievalError> {
        let key = cache_key(url);
        if let Some(cache) = &self.cache {
            if let Some(html) = cache.get(&key)? {
                return Ok(Page::new(url.clone(), html));
            }
        }
        let html = self.fetch(url)?;
        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put(&key, &html) {
                warn!("could not cache {}: {}", key, e);
            }
        }
        debug!("retrieved {} ({} bytes)", url, html.len());
        Ok(Page::new(url.clone(), html))
    }
}
