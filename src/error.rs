//! Extraction and assembly errors. One story failing never affects another; the driver loop
//! reports these per URL and moves on.

use crate::markup::RewriteError;
use crate::model::ModelError;
use crate::retrieval::RetrievalError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FicError {
    #[error("Unsupported site: no adapter handles {url}")]
    UnsupportedSite { url: String },

    #[error("{site}: URL not handled by this adapter: {url}")]
    NotHandled { site: String, url: String },

    #[error("{site}: malformed response at {url}: {reason}")]
    MalformedSiteResponse {
        site: String,
        url: String,
        reason: String,
    },

    #[error("{0}")]
    Retrieval(#[from] RetrievalError),
}

impl FicError {
    pub(crate) fn malformed(site: &str, url: &str, reason: impl Into<String>) -> Self {
        FicError::MalformedSiteResponse {
            site: site.to_string(),
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Wrap a markup rewrite failure as a malformed response for the page being processed.
    pub(crate) fn rewrite(site: &str, url: &str, e: RewriteError) -> Self {
        Self::malformed(site, url, e.to_string())
    }

    pub(crate) fn model(site: &str, url: &str, e: ModelError) -> Self {
        Self::malformed(site, url, e.to_string())
    }
}
