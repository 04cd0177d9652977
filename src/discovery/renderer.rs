//! Page renderer seam.
//!
//! A renderer session loads one page at a time and answers link queries
//! against the page currently loaded. Sessions are stateful and not meant to
//! be shared: each product pipeline opens its own through a
//! [`RendererFactory`] and closes it when the pipeline ends.

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::download::has_extension;

/// Failures while loading a page or extracting its links.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The page could not be fetched at all.
    #[error("navigation to {url} failed: {source}")]
    Navigation {
        /// The page URL.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The page responded with a non-2xx status.
    #[error("HTTP {status} loading {url}")]
    HttpStatus {
        /// The page URL.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The page URL could not be parsed.
    #[error("invalid page URL: {url}")]
    InvalidUrl {
        /// The rejected URL.
        url: String,
    },

    /// `find_links` was called before any successful `load`.
    #[error("no page loaded")]
    NoPageLoaded,

    /// Links could not be extracted from the loaded page.
    #[error("link extraction failed on {url}: {reason}")]
    Extraction {
        /// The page URL.
        url: String,
        /// What went wrong.
        reason: String,
    },

    /// A renderer session could not be opened.
    #[error("renderer session unavailable: {reason}")]
    SessionUnavailable {
        /// What went wrong.
        reason: String,
    },
}

/// Which hyperlinks a link query selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPattern {
    /// URL path contains the substring (e.g. a `/latest/` version marker).
    PathContains(String),
    /// URL path ends with `.<extension>`; extension lowercase, without dot.
    Extension(String),
}

impl LinkPattern {
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        match self {
            Self::PathContains(marker) => url.path().contains(marker.as_str()),
            Self::Extension(extension) => has_extension(url, extension),
        }
    }
}

/// One rendering session (one browser-like context).
#[async_trait]
pub trait PageRenderer: Send {
    /// Navigates to `url` and waits until its links are ready to be read.
    async fn load(&mut self, url: &str) -> Result<(), RenderError>;

    /// Absolute http(s) hyperlinks on the loaded page matching `pattern`,
    /// in document order, without duplicates.
    fn find_links(&self, pattern: &LinkPattern) -> Result<Vec<Url>, RenderError>;

    /// Releases the session. Called exactly once, on every pipeline exit path.
    async fn close(&mut self) {}
}

/// Opens renderer sessions, one per pipeline.
#[async_trait]
pub trait RendererFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn PageRenderer>, RenderError>;
}
