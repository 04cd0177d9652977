//! Link discovery: related documentation pages and document links.
//!
//! Both operations drive a [`PageRenderer`] session owned by the calling
//! pipeline. Render failures are never fatal here; a page that cannot be
//! loaded contributes no links and the crawl moves on.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument, warn};
use url::Url;

mod http_renderer;
mod renderer;

pub use http_renderer::{HttpPageRenderer, HttpRendererFactory};
pub use renderer::{LinkPattern, PageRenderer, RenderError, RendererFactory};

use crate::download::document_filename;
use crate::product::Product;
use crate::registry::DedupRegistry;

/// A page URL found while crawling, with the depth it was found at.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageLink {
    pub url: Url,
    pub depth: u32,
}

/// A URL believed to reference a downloadable document.
///
/// Ordered by URL so downloads happen in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocumentCandidate {
    pub url: Url,
    /// Final path segment; the run-wide dedup key.
    pub filename: String,
    pub product: Product,
}

impl DocumentCandidate {
    /// Builds a candidate, or `None` when the URL has no usable filename.
    #[must_use]
    pub fn from_url(url: Url, product: Product) -> Option<Self> {
        let filename = document_filename(&url)?;
        Some(Self {
            url,
            filename,
            product,
        })
    }
}

/// Scope and patterns for one run's link discovery.
#[derive(Debug, Clone, Copy)]
pub struct LinkDiscovery<'a> {
    base_url: &'a Url,
    version_marker: &'a str,
    extension: &'a str,
    registry: &'a DedupRegistry,
}

impl<'a> LinkDiscovery<'a> {
    /// `extension` is lowercase without the dot.
    #[must_use]
    pub fn new(
        base_url: &'a Url,
        version_marker: &'a str,
        extension: &'a str,
        registry: &'a DedupRegistry,
    ) -> Self {
        Self {
            base_url,
            version_marker,
            extension,
            registry,
        }
    }

    fn in_scope(&self, url: &Url) -> bool {
        url.as_str().starts_with(self.base_url.as_str())
    }

    /// Collects in-scope pages linked from `start` whose path carries the
    /// version marker.
    ///
    /// Only the start page (depth 0) is read: the links it yields are depth-1
    /// pages and are not themselves crawled for further related pages.
    /// `max_depth` bounds that single hop, so nothing is returned only when
    /// the start depth already exceeds it, which cannot happen for an
    /// unsigned bound.
    #[instrument(skip(self, renderer), fields(start = %start))]
    pub async fn discover_related_pages(
        &self,
        renderer: &mut dyn PageRenderer,
        start: &Url,
        max_depth: u32,
    ) -> BTreeSet<PageLink> {
        const START_DEPTH: u32 = 0;
        if START_DEPTH > max_depth {
            return BTreeSet::new();
        }

        info!(depth = START_DEPTH, "fetching related links");
        if let Err(e) = renderer.load(start.as_str()).await {
            warn!(error = %e, "failed to load page, treating as no related links");
            return BTreeSet::new();
        }

        let pattern = LinkPattern::PathContains(self.version_marker.to_string());
        let links = match renderer.find_links(&pattern) {
            Ok(links) => links,
            Err(e) => {
                warn!(error = %e, "failed to extract related links");
                return BTreeSet::new();
            }
        };

        let related: BTreeSet<PageLink> = links
            .into_iter()
            .filter(|url| self.in_scope(url))
            .map(|url| PageLink {
                url,
                depth: START_DEPTH + 1,
            })
            .collect();
        debug!(count = related.len(), "related pages found");
        related
    }

    /// Collects in-scope links on `page` whose path ends with the document
    /// extension.
    ///
    /// Filenames already committed in the registry are dropped here to save
    /// a claim round-trip; the claim at download time stays authoritative.
    #[instrument(skip(self, renderer), fields(page = %page, product = %product))]
    pub async fn discover_document_links(
        &self,
        renderer: &mut dyn PageRenderer,
        page: &Url,
        product: &Product,
    ) -> BTreeSet<DocumentCandidate> {
        info!("fetching document links");
        if let Err(e) = renderer.load(page.as_str()).await {
            warn!(error = %e, "failed to load page, treating as no document links");
            return BTreeSet::new();
        }

        let pattern = LinkPattern::Extension(self.extension.to_string());
        let links = match renderer.find_links(&pattern) {
            Ok(links) => links,
            Err(e) => {
                warn!(error = %e, "failed to extract document links");
                return BTreeSet::new();
            }
        };

        let mut candidates = BTreeSet::new();
        for url in links {
            if !self.in_scope(&url) {
                debug!(url = %url, "ignoring out-of-scope document link");
                continue;
            }
            let Some(candidate) = DocumentCandidate::from_url(url.clone(), product.clone()) else {
                debug!(url = %url, "no usable filename, dropping link");
                continue;
            };
            if self.registry.is_downloaded(&candidate.filename) {
                info!(filename = %candidate.filename, "skipping already downloaded file");
                continue;
            }
            candidates.insert(candidate);
        }
        candidates
    }
}
