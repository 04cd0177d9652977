//! Page renderer backed by plain HTTP and `scraper`.
//!
//! Loading a page fetches its HTML and then waits the configured settle
//! delay, which stands in for a browser's "wait for dynamic content" pause.
//! Links are read from `<a href>` elements and resolved against the page's
//! final (post-redirect) URL.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::renderer::{LinkPattern, PageRenderer, RenderError, RendererFactory};

#[derive(Debug)]
struct LoadedPage {
    url: Url,
    html: String,
}

/// One HTTP rendering session.
#[derive(Debug)]
pub struct HttpPageRenderer {
    client: Client,
    settle_delay: Duration,
    page: Option<LoadedPage>,
}

impl HttpPageRenderer {
    #[must_use]
    pub fn new(client: Client, settle_delay: Duration) -> Self {
        Self {
            client,
            settle_delay,
            page: None,
        }
    }

    /// URL of the page currently loaded.
    #[must_use]
    pub fn current_url(&self) -> Option<&Url> {
        self.page.as_ref().map(|p| &p.url)
    }
}

#[async_trait]
impl PageRenderer for HttpPageRenderer {
    #[instrument(level = "debug", skip(self))]
    async fn load(&mut self, url: &str) -> Result<(), RenderError> {
        // A failed load must not leave the previous page answering queries.
        self.page = None;

        let parsed = Url::parse(url).map_err(|_| RenderError::InvalidUrl {
            url: url.to_string(),
        })?;
        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|source| RenderError::Navigation {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RenderError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let html = response
            .text()
            .await
            .map_err(|source| RenderError::Navigation {
                url: url.to_string(),
                source,
            })?;

        if !self.settle_delay.is_zero() {
            tokio::time::sleep(self.settle_delay).await;
        }

        debug!(final_url = %final_url, bytes = html.len(), "page loaded");
        self.page = Some(LoadedPage {
            url: final_url,
            html,
        });
        Ok(())
    }

    fn find_links(&self, pattern: &LinkPattern) -> Result<Vec<Url>, RenderError> {
        let page = self.page.as_ref().ok_or(RenderError::NoPageLoaded)?;
        let links = extract_html_links(&page.html, &page.url).map_err(|reason| {
            RenderError::Extraction {
                url: page.url.to_string(),
                reason,
            }
        })?;
        Ok(links
            .into_iter()
            .filter(|link| pattern.matches(link))
            .collect())
    }

    async fn close(&mut self) {
        self.page = None;
        debug!("renderer session closed");
    }
}

/// Opens [`HttpPageRenderer`] sessions sharing one reqwest client.
#[derive(Debug, Clone)]
pub struct HttpRendererFactory {
    client: Client,
    settle_delay: Duration,
}

impl HttpRendererFactory {
    #[must_use]
    pub fn new(client: Client, settle_delay: Duration) -> Self {
        Self {
            client,
            settle_delay,
        }
    }
}

#[async_trait]
impl RendererFactory for HttpRendererFactory {
    async fn open(&self) -> Result<Box<dyn PageRenderer>, RenderError> {
        Ok(Box::new(HttpPageRenderer::new(
            self.client.clone(),
            self.settle_delay,
        )))
    }
}

/// Extracts every absolute http(s) link from `html`, resolving relative
/// hrefs against `base`. Order follows the document; duplicates are dropped.
pub(crate) fn extract_html_links(html: &str, base: &Url) -> Result<Vec<Url>, String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("a[href]").map_err(|e| e.to_string())?;

    let mut links: Vec<Url> = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(mut url) = resolve_href(base, href) else {
            continue;
        };
        url.set_fragment(None);
        if !links.contains(&url) {
            links.push(url);
        }
    }
    Ok(links)
}

/// Resolves a possibly-relative href; `None` for non-http(s) targets such as
/// `mailto:` or `javascript:` and for unparsable values.
fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}
