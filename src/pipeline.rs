//! One product's pipeline: discovery, download, aggregation, report.
//!
//! The steps run strictly in that order. The pipeline owns one renderer
//! session for its whole lifetime and closes it on every exit path, a
//! panicking step included.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::FutureExt;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

use crate::aggregate::{
    AggregateError, AggregationOutcome, Aggregator, SizeSummary, aggregate_product,
    summarize_sizes,
};
use crate::config::{ConfigError, CrawlConfig};
use crate::discovery::{LinkDiscovery, PageRenderer, RenderError, RendererFactory};
use crate::download::{ByteFetcher, DocumentDownloader, DownloadStats};
use crate::product::{OutputLayout, Product};
use crate::registry::DedupRegistry;

/// A failure that ends one product's pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No renderer session could be opened.
    #[error("cannot open renderer session: {0}")]
    Session(#[source] RenderError),

    /// The product's root URL could not be built.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Aggregation or the size summary failed.
    #[error("aggregation failed: {0}")]
    Aggregate(#[from] AggregateError),

    /// The pipeline task panicked or was aborted.
    #[error("pipeline task failed: {message}")]
    Task {
        /// Panic payload or cancellation reason.
        message: String,
    },
}

/// What one successful pipeline did.
#[derive(Debug, Clone, Serialize)]
pub struct ProductReport {
    pub product: Product,
    /// Pages searched for document links, root included.
    pub pages: usize,
    /// Distinct candidate URLs discovered.
    pub candidates: usize,
    pub downloads: DownloadStats,
    pub aggregation: AggregationOutcome,
    pub sizes: SizeSummary,
}

/// Everything a pipeline needs, shared by all pipelines of a run.
#[derive(Clone)]
pub struct Pipeline {
    config: Arc<CrawlConfig>,
    layout: OutputLayout,
    registry: Arc<DedupRegistry>,
    fetcher: Arc<dyn ByteFetcher>,
    aggregator: Arc<dyn Aggregator>,
    renderers: Arc<dyn RendererFactory>,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        config: Arc<CrawlConfig>,
        registry: Arc<DedupRegistry>,
        fetcher: Arc<dyn ByteFetcher>,
        aggregator: Arc<dyn Aggregator>,
        renderers: Arc<dyn RendererFactory>,
    ) -> Self {
        let layout = OutputLayout::new(config.output_root.clone());
        Self {
            config,
            layout,
            registry,
            fetcher,
            aggregator,
            renderers,
        }
    }

    #[must_use]
    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    #[must_use]
    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    #[must_use]
    pub fn registry(&self) -> &DedupRegistry {
        &self.registry
    }

    /// Runs the whole pipeline for `product`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when the session cannot be opened or
    /// aggregation fails. Page and download failures are logged, not
    /// returned.
    ///
    /// # Panics
    ///
    /// Re-raises a panic from any step once the session is closed.
    #[instrument(skip(self), fields(product = %product))]
    pub async fn run(&self, product: &Product) -> Result<ProductReport, PipelineError> {
        let mut renderer = self.renderers.open().await.map_err(PipelineError::Session)?;
        let result = AssertUnwindSafe(self.run_with_renderer(product, renderer.as_mut()))
            .catch_unwind()
            .await;
        renderer.close().await;
        match result {
            Ok(result) => result,
            Err(payload) => panic::resume_unwind(payload),
        }
    }

    async fn run_with_renderer(
        &self,
        product: &Product,
        renderer: &mut dyn PageRenderer,
    ) -> Result<ProductReport, PipelineError> {
        let config = &*self.config;
        let root = product.root_url(&config.base_url)?;
        info!(root = %root, "processing product");

        let discovery = LinkDiscovery::new(
            &config.base_url,
            &config.version_marker,
            &config.extension,
            &self.registry,
        );

        let related = discovery
            .discover_related_pages(renderer, &root, config.max_depth)
            .await;
        let mut pages: Vec<Url> = vec![root.clone()];
        pages.extend(related.into_iter().map(|link| link.url).filter(|url| *url != root));

        let mut candidates = std::collections::BTreeSet::new();
        for page in &pages {
            candidates.extend(
                discovery
                    .discover_document_links(renderer, page, product)
                    .await,
            );
        }
        info!(
            pages = pages.len(),
            candidates = candidates.len(),
            "discovery complete"
        );

        let downloads = DocumentDownloader::new(&*self.fetcher, &self.registry, &self.layout)
            .download_all(product, &candidates)
            .await;

        let aggregation = aggregate_product(
            &*self.aggregator,
            &self.layout,
            &self.registry,
            product,
            &config.extension,
        )
        .await?;

        let sizes = summarize_sizes(&self.layout.product_dir(product), &config.extension).await?;
        sizes.log(product);

        Ok(ProductReport {
            product: product.clone(),
            pages: pages.len(),
            candidates: candidates.len(),
            downloads,
            aggregation,
            sizes,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::aggregate::ConcatAggregator;
    use crate::config::normalize_base_url;
    use crate::discovery::tests::StaticRenderer;
    use crate::download::{DownloadError, FetchedDocument};

    /// Writes the URL's filename as the body.
    struct EchoFetcher;

    #[async_trait]
    impl ByteFetcher for EchoFetcher {
        async fn fetch_to_path(
            &self,
            url: &str,
            dest: &Path,
        ) -> Result<FetchedDocument, DownloadError> {
            let body = url.rsplit('/').next().unwrap_or_default().to_string();
            tokio::fs::write(dest, &body)
                .await
                .map_err(|e| DownloadError::io(dest, e))?;
            Ok(FetchedDocument {
                path: dest.to_path_buf(),
                bytes: body.len() as u64,
                content_length: None,
            })
        }
    }

    struct PanickingFetcher;

    #[async_trait]
    impl ByteFetcher for PanickingFetcher {
        async fn fetch_to_path(
            &self,
            _url: &str,
            _dest: &Path,
        ) -> Result<FetchedDocument, DownloadError> {
            panic!("fetcher blew up");
        }
    }

    /// Hands out one prepared renderer and records whether it was closed.
    struct OneShotFactory {
        renderer: Mutex<Option<StaticRenderer>>,
        closed: Arc<Mutex<bool>>,
    }

    struct ClosingRenderer {
        inner: StaticRenderer,
        closed: Arc<Mutex<bool>>,
    }

    #[async_trait]
    impl PageRenderer for ClosingRenderer {
        async fn load(&mut self, url: &str) -> Result<(), RenderError> {
            self.inner.load(url).await
        }

        fn find_links(
            &self,
            pattern: &crate::discovery::LinkPattern,
        ) -> Result<Vec<Url>, RenderError> {
            self.inner.find_links(pattern)
        }

        async fn close(&mut self) {
            *self.closed.lock().unwrap() = true;
        }
    }

    #[async_trait]
    impl RendererFactory for OneShotFactory {
        async fn open(&self) -> Result<Box<dyn PageRenderer>, RenderError> {
            let inner = self
                .renderer
                .lock()
                .unwrap()
                .take()
                .ok_or_else(|| RenderError::SessionUnavailable {
                    reason: "already opened".to_string(),
                })?;
            Ok(Box::new(ClosingRenderer {
                inner,
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn pipeline(temp: &TempDir, renderer: StaticRenderer) -> (Pipeline, Arc<Mutex<bool>>) {
        pipeline_with_fetcher(temp, renderer, Arc::new(EchoFetcher))
    }

    fn pipeline_with_fetcher(
        temp: &TempDir,
        renderer: StaticRenderer,
        fetcher: Arc<dyn ByteFetcher>,
    ) -> (Pipeline, Arc<Mutex<bool>>) {
        let config = CrawlConfig {
            base_url: normalize_base_url("https://example.com/").unwrap(),
            output_root: temp.path().to_path_buf(),
            extension: "doc".to_string(),
            ..CrawlConfig::default()
        };
        let closed = Arc::new(Mutex::new(false));
        let factory = OneShotFactory {
            renderer: Mutex::new(Some(renderer)),
            closed: Arc::clone(&closed),
        };
        let pipeline = Pipeline::new(
            Arc::new(config),
            Arc::new(DedupRegistry::new()),
            fetcher,
            Arc::new(ConcatAggregator),
            Arc::new(factory),
        );
        (pipeline, closed)
    }

    #[tokio::test]
    async fn test_pipeline_collects_documents_from_root_and_related_pages() {
        let temp = TempDir::new().unwrap();
        let renderer = StaticRenderer::default()
            .with_page(
                "https://example.com/ec2/",
                &[
                    "https://example.com/ec2/latest/ug/",
                    "https://example.com/b.doc",
                ],
            )
            .with_page(
                "https://example.com/ec2/latest/ug/",
                &["https://example.com/ug/a.doc", "https://example.com/again/b.doc"],
            );
        let (pipeline, closed) = pipeline(&temp, renderer);
        let product = Product::new("ec2").unwrap();

        let report = pipeline.run(&product).await.unwrap();

        assert_eq!(report.pages, 2);
        assert_eq!(report.candidates, 3);
        assert_eq!(report.downloads.completed, 2);
        assert_eq!(report.downloads.skipped, 1);
        assert_eq!(report.sizes.file_count(), 2);
        let artifact = pipeline.layout().artifact_path(&product, "doc");
        assert_eq!(std::fs::read_to_string(artifact).unwrap(), "a.docb.doc");
        assert!(pipeline.registry().is_aggregated(&product));
        assert!(*closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_pipeline_with_unreachable_root_reports_nothing_and_closes_session() {
        let temp = TempDir::new().unwrap();
        let (pipeline, closed) = pipeline(&temp, StaticRenderer::default());
        let product = Product::new("ec2").unwrap();

        let report = pipeline.run(&product).await.unwrap();

        assert_eq!(report.candidates, 0);
        assert_eq!(report.aggregation, AggregationOutcome::SkippedNoDirectory);
        assert_eq!(report.sizes.file_count(), 0);
        assert!(*closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_pipeline_closes_session_when_a_step_panics() {
        let temp = TempDir::new().unwrap();
        let renderer = StaticRenderer::default()
            .with_page("https://example.com/ec2/", &["https://example.com/a.doc"]);
        let (pipeline, closed) =
            pipeline_with_fetcher(&temp, renderer, Arc::new(PanickingFetcher));
        let product = Product::new("ec2").unwrap();

        let joined = tokio::spawn(async move { pipeline.run(&product).await }).await;

        assert!(joined.unwrap_err().is_panic());
        assert!(*closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_pipeline_session_failure_is_an_error() {
        let temp = TempDir::new().unwrap();
        let (pipeline, _closed) = pipeline(&temp, StaticRenderer::default());
        let product = Product::new("ec2").unwrap();
        pipeline.run(&product).await.unwrap();

        // The factory hands out a single session.
        let err = pipeline.run(&product).await.unwrap_err();
        assert!(matches!(err, PipelineError::Session(_)));
    }
}
