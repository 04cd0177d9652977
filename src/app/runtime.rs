//! Wires the production components together and runs the crawl.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use doc_bundler::aggregate::AggregationOutcome;
use doc_bundler::progress::should_show_progress;
use doc_bundler::{
    ConcatAggregator, CrawlConfig, DedupRegistry, DownloadProgress, HttpClient,
    HttpRendererFactory, Pipeline, ProductScheduler, ProductStatus, RunReport,
};
use tracing::{info, warn};

use super::terminal;

/// Runs every configured product with the HTTP fetcher and renderer.
pub(crate) async fn run_crawl(config: CrawlConfig, quiet: bool) -> Result<RunReport> {
    let progress = if should_show_progress(
        io::stderr().is_terminal(),
        quiet,
        terminal::is_dumb_terminal(),
    ) {
        DownloadProgress::visible()
    } else {
        DownloadProgress::hidden()
    };

    let client = HttpClient::new_with_timeouts(config.connect_timeout_secs, config.read_timeout_secs)
        .with_progress(progress);
    let renderers = HttpRendererFactory::new(client.inner().clone(), config.settle_delay);
    let registry = Arc::new(DedupRegistry::with_policy(config.failure_policy));

    info!(
        base_url = %config.base_url,
        output = %config.output_root.display(),
        products = config.products.len(),
        workers = config.workers,
        extension = %config.extension,
        "doc-bundler starting"
    );

    let pipeline = Pipeline::new(
        Arc::new(config),
        registry,
        Arc::new(client),
        Arc::new(ConcatAggregator),
        Arc::new(renderers),
    );
    let scheduler = ProductScheduler::new(pipeline)?;
    let report = scheduler.run().await.context("Crawl could not start")?;
    Ok(report)
}

/// Logs one line per product and a run total.
pub(crate) fn log_run_report(report: &RunReport) {
    for outcome in &report.outcomes {
        match (&outcome.status, &outcome.report) {
            (ProductStatus::Completed, Some(product_report)) => {
                let artifact = match &product_report.aggregation {
                    AggregationOutcome::Created { path, .. } => path.display().to_string(),
                    AggregationOutcome::SkippedNoDirectory
                    | AggregationOutcome::SkippedNoDocuments => "none".to_string(),
                };
                info!(
                    product = %outcome.product,
                    candidates = product_report.candidates,
                    downloaded = product_report.downloads.completed,
                    skipped = product_report.downloads.skipped,
                    failed = product_report.downloads.failed,
                    total_mb = %format!("{:.2}", product_report.sizes.total_megabytes()),
                    artifact = %artifact,
                    "product complete"
                );
            }
            _ => warn!(
                product = %outcome.product,
                error = outcome.error.as_deref().unwrap_or("unknown failure"),
                "product failed"
            ),
        }
    }
    info!(
        completed = report.completed(),
        failed = report.failed(),
        downloaded_files = report.downloaded_files,
        "All products processed"
    );
}

/// Writes the report as pretty JSON to stdout.
pub(crate) fn print_json_report(report: &RunReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{json}").context("Failed to write run report")?;
    Ok(())
}
