//! Layers defaults, the config file and CLI flags into a [`CrawlConfig`].

use std::time::Duration;

use anyhow::{Context, Result};
use doc_bundler::config::{
    CrawlConfig, normalize_base_url, normalize_extension, parse_products,
};
use doc_bundler::registry::FailurePolicy;
use tracing::debug;

use super::config_file::FileConfig;
use crate::cli::Args;

/// Builds the run configuration. CLI flags win over the file, the file over
/// built-in defaults.
pub(crate) fn resolve_crawl_config(args: &Args, file: Option<FileConfig>) -> Result<CrawlConfig> {
    let file = file.unwrap_or_default();
    let mut config = CrawlConfig::default();

    if let Some(raw) = args.base_url.as_deref().or(file.base_url.as_deref()) {
        config.base_url = normalize_base_url(raw)?;
    }
    if let Some(dir) = args.output_dir.clone().or(file.output_dir) {
        config.output_root = dir;
    }
    if let Some(depth) = args.max_depth.or(file.max_depth) {
        config.max_depth = depth;
    }
    if let Some(workers) = args.workers.map(usize::from).or(file.workers) {
        config.workers = workers;
    }
    if let Some(raw) = args.extension.as_deref().or(file.extension.as_deref()) {
        config.extension = normalize_extension(raw)?;
    }
    if let Some(marker) = args.version_marker.clone().or(file.version_marker) {
        config.version_marker = marker;
    }

    let products = if args.products.is_empty() {
        file.products
    } else {
        Some(args.products.clone())
    };
    if let Some(ids) = products {
        config.products = parse_products(ids.iter().map(|id| id.trim()))?;
    }

    if let Some(ms) = args.settle_ms.or(file.settle_ms) {
        config.settle_delay = Duration::from_millis(ms);
    }
    if let Some(secs) = file.connect_timeout_secs {
        config.connect_timeout_secs = secs;
    }
    if let Some(secs) = file.read_timeout_secs {
        config.read_timeout_secs = secs;
    }
    if args.sticky_failures || file.sticky_failures.unwrap_or(false) {
        config.failure_policy = FailurePolicy::Sticky;
    }

    config.validate().context("Invalid configuration")?;
    debug!(?config, "resolved crawl configuration");
    Ok(config)
}
