//! doc-bundler core library
//!
//! Crawls the documentation section of each configured product, downloads
//! every linked document of the target type exactly once per run, and
//! combines each product's documents into a single artifact.
//!
//! # Architecture
//!
//! - [`config`] - Run options, defaults and validation
//! - [`product`] - Product identifiers and the output directory layout
//! - [`registry`] - Run-wide filename dedup registry
//! - [`discovery`] - Page renderer seam and link discovery
//! - [`download`] - Streaming HTTP fetcher and the per-product download phase
//! - [`aggregate`] - Artifact aggregation and size summaries
//! - [`pipeline`] - One product, end to end
//! - [`scheduler`] - Bounded pool of product pipelines

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod config;
pub mod discovery;
pub mod download;
pub mod pipeline;
pub mod product;
pub mod progress;
pub mod registry;
pub mod scheduler;
mod user_agent;

// Re-export commonly used types
pub use aggregate::{AggregateError, AggregationOutcome, Aggregator, ConcatAggregator};
pub use config::{ConfigError, CrawlConfig};
pub use discovery::{HttpRendererFactory, LinkDiscovery, PageRenderer, RenderError, RendererFactory};
pub use download::{ByteFetcher, DocumentDownloader, DownloadError, DownloadStats, HttpClient};
pub use pipeline::{Pipeline, PipelineError, ProductReport};
pub use product::{OutputLayout, Product};
pub use progress::DownloadProgress;
pub use registry::{DedupRegistry, FailurePolicy};
pub use scheduler::{ProductOutcome, ProductScheduler, ProductStatus, RunReport, SchedulerError};
