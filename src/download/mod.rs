//! Document fetching and the per-product download phase.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large files)
//! - Filenames derived from the URL path, used as the run-wide dedup key
//! - Configurable timeouts (30s connect, 5min read by default)
//! - Structured error types with full context
//! - Claim/commit against the shared [`DedupRegistry`](crate::registry::DedupRegistry)

use std::path::{Path, PathBuf};

use async_trait::async_trait;

mod client;
pub mod constants;
mod engine;
mod error;
pub mod filename;

pub use client::HttpClient;
pub use engine::{DocumentDownloader, DownloadStats};
pub use error::DownloadError;
pub use filename::{document_filename, has_extension, name_has_extension};

/// A document fully written to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedDocument {
    /// Where the bytes were written.
    pub path: PathBuf,
    /// Bytes written.
    pub bytes: u64,
    /// Size announced by the server, when known.
    pub content_length: Option<u64>,
}

/// Retrieves a document's bytes into a local file.
///
/// Implementations must stream (never buffer the whole document), report
/// non-2xx and connection failures as errors, and only return `Ok` once the
/// file is completely written and flushed.
#[async_trait]
pub trait ByteFetcher: Send + Sync {
    /// Fetches `url` into `dest`, replacing any existing file.
    async fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<FetchedDocument, DownloadError>;
}
