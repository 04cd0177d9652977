//! HTTP client wrapper for streaming documents to disk.
//!
//! This module provides the `HttpClient` struct, the production
//! [`ByteFetcher`]. One client is built per run and shared by every
//! pipeline (reqwest clients pool connections internally and are cheap to
//! clone).

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument};
use url::Url;

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;
use super::{ByteFetcher, FetchedDocument};
use crate::progress::DownloadProgress;
use crate::user_agent;

/// HTTP client for downloading files with streaming support.
///
/// # Example
///
/// ```no_run
/// use doc_bundler::download::{ByteFetcher, HttpClient};
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = HttpClient::new();
/// let fetched = client
///     .fetch_to_path("https://example.com/guide.pdf", Path::new("./guide.pdf"))
///     .await?;
/// println!("Downloaded {} bytes", fetched.bytes);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    progress: DownloadProgress,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a new HTTP client with default timeouts.
    ///
    /// Default configuration:
    /// - Connect timeout: 30 seconds
    /// - Read timeout: 5 minutes (for large files)
    /// - Gzip decompression: enabled
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a new HTTP client with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            progress: DownloadProgress::hidden(),
        }
    }

    /// Attaches progress bars to subsequent downloads.
    #[must_use]
    pub fn with_progress(mut self, progress: DownloadProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Returns a reference to the underlying reqwest client.
    ///
    /// Shared with the HTTP page renderer so pages and documents reuse one
    /// connection pool.
    #[must_use]
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn send_get(&self, url: &str) -> Result<reqwest::Response, DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| DownloadError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::http_status(url, status.as_u16()));
        }
        Ok(response)
    }
}

#[async_trait]
impl ByteFetcher for HttpClient {
    /// Streams `url` into `dest`.
    ///
    /// No file is created for a non-2xx response. A failure mid-stream
    /// removes the partial file. On success the data has been flushed and
    /// synced before this returns.
    #[instrument(skip(self), fields(url = %url, dest = %dest.display()))]
    async fn fetch_to_path(&self, url: &str, dest: &Path) -> Result<FetchedDocument, DownloadError> {
        debug!("starting download");
        Url::parse(url).map_err(|_| DownloadError::invalid_url(url))?;

        let response = self.send_get(url).await?;
        let content_length = response.content_length();

        let file = File::create(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        let label = dest
            .file_name()
            .map_or_else(|| url.to_string(), |n| n.to_string_lossy().into_owned());
        let bar = self.progress.start(&label, content_length);

        let stream_result = stream_to_file(file, response, url, dest, &bar).await;
        bar.finish_and_clear();

        let bytes = match stream_result {
            Ok(bytes) => bytes,
            Err(e) => {
                debug!(path = %dest.display(), "cleaning up partial file after error");
                let _ = tokio::fs::remove_file(dest).await;
                return Err(e);
            }
        };

        info!(path = %dest.display(), bytes, "download complete");

        Ok(FetchedDocument {
            path: dest.to_path_buf(),
            bytes,
            content_length,
        })
    }
}

/// Streams response body to file, returning bytes written.
///
/// This is extracted to enable cleanup on error in the caller.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
    bar: &indicatif::ProgressBar,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::network(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
        bar.inc(chunk.len() as u64);
    }

    // Aggregation may read the file as soon as this returns.
    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;
    writer
        .get_ref()
        .sync_all()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
