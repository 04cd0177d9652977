//! Per-product size summary.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use super::{AggregateError, list_documents};
use crate::product::Product;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Size of one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSize {
    pub name: String,
    pub bytes: u64,
}

impl FileSize {
    /// Size in binary megabytes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn megabytes(&self) -> f64 {
        self.bytes as f64 / BYTES_PER_MB
    }
}

/// Sizes of every matching document in a product directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SizeSummary {
    pub files: Vec<FileSize>,
    pub total_bytes: u64,
}

impl SizeSummary {
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Total size in binary megabytes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn total_megabytes(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_MB
    }

    /// Logs one line per file and a total, in MB with two decimals.
    pub fn log(&self, product: &Product) {
        info!(product = %product, files = self.file_count(), "size summary");
        for file in &self.files {
            info!(product = %product, "  - {}: {:.2} MB", file.name, file.megabytes());
        }
        info!(product = %product, "  Total size: {:.2} MB", self.total_megabytes());
    }
}

/// Measures every file with the target extension currently in `dir`,
/// whether or not aggregation ran. A missing directory yields an empty
/// summary.
///
/// # Errors
///
/// Returns [`AggregateError::Listing`] if the directory cannot be read.
pub async fn summarize_sizes(dir: &Path, extension: &str) -> Result<SizeSummary, AggregateError> {
    let Some(paths) = list_documents(dir, extension).await? else {
        return Ok(SizeSummary::default());
    };

    let mut summary = SizeSummary::default();
    for path in paths {
        let bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot stat document, skipping");
                continue;
            }
        };
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        summary.total_bytes += bytes;
        summary.files.push(FileSize { name, bytes });
    }
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_summary_of_missing_dir_is_zero() {
        let temp = TempDir::new().unwrap();
        let summary = summarize_sizes(&temp.path().join("absent"), "pdf").await.unwrap();
        assert_eq!(summary.file_count(), 0);
        assert_eq!(summary.total_bytes, 0);
        assert!(summary.total_megabytes().abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_summary_counts_only_matching_files() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.pdf"), vec![0u8; 1024 * 1024]).unwrap();
        std::fs::write(temp.path().join("b.pdf"), vec![0u8; 512 * 1024]).unwrap();
        std::fs::write(temp.path().join("c.txt"), b"ignored").unwrap();

        let summary = summarize_sizes(temp.path(), "pdf").await.unwrap();

        assert_eq!(summary.file_count(), 2);
        assert_eq!(summary.files[0].name, "a.pdf");
        assert!((summary.files[0].megabytes() - 1.0).abs() < 1e-9);
        assert!((summary.total_megabytes() - 1.5).abs() < 1e-9);
    }
}
