//! Aggregation of a product's downloaded documents into one artifact.
//!
//! After a product's download phase returns, every file in its directory
//! with the target extension is combined, in ascending filename order, into
//! `<products>/<product>.<ext>`. An empty or missing product directory is a
//! no-op with a diagnostic, not an error.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{info, instrument, warn};

mod report;

pub use report::{FileSize, SizeSummary, summarize_sizes};

use crate::download::name_has_extension;
use crate::product::{OutputLayout, Product};
use crate::registry::DedupRegistry;

/// Failures while producing an aggregated artifact.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// An input document could not be read.
    #[error("cannot read input {path}: {source}")]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The artifact could not be written.
    #[error("cannot write artifact {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The product directory could not be listed.
    #[error("cannot list {path}: {source}")]
    Listing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// `combine` was called without inputs.
    #[error("no input files to combine")]
    NoInputs,
}

/// Combines documents into one output file.
///
/// Implementations must keep input order and must fail (never truncate
/// silently) when an input cannot be read.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn combine(&self, inputs: &[PathBuf], output: &Path) -> Result<(), AggregateError>;
}

/// Byte-level concatenation of the inputs.
///
/// Writes to `<output>.part` first and renames into place, so a failure
/// never leaves a partial artifact behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcatAggregator;

#[async_trait]
impl Aggregator for ConcatAggregator {
    async fn combine(&self, inputs: &[PathBuf], output: &Path) -> Result<(), AggregateError> {
        if inputs.is_empty() {
            return Err(AggregateError::NoInputs);
        }

        let part = part_path(output);
        let result = concat_into(inputs, &part).await;
        if let Err(e) = result {
            let _ = fs::remove_file(&part).await;
            return Err(e);
        }

        fs::rename(&part, output)
            .await
            .map_err(|source| AggregateError::Output {
                path: output.to_path_buf(),
                source,
            })
    }
}

async fn concat_into(inputs: &[PathBuf], part: &Path) -> Result<(), AggregateError> {
    let output_err = |source| AggregateError::Output {
        path: part.to_path_buf(),
        source,
    };
    let file = File::create(part).await.map_err(output_err)?;
    let mut writer = BufWriter::new(file);

    for input in inputs {
        let mut reader = File::open(input)
            .await
            .map_err(|source| AggregateError::UnreadableInput {
                path: input.clone(),
                source,
            })?;
        tokio::io::copy(&mut reader, &mut writer)
            .await
            .map_err(|source| AggregateError::UnreadableInput {
                path: input.clone(),
                source,
            })?;
    }

    writer.flush().await.map_err(output_err)?;
    writer.get_ref().sync_all().await.map_err(output_err)?;
    Ok(())
}

fn part_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Files in `dir` whose name ends with `.<extension>`, sorted by filename.
///
/// Returns `Ok(None)` when `dir` does not exist.
///
/// # Errors
///
/// Returns [`AggregateError::Listing`] if the directory cannot be read.
pub async fn list_documents(
    dir: &Path,
    extension: &str,
) -> Result<Option<Vec<PathBuf>>, AggregateError> {
    let listing_err = |source| AggregateError::Listing {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(listing_err(e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(listing_err)? {
        let is_file = entry.file_type().await.map_err(listing_err)?.is_file();
        let name = entry.file_name();
        if is_file && name_has_extension(&name.to_string_lossy(), extension) {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(Some(files))
}

/// Result of the aggregation step for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AggregationOutcome {
    /// The artifact was written from `inputs` files.
    Created { path: PathBuf, inputs: usize },
    /// The product directory does not exist.
    SkippedNoDirectory,
    /// The product directory holds no matching files.
    SkippedNoDocuments,
}

/// Aggregates one product's documents and flags the product in the registry
/// on success.
///
/// # Errors
///
/// Returns [`AggregateError`] if listing fails or the aggregator fails.
#[instrument(skip(aggregator, layout, registry), fields(product = %product))]
pub async fn aggregate_product(
    aggregator: &dyn Aggregator,
    layout: &OutputLayout,
    registry: &DedupRegistry,
    product: &Product,
    extension: &str,
) -> Result<AggregationOutcome, AggregateError> {
    let product_dir = layout.product_dir(product);
    let Some(inputs) = list_documents(&product_dir, extension).await? else {
        warn!("no files found, skipping aggregation");
        return Ok(AggregationOutcome::SkippedNoDirectory);
    };
    if inputs.is_empty() {
        warn!(extension, "no documents found, skipping aggregation");
        return Ok(AggregationOutcome::SkippedNoDocuments);
    }

    let output = layout.artifact_path(product, extension);
    info!(inputs = inputs.len(), "aggregating documents");
    aggregator.combine(&inputs, &output).await?;
    registry.mark_aggregated(product);
    info!(path = %output.display(), "aggregated artifact created");

    Ok(AggregationOutcome::Created {
        path: output,
        inputs: inputs.len(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    #[tokio::test]
    async fn test_list_documents_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "b.pdf", "b");
        write(temp.path(), "a.pdf", "a");
        write(temp.path(), "notes.txt", "x");
        std::fs::create_dir(temp.path().join("dir.pdf")).unwrap();

        let files = list_documents(temp.path(), "pdf").await.unwrap().unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.pdf", "b.pdf"]);
    }

    #[tokio::test]
    async fn test_list_documents_matches_extension_in_any_case() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "Guide.PDF", "G");
        write(temp.path(), "api.pdf", "a");
        write(temp.path(), "draft.pdf.part", "x");

        let files = list_documents(temp.path(), "pdf").await.unwrap().unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["Guide.PDF", "api.pdf"]);
    }

    #[tokio::test]
    async fn test_list_documents_missing_dir_is_none() {
        let temp = TempDir::new().unwrap();
        let listed = list_documents(&temp.path().join("absent"), "pdf").await.unwrap();
        assert!(listed.is_none());
    }

    #[tokio::test]
    async fn test_concat_preserves_input_order() {
        let temp = TempDir::new().unwrap();
        let first = write(temp.path(), "2.pdf", "second;");
        let second = write(temp.path(), "1.pdf", "first;");
        let output = temp.path().join("out.pdf");

        ConcatAggregator
            .combine(&[first, second], &output)
            .await
            .unwrap();

        assert_eq!(std::fs::read_to_string(&output).unwrap(), "second;first;");
        assert!(!part_path(&output).exists());
    }

    #[tokio::test]
    async fn test_concat_fails_loudly_on_unreadable_input() {
        let temp = TempDir::new().unwrap();
        let present = write(temp.path(), "a.pdf", "a");
        let missing = temp.path().join("missing.pdf");
        let output = temp.path().join("out.pdf");

        let err = ConcatAggregator
            .combine(&[present, missing.clone()], &output)
            .await
            .unwrap_err();

        assert!(matches!(err, AggregateError::UnreadableInput { ref path, .. } if *path == missing));
        assert!(!output.exists());
        assert!(!part_path(&output).exists());
    }

    #[tokio::test]
    async fn test_concat_rejects_empty_inputs() {
        let temp = TempDir::new().unwrap();
        let err = ConcatAggregator
            .combine(&[], &temp.path().join("out.pdf"))
            .await
            .unwrap_err();
        assert!(matches!(err, AggregateError::NoInputs));
    }

    #[tokio::test]
    async fn test_aggregate_product_combines_sorted_files_and_flags_product() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path());
        let registry = DedupRegistry::new();
        let product = Product::new("ec2").unwrap();
        let dir = layout.product_dir(&product);
        write(&dir, "b.pdf", "B");
        write(&dir, "a.pdf", "A");

        let outcome = aggregate_product(&ConcatAggregator, &layout, &registry, &product, "pdf")
            .await
            .unwrap();

        let artifact = layout.artifact_path(&product, "pdf");
        assert_eq!(
            outcome,
            AggregationOutcome::Created {
                path: artifact.clone(),
                inputs: 2
            }
        );
        assert_eq!(std::fs::read_to_string(artifact).unwrap(), "AB");
        assert!(registry.is_aggregated(&product));
    }

    #[tokio::test]
    async fn test_aggregate_product_rerun_yields_same_order() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path());
        let registry = DedupRegistry::new();
        let product = Product::new("ec2").unwrap();
        let dir = layout.product_dir(&product);
        write(&dir, "z.pdf", "Z");
        write(&dir, "m.pdf", "M");

        for _ in 0..2 {
            aggregate_product(&ConcatAggregator, &layout, &registry, &product, "pdf")
                .await
                .unwrap();
            let body = std::fs::read_to_string(layout.artifact_path(&product, "pdf")).unwrap();
            assert_eq!(body, "MZ");
        }
    }

    #[tokio::test]
    async fn test_aggregate_product_skips_missing_and_empty_dirs() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path());
        let registry = DedupRegistry::new();
        let product = Product::new("ec2").unwrap();

        let outcome = aggregate_product(&ConcatAggregator, &layout, &registry, &product, "pdf")
            .await
            .unwrap();
        assert_eq!(outcome, AggregationOutcome::SkippedNoDirectory);

        std::fs::create_dir_all(layout.product_dir(&product)).unwrap();
        let outcome = aggregate_product(&ConcatAggregator, &layout, &registry, &product, "pdf")
            .await
            .unwrap();
        assert_eq!(outcome, AggregationOutcome::SkippedNoDocuments);
        assert!(!layout.artifact_path(&product, "pdf").exists());
        assert!(!registry.is_aggregated(&product));
    }
}
