//! Download phase of a product pipeline.
//!
//! The [`DocumentDownloader`] takes a product's deduplicated candidate set
//! and, for each candidate, claims its filename in the [`DedupRegistry`],
//! fetches it into the product directory, and commits or releases the claim.
//!
//! Candidates within one product are downloaded sequentially; parallelism
//! comes from running several product pipelines at once.

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use super::{ByteFetcher, DownloadError};
use crate::discovery::DocumentCandidate;
use crate::product::{OutputLayout, Product};
use crate::registry::DedupRegistry;

/// Counts from one product's download phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadStats {
    /// Candidates fetched and committed.
    pub completed: usize,
    /// Candidates whose filename was already claimed.
    pub skipped: usize,
    /// Candidates whose fetch failed.
    pub failed: usize,
}

impl DownloadStats {
    /// Returns the number of candidates looked at.
    #[must_use]
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.failed
    }
}

/// Outcome for a single candidate.
#[derive(Debug)]
enum CandidateOutcome {
    Completed,
    Skipped,
    Failed(DownloadError),
}

/// Drives claim, fetch, and commit for one product's candidates.
pub struct DocumentDownloader<'a> {
    fetcher: &'a dyn ByteFetcher,
    registry: &'a DedupRegistry,
    layout: &'a OutputLayout,
}

impl<'a> DocumentDownloader<'a> {
    #[must_use]
    pub fn new(
        fetcher: &'a dyn ByteFetcher,
        registry: &'a DedupRegistry,
        layout: &'a OutputLayout,
    ) -> Self {
        Self {
            fetcher,
            registry,
            layout,
        }
    }

    /// Downloads every candidate whose filename this call manages to claim.
    ///
    /// Individual failures are logged and counted, never returned: one bad
    /// document does not stop the rest of the product.
    #[instrument(skip(self, candidates), fields(product = %product))]
    pub async fn download_all(
        &self,
        product: &Product,
        candidates: &BTreeSet<DocumentCandidate>,
    ) -> DownloadStats {
        let mut stats = DownloadStats::default();

        for candidate in candidates {
            match self.download_one(product, candidate).await {
                CandidateOutcome::Completed => stats.completed += 1,
                CandidateOutcome::Skipped => stats.skipped += 1,
                CandidateOutcome::Failed(e) => {
                    warn!(
                        url = %candidate.url,
                        filename = %candidate.filename,
                        error = %e,
                        "failed to download document"
                    );
                    stats.failed += 1;
                }
            }
        }

        info!(
            completed = stats.completed,
            skipped = stats.skipped,
            failed = stats.failed,
            "download phase complete"
        );
        stats
    }

    async fn download_one(&self, product: &Product, candidate: &DocumentCandidate) -> CandidateOutcome {
        let filename = candidate.filename.as_str();
        if !self.registry.try_claim(filename) {
            debug!(filename, url = %candidate.url, "already downloaded or in progress, skipping");
            return CandidateOutcome::Skipped;
        }

        let product_dir = self.layout.product_dir(product);
        if let Err(e) = tokio::fs::create_dir_all(&product_dir).await {
            self.registry.mark_failed(filename);
            return CandidateOutcome::Failed(DownloadError::io(product_dir, e));
        }

        let dest = self.layout.document_path(product, filename);
        info!(url = %candidate.url, "downloading");
        match self.fetcher.fetch_to_path(candidate.url.as_str(), &dest).await {
            Ok(fetched) => {
                self.registry.commit(filename, &fetched.path);
                debug!(filename, path = %fetched.path.display(), "saved");
                CandidateOutcome::Completed
            }
            Err(e) => {
                self.registry.mark_failed(filename);
                CandidateOutcome::Failed(e)
            }
        }
    }
}
