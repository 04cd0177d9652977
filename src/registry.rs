//! Process-wide record of which document filenames have been downloaded.
//!
//! The registry is the only state shared between product pipelines. Every
//! read and write goes through a single [`Mutex`], and every critical section
//! is a map lookup or insert: the lock is never held across network or disk
//! I/O.
//!
//! # Claim protocol
//!
//! ```text
//! (absent) --try_claim--> InFlight --commit------> Committed(path)
//!                            |
//!                            +----mark_failed----> Failed
//! ```
//!
//! `try_claim` is a single check-and-reserve, so at most one caller proceeds
//! per filename. A `Committed` entry is never overwritten or removed. Whether
//! a `Failed` entry can be claimed again depends on the [`FailurePolicy`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::product::Product;

/// What happens to a filename whose download failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// A later claim may retry the filename.
    #[default]
    Reclaimable,
    /// The filename stays reserved for the rest of the run.
    Sticky,
}

/// Lifecycle of a registered filename. Absence from the map means unclaimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    /// Claimed; the download has not finished.
    InFlight,
    /// Bytes fully written to this path.
    Committed(PathBuf),
    /// The claimant's download failed.
    Failed,
}

#[derive(Debug, Default)]
struct RegistryState {
    files: HashMap<String, ClaimState>,
    aggregated: HashSet<Product>,
}

/// Shared filename dedup map plus per-product aggregation flags.
///
/// Wrap in an `Arc` and hand a clone to each pipeline.
#[derive(Debug, Default)]
pub struct DedupRegistry {
    state: Mutex<RegistryState>,
    policy: FailurePolicy,
}

impl DedupRegistry {
    /// Creates an empty registry with the default (reclaimable) policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry with an explicit failure policy.
    #[must_use]
    pub fn with_policy(policy: FailurePolicy) -> Self {
        Self {
            state: Mutex::default(),
            policy,
        }
    }

    #[must_use]
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    // A panicking holder cannot leave the maps half-updated: every critical
    // section is a single lookup or insert.
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Atomically reserves `filename` for download.
    ///
    /// Returns `true` if the caller now owns the download and must finish
    /// with [`commit`](Self::commit) or [`mark_failed`](Self::mark_failed).
    /// Returns `false` if the filename is in flight, committed, or (under
    /// [`FailurePolicy::Sticky`]) failed; the caller must skip it.
    #[must_use = "a successful claim obliges the caller to commit or mark_failed"]
    pub fn try_claim(&self, filename: &str) -> bool {
        let mut state = self.lock();
        let claimable = match state.files.get(filename) {
            None => true,
            Some(ClaimState::Failed) => self.policy == FailurePolicy::Reclaimable,
            Some(ClaimState::InFlight | ClaimState::Committed(_)) => false,
        };
        if claimable {
            state
                .files
                .insert(filename.to_string(), ClaimState::InFlight);
        }
        claimable
    }

    /// Records that `filename` is fully written at `path`.
    ///
    /// Returns `true` if this call recorded the path. An existing
    /// `Committed` entry is left untouched and `false` is returned, so a
    /// racing or repeated commit can never replace the first path.
    pub fn commit(&self, filename: &str, path: &Path) -> bool {
        let mut state = self.lock();
        if let Some(ClaimState::Committed(existing)) = state.files.get(filename) {
            if existing != path {
                warn!(
                    filename,
                    existing = %existing.display(),
                    attempted = %path.display(),
                    "ignoring commit for already committed filename"
                );
            }
            return false;
        }
        state.files.insert(
            filename.to_string(),
            ClaimState::Committed(path.to_path_buf()),
        );
        true
    }

    /// Releases a claim whose download failed.
    ///
    /// Committed entries are never downgraded.
    pub fn mark_failed(&self, filename: &str) {
        let mut state = self.lock();
        match state.files.get(filename) {
            Some(ClaimState::Committed(_)) => {
                debug!(filename, "not marking committed filename as failed");
            }
            _ => {
                state.files.insert(filename.to_string(), ClaimState::Failed);
            }
        }
    }

    /// Read-only check used by discovery to drop already downloaded files
    /// early. A later [`try_claim`](Self::try_claim) remains authoritative.
    #[must_use]
    pub fn is_downloaded(&self, filename: &str) -> bool {
        matches!(
            self.lock().files.get(filename),
            Some(ClaimState::Committed(_))
        )
    }

    /// Current state of `filename`, `None` if never claimed.
    #[must_use]
    pub fn state_of(&self, filename: &str) -> Option<ClaimState> {
        self.lock().files.get(filename).cloned()
    }

    /// Local path of a committed filename.
    #[must_use]
    pub fn path_of(&self, filename: &str) -> Option<PathBuf> {
        match self.lock().files.get(filename) {
            Some(ClaimState::Committed(path)) => Some(path.clone()),
            _ => None,
        }
    }

    /// Snapshot of every committed filename and its path, sorted by name.
    #[must_use]
    pub fn committed(&self) -> BTreeMap<String, PathBuf> {
        self.lock()
            .files
            .iter()
            .filter_map(|(name, state)| match state {
                ClaimState::Committed(path) => Some((name.clone(), path.clone())),
                _ => None,
            })
            .collect()
    }

    /// Flags a product as having produced its aggregated artifact.
    pub fn mark_aggregated(&self, product: &Product) {
        self.lock().aggregated.insert(product.clone());
    }

    #[must_use]
    pub fn is_aggregated(&self, product: &Product) -> bool {
        self.lock().aggregated.contains(product)
    }
}
