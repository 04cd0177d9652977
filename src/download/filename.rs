//! Filename derivation for discovered document URLs.
//!
//! The filename is the dedup key across the whole run, so it must be stable
//! for a given URL path: the final path segment, percent-decoded, with
//! characters that are invalid on common filesystems replaced.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Component, Path};

use tracing::debug;
use url::Url;

use super::constants::{MAX_EXTENSION_BYTES, MAX_FILENAME_BYTES};

/// Returns the document filename for `url`, or `None` if the URL has no
/// usable final path segment (e.g. it ends in `/`).
///
/// The query string and fragment never contribute to the name.
#[must_use]
pub fn document_filename(url: &Url) -> Option<String> {
    let last = url.path_segments()?.next_back()?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).unwrap_or_else(|e| {
        debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
        last.into()
    });
    let name = sanitize_filename(&decoded);
    (!name.trim_matches('_').is_empty() && is_safe_filename_segment(&name)).then_some(name)
}

/// Returns true if the URL path ends with `.<extension>` (case-insensitive).
///
/// `extension` is expected lowercase and without the dot.
#[must_use]
pub fn has_extension(url: &Url, extension: &str) -> bool {
    name_has_extension(url.path(), extension)
}

/// Returns true if `name` ends with `.<extension>`, ignoring case.
///
/// Discovery and aggregation both select documents through this check, so a
/// file that was downloaded is always listed again.
#[must_use]
pub fn name_has_extension(name: &str, extension: &str) -> bool {
    let lower = name.to_lowercase();
    let suffix = format!(".{extension}");
    lower.len() > suffix.len() && lower.ends_with(&suffix)
}

/// Replaces characters that are invalid on common filesystems:
/// / \ : * ? " < > | and control characters.
///
/// Names longer than [`MAX_FILENAME_BYTES`] keep their extension; the stem
/// is cut and tagged with a hash of the full name so distinct long names
/// stay distinct.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let sanitized = truncate_keeping_extension(&sanitized);

    if is_safe_filename_segment(&sanitized) {
        sanitized
    } else {
        sanitized.replace('.', "_")
    }
}

fn truncate_keeping_extension(name: &str) -> String {
    if name.len() <= MAX_FILENAME_BYTES {
        return name.to_string();
    }
    let (stem, extension) = match name.rfind('.') {
        Some(dot) if dot > 0 && name.len() - dot <= MAX_EXTENSION_BYTES => name.split_at(dot),
        _ => (name, ""),
    };

    let mut hasher = DefaultHasher::new();
    name.hash(&mut hasher);
    let tag = format!("-{:016x}", hasher.finish());

    let budget = MAX_FILENAME_BYTES - extension.len() - tag.len();
    let mut cut = budget.min(stem.len());
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{tag}{extension}", &stem[..cut])
}

fn is_safe_filename_segment(name: &str) -> bool {
    !name.is_empty()
        && !Path::new(name).components().any(|component| {
            matches!(
                component,
                Component::CurDir | Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        })
}
