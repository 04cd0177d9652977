//! Product identifiers and the on-disk output layout.
//!
//! A product is one documentation section crawled independently. Its
//! identifier drives both the section's root URL and where its documents and
//! aggregated artifact land:
//!
//! ```text
//! <output_root>/products/<product>/<original_filename>
//! <output_root>/products/<product>.<ext>
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use url::Url;

use crate::config::ConfigError;

/// Name of the directory under the output root holding all products.
pub const PRODUCTS_DIR: &str = "products";

/// A named documentation section, e.g. `ec2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Product(String);

impl Product {
    /// Creates a product identifier after validating it is usable as both a
    /// URL path segment and a directory name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidProduct`] for empty identifiers or ones
    /// containing path separators, `..`, or whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, ConfigError> {
        let id = id.into();
        let trimmed = id.trim();
        let invalid = trimmed.is_empty()
            || trimmed.contains(['/', '\\'])
            || trimmed.contains("..")
            || trimmed.chars().any(char::is_whitespace);
        if invalid {
            return Err(ConfigError::InvalidProduct { id });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the product's documentation root, `<base><product>/`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBaseUrl`] if the joined URL cannot be
    /// parsed, which only happens for a malformed base.
    pub fn root_url(&self, base_url: &Url) -> Result<Url, ConfigError> {
        base_url
            .join(&format!("{}/", self.0))
            .map_err(|_| ConfigError::InvalidBaseUrl {
                url: base_url.to_string(),
            })
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves paths under the output root.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/products`
    #[must_use]
    pub fn products_dir(&self) -> PathBuf {
        self.root.join(PRODUCTS_DIR)
    }

    /// `<root>/products/<product>`
    #[must_use]
    pub fn product_dir(&self, product: &Product) -> PathBuf {
        self.products_dir().join(product.as_str())
    }

    /// `<root>/products/<product>/<filename>`
    #[must_use]
    pub fn document_path(&self, product: &Product, filename: &str) -> PathBuf {
        self.product_dir(product).join(filename)
    }

    /// `<root>/products/<product>.<extension>`
    #[must_use]
    pub fn artifact_path(&self, product: &Product, extension: &str) -> PathBuf {
        self.products_dir()
            .join(format!("{}.{extension}", product.as_str()))
    }
}
