//! Crawl configuration: defaults, normalization, and validation.
//!
//! The binary layers a config file and CLI flags over [`CrawlConfig::default`];
//! whatever the source, values go through the normalizers here and the final
//! struct through [`CrawlConfig::validate`] before any work is scheduled.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::download::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::product::Product;
use crate::registry::FailurePolicy;

/// Default crawl scope.
pub const DEFAULT_BASE_URL: &str = "https://docs.aws.amazon.com/";

/// Default output root directory.
pub const DEFAULT_OUTPUT_DIR: &str = "aws_docs";

/// Default maximum crawl depth.
pub const DEFAULT_MAX_DEPTH: u32 = 2;

/// Default worker pool width.
pub const DEFAULT_WORKERS: usize = 5;

/// Minimum allowed worker pool width.
pub const MIN_WORKERS: usize = 1;

/// Maximum allowed worker pool width.
pub const MAX_WORKERS: usize = 100;

/// Default target document extension (without the dot).
pub const DEFAULT_EXTENSION: &str = "pdf";

/// Path marker identifying related documentation pages.
pub const DEFAULT_VERSION_MARKER: &str = "/latest/";

/// Default wait after a page load before links are extracted.
pub const DEFAULT_SETTLE_MS: u64 = 3000;

/// Upper bound accepted for HTTP timeouts.
const MAX_TIMEOUT_SECS: u64 = 3600;

/// Products crawled when none are configured.
pub const DEFAULT_PRODUCTS: &[&str] = &[
    "ec2",
    "lambda",
    "s3",
    "ebs",
    "vpc",
    "route53",
    "rds",
    "dynamodb",
    "iam",
    "kms",
    "kinesis",
    "cloudwatch",
    "elb",
    "cloudtrail",
    "autoscaling",
    "trusted-advisor",
    "config",
    "wellarchitected",
    "cloudfront",
    "api-gateway",
    "sqs",
    "sns",
    "eventbridge",
    "codepipeline",
    "codebuild",
    "codedeploy",
    "systems-manager",
    "aws-backup",
    "aws-organizations",
    "transit-gateway",
    "step-functions",
    "cloudformation",
];

/// Invalid configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Base URL is not an absolute http(s) URL.
    #[error("invalid base URL '{url}': expected an absolute http(s) URL")]
    InvalidBaseUrl {
        /// The rejected value.
        url: String,
    },

    /// Product identifier cannot be used as a path segment.
    #[error("invalid product identifier '{id}'")]
    InvalidProduct {
        /// The rejected identifier.
        id: String,
    },

    /// No products configured.
    #[error("product list is empty")]
    NoProducts,

    /// Worker pool width out of range.
    #[error("invalid worker count {value}: must be between {MIN_WORKERS} and {MAX_WORKERS}")]
    InvalidWorkers {
        /// The rejected value.
        value: usize,
    },

    /// Document extension unusable as a file suffix.
    #[error("invalid document extension '{value}'")]
    InvalidExtension {
        /// The rejected value.
        value: String,
    },

    /// Version marker is empty.
    #[error("version marker must not be empty")]
    EmptyVersionMarker,

    /// Timeout outside 1..=3600 seconds.
    #[error("invalid {field} {value}: expected 1..={MAX_TIMEOUT_SECS} seconds")]
    InvalidTimeout {
        /// Which timeout.
        field: &'static str,
        /// The rejected value.
        value: u64,
    },
}

/// Resolved options for one run.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Scope boundary: every crawled page and document URL starts with this.
    pub base_url: Url,
    /// Directory under which `products/` is created.
    pub output_root: PathBuf,
    /// Bound on link-following depth.
    pub max_depth: u32,
    /// Number of product pipelines run at once.
    pub workers: usize,
    /// Products in scheduling order, without duplicates.
    pub products: Vec<Product>,
    /// Target document extension, lowercase, without the dot.
    pub extension: String,
    /// Substring an href must contain to count as a related page.
    pub version_marker: String,
    /// Wait after each page load before extracting links.
    pub settle_delay: Duration,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Whether a failed download may be re-claimed later in the run.
    pub failure_policy: FailurePolicy,
}

impl Default for CrawlConfig {
    #[allow(clippy::expect_used)]
    fn default() -> Self {
        Self {
            base_url: normalize_base_url(DEFAULT_BASE_URL)
                .expect("default base URL is a valid absolute URL"),
            output_root: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_depth: DEFAULT_MAX_DEPTH,
            workers: DEFAULT_WORKERS,
            products: parse_products(DEFAULT_PRODUCTS.iter().copied())
                .expect("default product identifiers are valid"),
            extension: DEFAULT_EXTENSION.to_string(),
            version_marker: DEFAULT_VERSION_MARKER.to_string(),
            settle_delay: Duration::from_millis(DEFAULT_SETTLE_MS),
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl CrawlConfig {
    /// Checks cross-field constraints that the normalizers cannot.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.base_url.scheme(), "http" | "https") || self.base_url.cannot_be_a_base()
        {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.base_url.to_string(),
            });
        }
        if !(MIN_WORKERS..=MAX_WORKERS).contains(&self.workers) {
            return Err(ConfigError::InvalidWorkers {
                value: self.workers,
            });
        }
        if self.products.is_empty() {
            return Err(ConfigError::NoProducts);
        }
        normalize_extension(&self.extension)?;
        if self.version_marker.is_empty() {
            return Err(ConfigError::EmptyVersionMarker);
        }
        validate_timeout("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

/// Parses a base URL, appending a trailing `/` so product paths join under it.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidBaseUrl`] for unparsable or non-http(s) URLs.
pub fn normalize_base_url(raw: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidBaseUrl {
        url: raw.to_string(),
    };
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(url)
}

/// Lowercases an extension and strips a leading dot.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidExtension`] if nothing is left or the value
/// contains separators or whitespace.
pub fn normalize_extension(raw: &str) -> Result<String, ConfigError> {
    let value = raw.trim().trim_start_matches('.').to_lowercase();
    if value.is_empty()
        || value.contains(['/', '\\', '.'])
        || value.chars().any(char::is_whitespace)
    {
        return Err(ConfigError::InvalidExtension {
            value: raw.to_string(),
        });
    }
    Ok(value)
}

/// Builds the ordered product list, dropping repeated identifiers.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidProduct`] for the first bad identifier.
pub fn parse_products<'a, I>(ids: I) -> Result<Vec<Product>, ConfigError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut products: Vec<Product> = Vec::new();
    for id in ids {
        let product = Product::new(id)?;
        if !products.contains(&product) {
            products.push(product);
        }
    }
    Ok(products)
}

fn validate_timeout(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if (1..=MAX_TIMEOUT_SECS).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::InvalidTimeout { field, value })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CrawlConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.workers, 5);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.extension, "pdf");
        assert_eq!(config.base_url.as_str(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_default_products_split_ebs_and_vpc() {
        let config = CrawlConfig::default();
        let ids: Vec<&str> = config.products.iter().map(Product::as_str).collect();
        assert!(ids.contains(&"ebs"));
        assert!(ids.contains(&"vpc"));
        assert!(!ids.contains(&"ebsvpc"));
        assert_eq!(ids.len(), DEFAULT_PRODUCTS.len());
    }

    #[test]
    fn test_normalize_base_url_appends_slash() {
        let url = normalize_base_url("https://example.com/docs").unwrap();
        assert_eq!(url.as_str(), "https://example.com/docs/");
    }

    #[test]
    fn test_normalize_base_url_rejects_non_http() {
        assert!(normalize_base_url("ftp://example.com/").is_err());
        assert!(normalize_base_url("not a url").is_err());
        assert!(normalize_base_url("mailto:someone@example.com").is_err());
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".PDF").unwrap(), "pdf");
        assert_eq!(normalize_extension("doc").unwrap(), "doc");
        assert!(normalize_extension("").is_err());
        assert!(normalize_extension(".").is_err());
        assert!(normalize_extension("tar.gz").is_err());
        assert!(normalize_extension("a/b").is_err());
    }

    #[test]
    fn test_parse_products_keeps_order_and_drops_duplicates() {
        let products = parse_products(["s3", "ec2", "s3", "iam"]).unwrap();
        let ids: Vec<&str> = products.iter().map(Product::as_str).collect();
        assert_eq!(ids, ["s3", "ec2", "iam"]);
    }

    #[test]
    fn test_validate_rejects_bad_workers() {
        let mut config = CrawlConfig::default();
        config.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidWorkers { value: 0 })
        ));
        config.workers = 101;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_products() {
        let mut config = CrawlConfig::default();
        config.products.clear();
        assert!(matches!(config.validate(), Err(ConfigError::NoProducts)));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = CrawlConfig::default();
        config.read_timeout_secs = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("read_timeout_secs"));
    }
}
