//! CLI argument definitions using clap derive macros.
//!
//! Every crawl option is optional here so that values from the config file
//! apply when a flag is absent.

use std::path::PathBuf;

use clap::Parser;

/// Bundle product documentation for offline use.
///
/// Crawls each product's documentation section, downloads every linked
/// document once per run, and combines each product's documents into a
/// single file under `<output-dir>/products/`.
#[derive(Parser, Debug)]
#[command(name = "doc-bundler")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Read defaults from this config file instead of the default location
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Crawl scope; every page and document URL must start with it
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Output root; documents land in <DIR>/products/<product>/
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Bound on link-following depth
    #[arg(long)]
    pub max_depth: Option<u32>,

    /// Number of products processed at once (1-100)
    #[arg(short = 'w', long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub workers: Option<u8>,

    /// Target document extension, with or without the leading dot
    #[arg(short = 'e', long)]
    pub extension: Option<String>,

    /// Path marker that identifies related documentation pages
    #[arg(long)]
    pub version_marker: Option<String>,

    /// Comma-separated product identifiers to crawl
    #[arg(short = 'p', long, value_delimiter = ',', num_args = 1..)]
    pub products: Vec<String>,

    /// Wait after each page load before reading links, in milliseconds (max 60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub settle_ms: Option<u64>,

    /// Keep a filename reserved for the whole run after its download fails
    #[arg(long)]
    pub sticky_failures: bool,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

impl Args {
    /// Log level implied by -q/-v, used when `RUST_LOG` is unset.
    #[must_use]
    pub fn default_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }
}
