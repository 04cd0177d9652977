//! CLI entry point for doc-bundler.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod app;
mod cli;

use app::{config_file, runtime, settings, terminal};
use cli::Args;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    terminal::init_tracing(args.default_log_level(), terminal::is_no_color_requested());
    debug!(?args, "CLI arguments parsed");

    let file_config = config_file::load_file_config(args.config.as_deref())?;
    let config = settings::resolve_crawl_config(&args, file_config)?;

    let report = runtime::run_crawl(config, args.quiet).await?;
    runtime::log_run_report(&report);
    if args.json {
        runtime::print_json_report(&report)?;
    }

    // Failed products are reported above; they do not change the exit status.
    Ok(())
}
