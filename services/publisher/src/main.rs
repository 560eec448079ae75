//! Publisher CLI - runs the full pipeline
//!
//! Usage:
//!   # Publish every country to the catalog (needs CKAN_API_KEY):
//!   cargo run --bin publisher
//!
//!   # NATMON for Afghanistan only, payloads written to WORK_DIR/dry_run:
//!   cargo run --bin publisher -- --test --dry-run

use anyhow::Result;
use clap::Parser;
use collector::HttpFetcher;
use publisher::{run, PipelineConfig, RunOptions};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "publisher", about = "Publishes UIS education indicators per country")]
struct Args {
    /// Path to indicator-set config file
    #[arg(long, default_value = "config/indicator_sets.json")]
    config: PathBuf,

    /// Path to the fixed dataset fields
    #[arg(long, default_value = "config/dataset_static.json")]
    dataset_static: PathBuf,

    /// Indicator-set code to publish (repeatable, default: all enabled)
    #[arg(long)]
    code: Vec<String>,

    /// Base URL the archives are fetched from
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Working folder for archives and generated files
    #[arg(long, env = "WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Catalog site
    #[arg(long, env = "CKAN_URL")]
    ckan_url: Option<String>,

    /// Country iso3 to resume from, or RESET
    #[arg(long, env = "WHERETOSTART")]
    wheretostart: Option<String>,

    /// Only NATMON for Afghanistan, stop after the first dataset
    #[arg(long, default_value = "false")]
    test: bool,

    /// Write payloads to disk instead of publishing
    #[arg(long, default_value = "false")]
    dry_run: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = PipelineConfig::from_env();
    if let Some(base_url) = args.base_url {
        config.collector.base_url = base_url;
    }
    if let Some(work_dir) = args.work_dir {
        config.collector.work_dir = work_dir;
    }
    if let Some(ckan_url) = args.ckan_url {
        config.ckan_url = ckan_url;
    }
    if args.wheretostart.is_some() {
        config.wheretostart = args.wheretostart;
    }

    let options = RunOptions {
        indicator_sets: args.config,
        static_fields: args.dataset_static,
        codes: args.code,
        test: args.test,
        dry_run: args.dry_run,
    };
    let fetcher = HttpFetcher::new(Duration::from_secs(600))?;
    run(&config, &options, &fetcher).await
}
