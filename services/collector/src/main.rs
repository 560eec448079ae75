//! Collector CLI - downloads and caches indicator-set archives
//!
//! Usage:
//!   # All enabled indicator-sets from config:
//!   cargo run --bin collector -- --config config/indicator_sets.json
//!
//!   # Specific indicator-sets, ignoring cached copies:
//!   cargo run --bin collector -- --code NATMON --code SDG --force

use anyhow::Result;
use clap::Parser;
use collector::{ArchiveCache, Config, HttpFetcher, IndicatorSetsConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "collector", about = "Downloads UIS bulk-data archives")]
struct Args {
    /// Path to indicator-set config file
    #[arg(long, default_value = "config/indicator_sets.json")]
    config: PathBuf,

    /// Indicator-set code to collect (repeatable, default: all enabled)
    #[arg(long)]
    code: Vec<String>,

    /// Base URL the archives are fetched from
    #[arg(long, env = "BASE_URL")]
    base_url: Option<String>,

    /// Working folder for archives
    #[arg(long, env = "WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Force re-download even if cached
    #[arg(long, default_value = "false")]
    force: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let mut config = Config::from_env();
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(work_dir) = args.work_dir {
        config.work_dir = work_dir;
    }

    let sets = IndicatorSetsConfig::load(&args.config).await?;
    info!(version = %sets.version, config = %args.config.display(), "loaded indicator-set config");

    let selected = sets.select(&args.code);
    if selected.is_empty() {
        anyhow::bail!("No indicator-sets match the filter criteria");
    }

    let cache = ArchiveCache::new(&config.work_dir);
    if args.force {
        for code in selected.keys() {
            cache.invalidate(code).await?;
        }
    }

    let fetcher = HttpFetcher::new(Duration::from_secs(600))?;
    let archives = cache.acquire(&fetcher, &config.base_url, selected.keys()).await?;

    info!(count = archives.len(), "collection complete");
    for (code, path) in &archives {
        println!("{}\t{}", code, path.display());
    }
    Ok(())
}
