//! Parser CLI - extracts cached archives and prints what was indexed
//!
//! Usage:
//!   cargo run --bin parser -- --work-dir ./data/uis --code NATMON --code SDG

use anyhow::{Context, Result};
use clap::Parser;
use indexmap::IndexMap;
use parser::{index_archives, CountryCodes};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "parser", about = "Extracts and indexes cached UIS archives")]
struct Args {
    /// Indicator-set code whose {CODE}.zip is in the working folder (repeatable)
    #[arg(long, required = true)]
    code: Vec<String>,

    /// Working folder holding the archives
    #[arg(long, env = "WORK_DIR", default_value = "./data/uis")]
    work_dir: PathBuf,

    /// Alternative iso3,iso2,name country table
    #[arg(long)]
    countries: Option<PathBuf>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let lookup = match &args.countries {
        Some(path) => CountryCodes::from_path(path)?,
        None => CountryCodes::bundled()?,
    };

    let mut archives = IndexMap::new();
    for code in &args.code {
        let path = args.work_dir.join(format!("{}.zip", code));
        if !path.exists() {
            anyhow::bail!("No archive for {} at {} - run the collector first", code, path.display());
        }
        archives.insert(code.clone(), path);
    }

    let index = index_archives(&archives, &args.work_dir, &lookup)
        .context("Failed to index archives")?;

    println!("=== Indexed {} indicator-set(s) ===", index.indicators.len());
    for (code, table) in &index.indicators {
        println!(
            "  {} | {} indicators | {} short names | made {}",
            code,
            table.rows.len(),
            table.shortnames.len(),
            index.produced_dates.get(code).map(String::as_str).unwrap_or("unknown")
        );
        if let Some(files) = index.data_files.get(code) {
            println!("      data: {}", files.data.display());
            if let Some(metadata) = &files.metadata {
                println!("      metadata: {}", metadata.display());
            }
        }
    }
    println!("Countries: {}", index.countries.len());
    for country in index.countries.iter().take(5) {
        println!("  {} {} {}", country.iso3, country.iso2, country.countryname);
    }
    if index.countries.len() > 5 {
        println!("  ... and {} more", index.countries.len() - 5);
    }
    Ok(())
}
