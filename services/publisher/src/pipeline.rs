//! End-to-end run: acquire archives, index them, then build and publish one
//! dataset per country.

use anyhow::{Context, Result};
use collector::{ArchiveCache, ArchiveFetcher, IndicatorSetsConfig};
use parser::{index_archives, Country, CountryCodes};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::builder::{CountryDatasetBuilder, ORGANIZATION};
use crate::config::{load_static_fields, PipelineConfig};
use crate::progress::Progress;
use crate::publish::{CkanClient, Publisher};
use crate::quickcharts::quickcharts_view;

pub const TEST_INDICATOR_SET: &str = "NATMON";

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub indicator_sets: PathBuf,
    pub static_fields: PathBuf,
    /// Restrict to these indicator-set codes (empty: all enabled).
    pub codes: Vec<String>,
    /// NATMON and Afghanistan only, stopping after the first publish.
    pub test: bool,
    pub dry_run: bool,
}

fn test_country() -> Country {
    Country {
        iso3: "AFG".to_string(),
        iso2: "AF".to_string(),
        countryname: "Afghanistan".to_string(),
    }
}

/// Archives are fetched through `fetcher`; cached ones are reused.
pub async fn run<F: ArchiveFetcher>(
    config: &PipelineConfig,
    options: &RunOptions,
    fetcher: &F,
) -> Result<()> {
    let work_dir = &config.collector.work_dir;
    let batch = Uuid::new_v4().to_string();
    info!(batch = %batch, work_dir = %work_dir.display(), "run started");

    let publisher = if options.dry_run {
        Publisher::DryRun {
            folder: work_dir.join("dry_run"),
        }
    } else {
        let api_key = config
            .ckan_api_key
            .as_deref()
            .context("CKAN_API_KEY is required unless running with --dry-run")?;
        Publisher::Ckan(CkanClient::new(&config.ckan_url, api_key, Duration::from_secs(300))?)
    };
    publisher.check_access(ORGANIZATION).await?;

    let sets_config = IndicatorSetsConfig::load(&options.indicator_sets).await?;
    let mut sets = sets_config.select(&options.codes);
    if options.test {
        sets.retain(|code, _| code == TEST_INDICATOR_SET);
    }
    if sets.is_empty() {
        anyhow::bail!("No indicator-sets match the filter criteria");
    }
    info!(count = sets.len(), "indicator-sets to upload");

    let cache = ArchiveCache::new(work_dir);
    let archives = cache
        .acquire(fetcher, &config.collector.base_url, sets.keys())
        .await?;

    let locations = CountryCodes::bundled()?;
    let index = index_archives(&archives, work_dir, &locations)?;
    let countries = if options.test {
        vec![test_country()]
    } else {
        index.countries.clone()
    };
    let static_fields = load_static_fields(&options.static_fields).await?;
    let progress = Progress::load(work_dir, config.wheretostart.as_deref()).await?;
    info!(
        count = countries.len(),
        resume_from = progress.start_at().unwrap_or("start"),
        "countries to upload"
    );
    let builder = CountryDatasetBuilder::new(&sets, &index, &locations);

    for country in progress.remaining(&countries) {
        progress.mark_started(country).await?;
        let Some(mut built) = builder.build(country, work_dir)? else {
            continue;
        };
        built.dataset.update_from_static(&static_fields);
        let view = quickcharts_view(
            &built.dataset,
            built.bites_disabled.as_deref(),
            built.qc_indicators.as_deref().unwrap_or_default(),
        )?;
        publisher.publish(&built, view.as_ref(), &batch).await?;
        info!(country = %country.iso3, outcome = "published", "country done");

        if options.test {
            info!("test mode: stopping after the first dataset");
            return Ok(());
        }
    }

    progress.complete().await?;
    info!("run complete");
    Ok(())
}
