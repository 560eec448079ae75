//! Per-country dataset assembly.
//!
//! For each resolved country the builder walks every indicator-set in
//! configured order and produces the data, indicator-list and metadata
//! resources filtered to that country, plus a QuickCharts cut-down when the
//! indicator-set has chart indicators. The reference period, category list
//! and chart-bite flags are gathered in a [`CountryAccumulator`] along the
//! way.

use anyhow::Result;
use collector::{ChartIndicator, IndicatorSet};
use encoding_rs::UTF_8;
use indexmap::IndexMap;
use parser::{ArchiveIndex, Country, CountryLookup, Row, TabularReader, COUNTRY_COLUMN};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::catalog::{
    slugify, Dataset, QuickchartsSpec, ResourceSpec, Showcase, UpdateFrequency,
};
use crate::period::{period_range, DateSpan};

pub const YEAR_COLUMN: &str = "year";

pub const ORGANIZATION: &str = "18f2d467-dcf8-4b7e-bffa-b3c338ba3a7c";
pub const MAINTAINER: &str = "a5c5296a-3206-4e51-b2de-bfe34857185f";

pub const TAGS: &[&str] = &[
    "sustainable development",
    "demographics",
    "socioeconomics",
    "education",
    "indicators",
    "sustainable development goals-sdg",
    "hxl",
];

pub const HXL_TAGS: &[(&str, &str)] = &[
    ("indicator_id", "#indicator+code"),
    ("indicator_label_en", "#indicator+name"),
    ("country_id", "#country+code"),
    ("year", "#date+year"),
    ("value", "#indicator+value+num"),
    ("type", "#description+type"),
    ("metadata", "#description"),
];

const ATTRIBUTION: &str = "Contains data from the UNESCO Institute for Statistics \
    [bulk data service](http://data.uis.unesco.org) ";
const SHOWCASE_URL: &str = "https://uis.unesco.org/en/country/";
const SHOWCASE_IMAGE: &str =
    "https://tcg.uis.unesco.org/wp-content/uploads/sites/4/2021/09/combined_uis_colors_eng-002-300x240.png";

const QC_HASHTAG: &str = "#indicator+code";
const QC_NUMERIC_HASHTAG: &str = "#indicator+value+num";
const QC_CUTDOWN_HASHTAGS: &[&str] = &["#indicator+code", "#country+code", "#date+year"];

/// Loop state carried across the indicator-sets of one country.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryAccumulator {
    pub span: DateSpan,
    pub categories: Vec<String>,
    pub bites_disabled: Option<Vec<bool>>,
    pub qc_indicators: Option<Vec<ChartIndicator>>,
}

impl CountryAccumulator {
    /// Widen the span by the whole year; blank or unparseable years are
    /// ignored.
    pub fn observe_year(&mut self, year: &str) {
        if year.trim().is_empty() {
            return;
        }
        match period_range(year) {
            Some((start, end)) => self.span.widen(start, end),
            None => debug!(year, "ignoring unparseable year"),
        }
    }

    /// Keep the latest non-empty flags.
    pub fn record_bites(&mut self, flags: Vec<bool>) {
        if !flags.is_empty() {
            self.bites_disabled = Some(flags);
        }
    }

    pub fn credit_category(&mut self, title: &str, produced: Option<&str>) {
        let category = match produced {
            Some(label) => format!("{} (made {})", title, label),
            None => title.to_string(),
        };
        self.categories.push(category);
    }
}

#[derive(Debug, Clone)]
pub struct BuiltCountry {
    pub dataset: Dataset,
    pub showcase: Showcase,
    pub bites_disabled: Option<Vec<bool>>,
    pub qc_indicators: Option<Vec<ChartIndicator>>,
}

pub struct CountryDatasetBuilder<'a, L> {
    sets: &'a IndexMap<String, IndicatorSet>,
    index: &'a ArchiveIndex,
    locations: &'a L,
}

impl<'a, L: CountryLookup> CountryDatasetBuilder<'a, L> {
    pub fn new(
        sets: &'a IndexMap<String, IndicatorSet>,
        index: &'a ArchiveIndex,
        locations: &'a L,
    ) -> Self {
        Self {
            sets,
            index,
            locations,
        }
    }

    /// Assemble the dataset and showcase of `country`, writing resource
    /// files under `folder/{CODE}/`. `None` when the country cannot be a
    /// catalog location or has no data at all.
    pub fn build(&self, country: &Country, folder: &Path) -> Result<Option<BuiltCountry>> {
        let name = &country.countryname;
        let iso3 = country.iso3.as_str();
        let title = format!("{} - Education Indicators", name);
        let slug = slugify(&format!("UNESCO data for {}", name));

        let mut dataset = Dataset::new(&slug, &title);
        dataset.set_maintainer(MAINTAINER);
        dataset.set_organization(ORGANIZATION);
        dataset.set_expected_update_frequency(UpdateFrequency::Never);
        dataset.set_subnational(false);
        if let Err(e) = dataset.add_country_location(iso3, self.locations) {
            warn!(country = iso3, error = %e, "skipping country");
            return Ok(None);
        }
        dataset.add_tags(TAGS);

        let mut acc = CountryAccumulator::default();

        for (code, set) in self.sets {
            let Some(files) = self.index.data_files.get(code) else {
                warn!(indicator_set = %code, "indicator-set was not indexed");
                continue;
            };
            let indicators = self.index.indicators.get(code);
            let set_folder = folder.join(code);

            // data
            let resource_name = format!("{} data", set.title);
            let shortnames = indicators.map(|t| t.shortnames_joined()).unwrap_or_default();
            let quickcharts = (!set.quickcharts.is_empty()).then(|| QuickchartsSpec {
                hashtag: QC_HASHTAG.to_string(),
                values: set.quickcharts.iter().map(|q| q.code.clone()).collect(),
                numeric_hashtag: QC_NUMERIC_HASHTAG.to_string(),
                cutdown_hashtags: QC_CUTDOWN_HASHTAGS.iter().map(|t| t.to_string()).collect(),
            });

            let mut reader = TabularReader::open(&files.data, UTF_8)?;
            let headers = reader.headers().to_vec();
            let rows = reader.rows().filter_map(|row| match row {
                Ok(row) if for_country(&row, iso3) => {
                    if let Some(year) = row.get(YEAR_COLUMN) {
                        acc.observe_year(year);
                    }
                    Some(Ok(row))
                }
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            });
            let generated = dataset.generate_resource(
                &set_folder,
                &format!("{}_data_{}.csv", code, iso3),
                &headers,
                rows,
                HXL_TAGS,
                ResourceSpec {
                    name: resource_name.clone(),
                    description: format!(
                        "{} data with HXL tags.\n\nIndicators: {}",
                        set.title, shortnames
                    ),
                },
                quickcharts.as_ref(),
            )?;
            let Some(generated) = generated else {
                warn!(indicator_set = %code, country = iso3, resource = %resource_name, "no data");
                continue;
            };
            debug!(indicator_set = %code, country = iso3, rows = generated.rows, "data resource written");
            if quickcharts.is_some() {
                acc.qc_indicators = Some(set.quickcharts.clone());
            }
            if let Some(flags) = generated.bites_disabled {
                acc.record_bites(flags);
            }

            // indicator list
            let resource_name = format!("{} indicator list", set.title);
            let rows = indicators
                .map(|t| t.rows.clone())
                .unwrap_or_default()
                .into_iter()
                .map(Ok);
            let generated = dataset.generate_resource(
                &set_folder,
                &format!("{}_indicatorlist_{}.csv", code, iso3),
                &self.index.indicator_headers,
                rows,
                HXL_TAGS,
                ResourceSpec {
                    name: resource_name.clone(),
                    description: format!("{} indicator list with HXL tags", set.title),
                },
                None,
            )?;
            if generated.is_none() {
                warn!(indicator_set = %code, country = iso3, resource = %resource_name, "no data");
                continue;
            }
            acc.credit_category(
                &set.title,
                self.index.produced_dates.get(code).map(String::as_str),
            );

            // metadata
            let Some(metadata) = &files.metadata else {
                continue;
            };
            let resource_name = format!("{} metadata", set.title);
            let mut reader = TabularReader::open(metadata, UTF_8)?;
            let headers = reader.headers().to_vec();
            let rows = reader.rows().filter(|row| match row {
                Ok(row) => for_country(row, iso3),
                Err(_) => true,
            });
            let generated = dataset.generate_resource(
                &set_folder,
                &format!("{}_metadata_{}.csv", code, iso3),
                &headers,
                rows,
                HXL_TAGS,
                ResourceSpec {
                    name: resource_name.clone(),
                    description: format!("{} metadata with HXL tags", set.title),
                },
                None,
            )?;
            if generated.is_none() {
                warn!(indicator_set = %code, country = iso3, resource = %resource_name, "no data");
            }
        }

        if dataset.number_of_resources() == 0 {
            warn!(country = iso3, "country has no data");
            return Ok(None);
        }

        if acc.span.is_empty() {
            warn!(country = iso3, "no years observed, leaving the reference period unset");
        } else {
            dataset.set_time_period(&acc.span);
        }
        dataset.quickcharts_resource_last();
        dataset.notes = Some(format!(
            "Education indicators for {}.\n\n{}covering the following categories: {}",
            name,
            ATTRIBUTION,
            acc.categories.join(", ")
        ));

        let mut showcase = Showcase {
            name: format!("{}-showcase", slug),
            title,
            notes: format!("Education indicators for {}", name),
            url: format!("{}{}", SHOWCASE_URL, country.iso2),
            image_url: SHOWCASE_IMAGE.to_string(),
            tags: Vec::new(),
        };
        showcase.add_tags(TAGS);

        info!(
            country = iso3,
            resources = dataset.number_of_resources(),
            categories = acc.categories.len(),
            "dataset built"
        );
        Ok(Some(BuiltCountry {
            dataset,
            showcase,
            bites_disabled: acc.bites_disabled,
            qc_indicators: acc.qc_indicators,
        }))
    }
}

fn for_country(row: &Row, iso3: &str) -> bool {
    row.get(COUNTRY_COLUMN).map(String::as_str) == Some(iso3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use parser::{CountryCodes, DataFileRef, IndicatorTable};
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(name)
    }

    fn chart(code: &str, title: &str, unit: &str) -> ChartIndicator {
        ChartIndicator {
            code: code.to_string(),
            title: title.to_string(),
            unit: unit.to_string(),
        }
    }

    fn natmon_charts() -> Vec<ChartIndicator> {
        vec![
            chart("GER.1t3", "Gross enrolment ratio, primary and secondary", "Percentage (%)"),
            chart(
                "XGDP.1.FSgov",
                "Government expenditure on primary education",
                "Percentage of GDP (%)",
            ),
            chart(
                "XGDP.2.FSgov",
                "Government expenditure on lower secondary education",
                "Percentage of GDP (%)",
            ),
        ]
    }

    fn sets() -> IndexMap<String, IndicatorSet> {
        IndexMap::from([(
            "NATMON".to_string(),
            IndicatorSet {
                title: "National Monitoring".to_string(),
                quickcharts: natmon_charts(),
                enabled: true,
            },
        )])
    }

    fn label(id: &str, text: &str) -> Row {
        Row::from([
            ("indicator_id".to_string(), id.to_string()),
            ("indicator_label_en".to_string(), text.to_string()),
        ])
    }

    fn index() -> ArchiveIndex {
        let indicators: IndicatorTable = [
            label("GER.1t3", "Gross enrolment ratio, primary and secondary, both sexes (%)"),
            label("NER.1", "Net enrolment rate, primary, both sexes (%)"),
            label("XGDP.1.FSgov", "Government expenditure on primary education as a percentage of GDP (%)"),
            label("XGDP.2.FSgov", "Government expenditure on lower secondary education as a percentage of GDP (%)"),
        ]
        .into_iter()
        .collect();
        ArchiveIndex {
            countries: Vec::new(),
            indicator_headers: vec!["indicator_id".to_string(), "indicator_label_en".to_string()],
            indicators: IndexMap::from([("NATMON".to_string(), indicators)]),
            produced_dates: IndexMap::from([("NATMON".to_string(), "2020 September".to_string())]),
            data_files: IndexMap::from([(
                "NATMON".to_string(),
                DataFileRef {
                    metadata: Some(fixture("NATMON_METADATA.csv")),
                    data: fixture("NATMON_DATA_NATIONAL.csv"),
                },
            )]),
        }
    }

    fn country(iso3: &str, iso2: &str, name: &str) -> Country {
        Country {
            iso3: iso3.to_string(),
            iso2: iso2.to_string(),
            countryname: name.to_string(),
        }
    }

    fn afghanistan() -> Country {
        country("AFG", "AF", "Afghanistan")
    }

    #[test]
    fn test_build_afghanistan() {
        let tmp = tempfile::tempdir().unwrap();
        let (sets, index, codes) = (sets(), index(), CountryCodes::bundled().unwrap());
        let builder = CountryDatasetBuilder::new(&sets, &index, &codes);

        let built = builder.build(&afghanistan(), tmp.path()).unwrap().unwrap();

        let dataset = &built.dataset;
        assert_eq!(dataset.title, "Afghanistan - Education Indicators");
        assert_eq!(dataset.name, "unesco-data-for-afghanistan");
        assert_eq!(dataset.owner_org, ORGANIZATION);
        assert_eq!(dataset.maintainer, MAINTAINER);
        assert_eq!(dataset.data_update_frequency, "-1");
        assert_eq!(dataset.subnational, "0");
        assert_eq!(dataset.groups[0].name, "afg");
        assert_eq!(dataset.tags.len(), TAGS.len());
        assert_eq!(
            dataset.dataset_date.as_deref(),
            Some("[1970-01-01T00:00:00 TO 2020-12-31T23:59:59]")
        );

        let names: Vec<_> = dataset.resources().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "National Monitoring data",
                "National Monitoring indicator list",
                "National Monitoring metadata",
                "QuickCharts-National Monitoring data",
            ]
        );
        assert_eq!(
            dataset.resources()[0].description,
            "National Monitoring data with HXL tags.\n\nIndicators: \
             Government expenditure on lower secondary education as a percentage of GDP, \
             Government expenditure on primary education as a percentage of GDP, \
             Gross enrolment ratio, Net enrolment rate"
        );
        assert_eq!(
            dataset.resources()[3].path,
            tmp.path().join("NATMON").join("qc_NATMON_data_AFG.csv")
        );

        assert_eq!(
            dataset.notes.as_deref(),
            Some(
                "Education indicators for Afghanistan.\n\n\
                 Contains data from the UNESCO Institute for Statistics \
                 [bulk data service](http://data.uis.unesco.org) \
                 covering the following categories: National Monitoring (made 2020 September)"
            )
        );

        assert_eq!(built.bites_disabled, Some(vec![false, false, false]));
        assert_eq!(built.qc_indicators, Some(natmon_charts()));

        assert_eq!(built.showcase.name, "unesco-data-for-afghanistan-showcase");
        assert_eq!(built.showcase.title, "Afghanistan - Education Indicators");
        assert_eq!(built.showcase.notes, "Education indicators for Afghanistan");
        assert_eq!(built.showcase.url, "https://uis.unesco.org/en/country/AF");
        assert_eq!(built.showcase.tags, dataset.tags);
    }

    #[test]
    fn test_data_resource_is_filtered_to_country() {
        let tmp = tempfile::tempdir().unwrap();
        let (sets, index, codes) = (sets(), index(), CountryCodes::bundled().unwrap());
        let builder = CountryDatasetBuilder::new(&sets, &index, &codes);

        builder.build(&country("ARM", "AM", "Armenia"), tmp.path()).unwrap().unwrap();

        let data = std::fs::read_to_string(tmp.path().join("NATMON").join("NATMON_data_ARM.csv")).unwrap();
        let lines: Vec<_> = data.lines().collect();
        assert_eq!(lines[0], "indicator_id,country_id,year,value,magnitude,qualifier");
        assert_eq!(lines[1], "#indicator+code,#country+code,#date+year,#indicator+value+num,,");
        assert!(lines[2..].iter().all(|l| l.split(',').nth(1) == Some("ARM")));
        assert_eq!(lines.len(), 4);

        let list = std::fs::read_to_string(tmp.path().join("NATMON").join("NATMON_indicatorlist_ARM.csv")).unwrap();
        assert_eq!(list.lines().count(), 2 + 4);
    }

    #[test]
    fn test_armenia_has_no_metadata_and_disabled_bites() {
        let tmp = tempfile::tempdir().unwrap();
        let (sets, index, codes) = (sets(), index(), CountryCodes::bundled().unwrap());
        let builder = CountryDatasetBuilder::new(&sets, &index, &codes);

        let built = builder.build(&country("ARM", "AM", "Armenia"), tmp.path()).unwrap().unwrap();

        let names: Vec<_> = built.dataset.resources().iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "National Monitoring data",
                "National Monitoring indicator list",
                "QuickCharts-National Monitoring data",
            ]
        );
        // ARM only carries GER.1t3 values
        assert_eq!(built.bites_disabled, Some(vec![false, true, true]));
        assert!(built.dataset.notes.unwrap().ends_with("National Monitoring (made 2020 September)"));
        assert!(!tmp.path().join("NATMON").join("NATMON_metadata_ARM.csv").exists());
    }

    #[test]
    fn test_country_without_rows_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let (sets, index, codes) = (sets(), index(), CountryCodes::bundled().unwrap());
        let builder = CountryDatasetBuilder::new(&sets, &index, &codes);

        let built = builder.build(&country("ZWE", "ZW", "Zimbabwe"), tmp.path()).unwrap();

        assert!(built.is_none());
        assert!(!tmp.path().join("NATMON").join("NATMON_data_ZWE.csv").exists());
    }

    struct NoLocations;

    impl CountryLookup for NoLocations {
        fn iso2_from_iso3(&self, _: &str) -> Option<String> {
            Some("AF".to_string())
        }
        fn name_from_iso3(&self, _: &str) -> Option<String> {
            Some("Afghanistan".to_string())
        }
        fn is_valid_location(&self, _: &str) -> bool {
            false
        }
    }

    #[test]
    fn test_invalid_location_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let (sets, index) = (sets(), index());
        let builder = CountryDatasetBuilder::new(&sets, &index, &NoLocations);

        assert!(builder.build(&afghanistan(), tmp.path()).unwrap().is_none());
        assert!(!tmp.path().join("NATMON").exists());
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let (sets, index, codes) = (sets(), index(), CountryCodes::bundled().unwrap());
        let builder = CountryDatasetBuilder::new(&sets, &index, &codes);

        let first = builder.build(&afghanistan(), tmp.path()).unwrap().unwrap();
        let before: Vec<Vec<u8>> = first
            .dataset
            .resources()
            .iter()
            .map(|r| std::fs::read(&r.path).unwrap())
            .collect();

        let second = builder.build(&afghanistan(), tmp.path()).unwrap().unwrap();
        let after: Vec<Vec<u8>> = second
            .dataset
            .resources()
            .iter()
            .map(|r| std::fs::read(&r.path).unwrap())
            .collect();

        assert_eq!(before, after);
        assert_eq!(first.dataset, second.dataset);
    }

    #[test]
    fn test_without_readme_date_category_is_title() {
        let tmp = tempfile::tempdir().unwrap();
        let sets = sets();
        let mut index = index();
        index.produced_dates.clear();
        let codes = CountryCodes::bundled().unwrap();
        let builder = CountryDatasetBuilder::new(&sets, &index, &codes);

        let built = builder.build(&afghanistan(), tmp.path()).unwrap().unwrap();

        assert!(built
            .dataset
            .notes
            .unwrap()
            .ends_with("covering the following categories: National Monitoring"));
    }

    #[test]
    fn test_accumulator_span() {
        let mut acc = CountryAccumulator::default();
        assert!(acc.span.is_empty());

        acc.observe_year("2001");
        acc.observe_year("");
        acc.observe_year("n/a");
        acc.observe_year("1995");

        let at = |y, m, d, h, mi, s| {
            NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, mi, s).unwrap()
        };
        assert_eq!(acc.span.start, at(1995, 1, 1, 0, 0, 0));
        assert_eq!(acc.span.end, at(2001, 12, 31, 23, 59, 59));
    }

    #[test]
    fn test_accumulator_bites_last_non_empty_wins() {
        let mut acc = CountryAccumulator::default();
        acc.record_bites(vec![true, false]);
        acc.record_bites(vec![false, false, true]);
        acc.record_bites(Vec::new());
        assert_eq!(acc.bites_disabled, Some(vec![false, false, true]));
    }

    #[test]
    fn test_accumulator_categories() {
        let mut acc = CountryAccumulator::default();
        acc.credit_category("National Monitoring", Some("2020 September"));
        acc.credit_category("Demographic and Socio-economic", None);
        assert_eq!(
            acc.categories,
            vec![
                "National Monitoring (made 2020 September)",
                "Demographic and Socio-economic",
            ]
        );
    }
}
