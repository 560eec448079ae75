//! Walks every cached archive and indexes its indicators and countries.

use anyhow::{Context, Result};
use encoding_rs::{UTF_8, WINDOWS_1252};
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::countries::{index_countries, Country, CountryLookup};
use crate::extract::ArchiveExtractor;
use crate::indicators::IndicatorTable;
use crate::tabular::TabularReader;

pub const COUNTRY_COLUMN: &str = "country_id";

/// Header-normalized working files of one indicator-set.
#[derive(Debug, Clone, PartialEq)]
pub struct DataFileRef {
    pub metadata: Option<PathBuf>,
    pub data: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct ArchiveIndex {
    /// Resolvable countries across all indicator-sets, iso3-sorted.
    pub countries: Vec<Country>,
    /// Header of the indicator label files.
    pub indicator_headers: Vec<String>,
    pub indicators: IndexMap<String, IndicatorTable>,
    /// Release date label per indicator-set, when the README carried one.
    pub produced_dates: IndexMap<String, String>,
    pub data_files: IndexMap<String, DataFileRef>,
}

/// Extract every archive into `folder` and index it, in `archives` order.
pub fn index_archives<L: CountryLookup>(
    archives: &IndexMap<String, PathBuf>,
    folder: &Path,
    lookup: &L,
) -> Result<ArchiveIndex> {
    let extractor = ArchiveExtractor::new(folder);
    let mut index = ArchiveIndex::default();
    let mut country_codes: Vec<String> = Vec::new();

    for (code, zip_path) in archives {
        let extracted = extractor.extract(zip_path, code)?;

        if let Some(label) = extracted.produced_date_label {
            index.produced_dates.insert(code.clone(), label);
        }

        let mut reader = TabularReader::open(&extracted.indicator_file, WINDOWS_1252)?;
        index.indicator_headers = reader.headers().to_vec();
        let table = index.indicators.entry(code.clone()).or_default();
        for row in reader.rows() {
            table.push(row.with_context(|| {
                format!("Bad row in {}", extracted.indicator_file.display())
            })?);
        }

        let mut reader = TabularReader::open(&extracted.country_file, UTF_8)?;
        for row in reader.rows() {
            let row = row
                .with_context(|| format!("Bad row in {}", extracted.country_file.display()))?;
            if let Some(country) = row.get(COUNTRY_COLUMN) {
                country_codes.push(country.clone());
            }
        }

        info!(
            indicator_set = %code,
            indicators = table.rows.len(),
            shortnames = table.shortnames.len(),
            "indicator-set indexed"
        );

        index.data_files.insert(
            code.clone(),
            DataFileRef {
                metadata: extracted.metadata_file,
                data: extracted.data_file,
            },
        );
    }

    index.countries = index_countries(country_codes, lookup);
    info!(countries = index.countries.len(), "countries resolved");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::countries::CountryCodes;
    use std::fs::File;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_zip(path: &Path, members: &[(&str, Vec<u8>)]) {
        let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, content) in members {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap();
    }

    fn natmon_labels() -> Vec<u8> {
        let mut labels = b"INDICATOR_ID,INDICATOR_LABEL_EN\n".to_vec();
        labels.extend_from_slice(b"GER.1t3,\"Gross enrolment ratio, primary and secondary, both sexes (%)\"\n");
        labels.extend_from_slice(b"GER.1t3.F,\"Gross enrolment ratio, primary and secondary, female (%)\"\n");
        labels.extend_from_slice(b"26442,\"Africa: Students from Ghana, both sexes (number)\"\n");
        labels.extend_from_slice(b"XGDP.1.FSgov,\"Government expenditure on primary education as a percentage of GDP (%)\"\n");
        // 0xE9 is "é" in WINDOWS-1252
        labels.extend_from_slice(b"NER.1,\"Net enrolment rate, primary, both sexes (%) \xE9t\xE9\"\n");
        labels
    }

    fn natmon_archive(path: &Path) {
        write_zip(
            path,
            &[
                ("NATMON_README_2020_September.md", b"readme".to_vec()),
                ("NATMON_LABEL.csv", natmon_labels()),
                (
                    "NATMON_COUNTRY.csv",
                    b"COUNTRY_ID,COUNTRY_NAME_EN\nAFG,Afghanistan\nARM,Armenia\nSSA,Sub-Saharan Africa\n".to_vec(),
                ),
                ("NATMON_METADATA.csv", b"INDICATOR_ID,COUNTRY_ID,YEAR,TYPE,METADATA\n".to_vec()),
                ("NATMON_DATA_NATIONAL.csv", b"INDICATOR_ID,COUNTRY_ID,YEAR,VALUE\n".to_vec()),
            ],
        );
    }

    // Small synthetic archives stand in for a real NATMON release, which is
    // too large to ship as a fixture.
    #[test]
    fn test_index_archives() {
        let tmp = tempfile::tempdir().unwrap();
        let sdg = tmp.path().join("SDG.zip");
        let natmon = tmp.path().join("NATMON.zip");
        natmon_archive(&natmon);
        write_zip(
            &sdg,
            &[
                ("SDG_LABEL.csv", b"INDICATOR_ID,INDICATOR_LABEL_EN\nCR.1,\"Completion rate, primary (%)\"\n".to_vec()),
                ("SDG_COUNTRY.csv", b"COUNTRY_ID\nZWE\nAFG\n".to_vec()),
                ("SDG_DATA_NATIONAL.csv", b"INDICATOR_ID,COUNTRY_ID,YEAR,VALUE\n".to_vec()),
            ],
        );
        let archives: IndexMap<String, PathBuf> =
            [("NATMON".to_string(), natmon), ("SDG".to_string(), sdg)].into_iter().collect();
        let work = tmp.path().join("work");

        let index = index_archives(&archives, &work, &CountryCodes::bundled().unwrap()).unwrap();

        let iso3s: Vec<_> = index.countries.iter().map(|c| c.iso3.as_str()).collect();
        assert_eq!(iso3s, vec!["AFG", "ARM", "ZWE"]);
        assert_eq!(index.indicator_headers, vec!["indicator_id", "indicator_label_en"]);

        let natmon = &index.indicators["NATMON"];
        assert_eq!(natmon.rows.len(), 5);
        assert_eq!(natmon.shortnames.len(), 4);
        assert_eq!(
            natmon.rows[2],
            crate::tabular::Row::from([
                ("indicator_id".to_string(), "26442".to_string()),
                (
                    "indicator_label_en".to_string(),
                    "Africa: Students from Ghana, both sexes (number)".to_string()
                ),
            ])
        );
        assert!(natmon.shortnames.contains("Net enrolment rate"));
        assert_eq!(
            natmon.rows[4]["indicator_label_en"],
            "Net enrolment rate, primary, both sexes (%) été"
        );

        assert_eq!(index.produced_dates.get("NATMON").map(String::as_str), Some("2020 September"));
        assert!(!index.produced_dates.contains_key("SDG"));
        assert_eq!(
            index.data_files["NATMON"],
            DataFileRef {
                metadata: Some(work.join("NATMON").join("NATMON_METADATA.csv")),
                data: work.join("NATMON").join("NATMON_DATA_NATIONAL.csv"),
            }
        );
        assert_eq!(index.data_files["SDG"].metadata, None);
        assert_eq!(index.data_files.keys().collect::<Vec<_>>(), vec!["NATMON", "SDG"]);
    }

    #[test]
    fn test_many_labels_collapse_to_few_shortnames() {
        let tmp = tempfile::tempdir().unwrap();
        let zip_path = tmp.path().join("NATMON.zip");
        let bases = [
            "Gross enrolment ratio",
            "Out-of-school rate",
            "Africa",
        ];
        let mut labels = String::from("INDICATOR_ID,INDICATOR_LABEL_EN\n");
        let mut rows = 0;
        for (b, base) in bases.iter().enumerate() {
            for level in ["primary", "lower secondary", "upper secondary", "tertiary"] {
                for sex in ["both sexes", "female", "male"] {
                    labels.push_str(&format!("X.{}.{}.{},\"{}: {}, {} (%)\"\n", b, level, sex, base, level, sex));
                    rows += 1;
                }
            }
        }
        write_zip(
            &zip_path,
            &[
                ("NATMON_LABEL.csv", labels.into_bytes()),
                ("NATMON_COUNTRY.csv", b"COUNTRY_ID\nAFG\n".to_vec()),
                ("NATMON_DATA_NATIONAL.csv", b"INDICATOR_ID,COUNTRY_ID,YEAR,VALUE\n".to_vec()),
            ],
        );
        let archives: IndexMap<String, PathBuf> = [("NATMON".to_string(), zip_path)].into_iter().collect();

        let index = index_archives(&archives, &tmp.path().join("work"), &CountryCodes::bundled().unwrap()).unwrap();

        let natmon = &index.indicators["NATMON"];
        assert_eq!(natmon.rows.len(), rows);
        assert_eq!(natmon.rows.len(), 36);
        assert_eq!(
            natmon.shortnames.iter().collect::<Vec<_>>(),
            vec!["Africa", "Gross enrolment ratio", "Out-of-school rate"]
        );
        assert_eq!(natmon.rows[13]["indicator_id"], "X.1.primary.female");
        assert_eq!(
            natmon.rows[13]["indicator_label_en"],
            "Out-of-school rate: primary, female (%)"
        );
    }
}
