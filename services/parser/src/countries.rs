//! Country code resolution and the per-run country list.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;
use tracing::info;

const BUNDLED_COUNTRIES: &str = include_str!("../data/countries.csv");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Country {
    pub iso3: String,
    pub iso2: String,
    pub countryname: String,
}

/// ISO3-keyed lookups the indexer and the dataset builder rely on.
pub trait CountryLookup {
    fn iso2_from_iso3(&self, iso3: &str) -> Option<String>;
    fn name_from_iso3(&self, iso3: &str) -> Option<String>;

    /// Whether the catalog accepts `iso3` as a dataset location.
    fn is_valid_location(&self, iso3: &str) -> bool {
        self.name_from_iso3(iso3).is_some()
    }
}

#[derive(Debug, Deserialize)]
struct CountryRecord {
    iso3: String,
    iso2: String,
    name: String,
}

/// ISO 3166 table: iso3 -> (iso2, name).
#[derive(Debug, Clone, Default)]
pub struct CountryCodes {
    by_iso3: HashMap<String, (String, String)>,
}

impl CountryCodes {
    /// The table compiled into the binary.
    pub fn bundled() -> Result<Self> {
        Self::from_reader(BUNDLED_COUNTRIES.as_bytes()).context("Bundled country table is invalid")
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open country table {}", path.display()))?;
        Self::from_reader(file)
            .with_context(|| format!("Failed to parse country table {}", path.display()))
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut by_iso3 = HashMap::new();
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        for record in reader.deserialize() {
            let record: CountryRecord = record?;
            by_iso3.insert(record.iso3.to_uppercase(), (record.iso2, record.name));
        }
        Ok(Self { by_iso3 })
    }

    pub fn len(&self) -> usize {
        self.by_iso3.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_iso3.is_empty()
    }
}

impl CountryLookup for CountryCodes {
    fn iso2_from_iso3(&self, iso3: &str) -> Option<String> {
        self.by_iso3
            .get(&iso3.to_uppercase())
            .map(|(iso2, _)| iso2.clone())
    }

    fn name_from_iso3(&self, iso3: &str) -> Option<String> {
        self.by_iso3
            .get(&iso3.to_uppercase())
            .map(|(_, name)| name.clone())
    }
}

/// Distinct codes, resolved and sorted by iso3. Codes lacking either an
/// ISO2 code or a name are dropped.
pub fn index_countries<L, I>(codes: I, lookup: &L) -> Vec<Country>
where
    L: CountryLookup,
    I: IntoIterator<Item = String>,
{
    let distinct: BTreeSet<String> = codes.into_iter().collect();
    let mut countries = Vec::with_capacity(distinct.len());
    for iso3 in distinct {
        match (lookup.iso2_from_iso3(&iso3), lookup.name_from_iso3(&iso3)) {
            (Some(iso2), Some(countryname)) => countries.push(Country {
                iso3,
                iso2,
                countryname,
            }),
            _ => info!(country = %iso3, "dropping unresolvable country code"),
        }
    }
    countries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bundled_table_resolves() {
        let codes = CountryCodes::bundled().unwrap();
        assert!(codes.len() > 240);
        assert_eq!(codes.iso2_from_iso3("AFG").as_deref(), Some("AF"));
        assert_eq!(codes.name_from_iso3("afg").as_deref(), Some("Afghanistan"));
        assert_eq!(codes.name_from_iso3("CIV").as_deref(), Some("Côte d'Ivoire"));
        assert_eq!(
            codes.name_from_iso3("HKG").as_deref(),
            Some("China, Hong Kong Special Administrative Region")
        );
        assert!(codes.is_valid_location("ARM"));
        assert!(!codes.is_valid_location("WLD"));
    }

    #[test]
    fn test_index_countries_sorted_distinct_resolvable() {
        let codes = CountryCodes::bundled().unwrap();
        let seen = ["ZWE", "AFG", "ARM", "AFG", "WB_LMI", "SSA", "ARM", "ALB"]
            .into_iter()
            .map(String::from);

        let countries = index_countries(seen, &codes);

        let iso3s: Vec<_> = countries.iter().map(|c| c.iso3.as_str()).collect();
        assert_eq!(iso3s, vec!["AFG", "ALB", "ARM", "ZWE"]);
        assert_eq!(
            countries[2],
            Country {
                iso3: "ARM".to_string(),
                iso2: "AM".to_string(),
                countryname: "Armenia".to_string(),
            }
        );
    }

    struct NameOnly;

    impl CountryLookup for NameOnly {
        fn iso2_from_iso3(&self, _: &str) -> Option<String> {
            None
        }
        fn name_from_iso3(&self, iso3: &str) -> Option<String> {
            Some(iso3.to_string())
        }
    }

    #[test]
    fn test_partial_resolution_is_dropped() {
        let countries = index_countries(vec!["AFG".to_string()], &NameOnly);
        assert!(countries.is_empty());
    }

    #[test]
    fn test_custom_table_from_reader() {
        let table = "iso3,iso2,name\nAAA,AA,Alpha\n";
        let codes = CountryCodes::from_reader(table.as_bytes()).unwrap();
        assert_eq!(codes.len(), 1);
        assert_eq!(codes.iso2_from_iso3("AAA").as_deref(), Some("AA"));
    }
}
