//! Catalog object model (dataset, resource, showcase) and local generation
//! of resource files.
//!
//! Resource files are CSV with the column header row followed by an HXL tag
//! row. When QuickCharts are requested for a resource, a cut-down copy
//! (`qc_{FILE}`) is written alongside it holding only the charted
//! indicators and the chart columns.

use anyhow::{Context, Result};
use parser::{CountryLookup, Row};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::period::DateSpan;

pub const QUICKCHARTS_PREFIX: &str = "QuickCharts-";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0} is not a valid country location")]
    InvalidLocation(String),
}

/// Expected update frequency, as the catalog encodes it (days, with -1 for
/// never and -2 for as needed).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateFrequency {
    Never,
    AsNeeded,
    Live,
    Daily,
    Weekly,
    Monthly,
    EveryThreeMonths,
    EverySixMonths,
    EveryYear,
}

impl UpdateFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "-1",
            Self::AsNeeded => "-2",
            Self::Live => "0",
            Self::Daily => "1",
            Self::Weekly => "7",
            Self::Monthly => "30",
            Self::EveryThreeMonths => "90",
            Self::EverySixMonths => "180",
            Self::EveryYear => "365",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub name: String,
}

fn tags_from(names: &[&str]) -> Vec<Tag> {
    names
        .iter()
        .map(|name| Tag {
            name: name.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub name: String,
    pub description: String,
    pub format: String,
    pub resource_type: String,
    pub url_type: String,
    /// Local file uploaded when the dataset is published.
    #[serde(skip)]
    pub path: PathBuf,
}

impl Resource {
    fn upload(name: String, description: String, path: PathBuf) -> Self {
        Self {
            name,
            description,
            format: "csv".to_string(),
            resource_type: "file.upload".to_string(),
            url_type: "upload".to_string(),
            path,
        }
    }

    pub fn is_quickcharts(&self) -> bool {
        self.name.starts_with(QUICKCHARTS_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    pub name: String,
    pub title: String,
    pub maintainer: String,
    pub owner_org: String,
    pub data_update_frequency: String,
    pub subnational: String,
    pub groups: Vec<Group>,
    pub tags: Vec<Tag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Fixed fields (license, methodology, ...) merged in before publishing.
    #[serde(flatten)]
    pub extras: Map<String, Value>,
    #[serde(skip)]
    resources: Vec<Resource>,
}

impl Dataset {
    pub fn new(name: &str, title: &str) -> Self {
        Self {
            name: name.to_string(),
            title: title.to_string(),
            maintainer: String::new(),
            owner_org: String::new(),
            data_update_frequency: UpdateFrequency::Never.as_str().to_string(),
            subnational: "0".to_string(),
            groups: Vec::new(),
            tags: Vec::new(),
            dataset_date: None,
            notes: None,
            extras: Map::new(),
            resources: Vec::new(),
        }
    }

    pub fn set_maintainer(&mut self, maintainer: &str) {
        self.maintainer = maintainer.to_string();
    }

    pub fn set_organization(&mut self, organization: &str) {
        self.owner_org = organization.to_string();
    }

    pub fn set_expected_update_frequency(&mut self, frequency: UpdateFrequency) {
        self.data_update_frequency = frequency.as_str().to_string();
    }

    pub fn set_subnational(&mut self, subnational: bool) {
        self.subnational = if subnational { "1" } else { "0" }.to_string();
    }

    pub fn add_country_location<L: CountryLookup>(
        &mut self,
        iso3: &str,
        locations: &L,
    ) -> Result<(), CatalogError> {
        if !locations.is_valid_location(iso3) {
            return Err(CatalogError::InvalidLocation(iso3.to_string()));
        }
        let name = iso3.to_lowercase();
        if !self.groups.iter().any(|g| g.name == name) {
            self.groups.push(Group { name });
        }
        Ok(())
    }

    pub fn add_tags(&mut self, names: &[&str]) {
        for tag in tags_from(names) {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }

    pub fn set_time_period(&mut self, span: &DateSpan) {
        self.dataset_date = Some(span.to_catalog_string());
    }

    /// Merge fixed fields; keys already modelled on the dataset are ignored.
    pub fn update_from_static(&mut self, fields: &Map<String, Value>) {
        const MODELLED: &[&str] = &[
            "name",
            "title",
            "maintainer",
            "owner_org",
            "data_update_frequency",
            "subnational",
            "groups",
            "tags",
            "dataset_date",
            "notes",
        ];
        for (key, value) in fields {
            if !MODELLED.contains(&key.as_str()) {
                self.extras.insert(key.clone(), value.clone());
            }
        }
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn number_of_resources(&self) -> usize {
        self.resources.len()
    }

    /// Move QuickCharts resources behind all others, keeping relative order.
    pub fn quickcharts_resource_last(&mut self) {
        let (mut ordered, quickcharts): (Vec<_>, Vec<_>) = std::mem::take(&mut self.resources)
            .into_iter()
            .partition(|r| !r.is_quickcharts());
        ordered.extend(quickcharts);
        self.resources = ordered;
    }

    /// Write `rows` as `{folder}/{filename}` and add it as a resource.
    ///
    /// Returns `None` (and leaves no file behind) when there were no rows.
    #[allow(clippy::too_many_arguments)]
    pub fn generate_resource<I>(
        &mut self,
        folder: &Path,
        filename: &str,
        headers: &[String],
        rows: I,
        hxltags: &[(&str, &str)],
        spec: ResourceSpec,
        quickcharts: Option<&QuickchartsSpec>,
    ) -> Result<Option<Generated>>
    where
        I: IntoIterator<Item = Result<Row>>,
    {
        fs::create_dir_all(folder)
            .with_context(|| format!("Failed to create {}", folder.display()))?;
        let path = folder.join(filename);
        let hxl_row: Vec<&str> = headers.iter().map(|h| hxl_tag(hxltags, h)).collect();

        let mut writer = csv_writer(&path)?;
        writer.write_record(headers)?;
        writer.write_record(&hxl_row)?;

        let mut cutdown = match quickcharts {
            Some(qc) => Some(Cutdown::start(qc, folder, filename, headers, hxltags)?),
            None => None,
        };

        let written = write_rows(&mut writer, headers, rows, cutdown.as_mut())
            .and_then(|count| writer.flush().map(|()| count).map_err(Into::into));
        drop(writer);
        let count = match written {
            Ok(count) => count,
            Err(e) => {
                discard_partial(&path, cutdown);
                return Err(e);
            }
        };

        if count == 0 {
            fs::remove_file(&path)?;
            if let Some(cutdown) = cutdown {
                cutdown.discard()?;
            }
            return Ok(None);
        }

        let name = spec.name.clone();
        self.resources
            .push(Resource::upload(spec.name, spec.description, path));

        let bites_disabled = match cutdown {
            Some(cutdown) => {
                let (qc_path, qc_rows, bites_disabled) = cutdown.finish()?;
                if qc_rows > 0 {
                    self.resources.push(Resource::upload(
                        format!("{}{}", QUICKCHARTS_PREFIX, name),
                        "Cut down data for QuickCharts".to_string(),
                        qc_path,
                    ));
                } else {
                    fs::remove_file(&qc_path)?;
                }
                Some(bites_disabled)
            }
            None => None,
        };

        Ok(Some(Generated {
            rows: count,
            bites_disabled,
        }))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceSpec {
    pub name: String,
    pub description: String,
}

/// Outcome of a successful resource generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Generated {
    pub rows: usize,
    /// One flag per charted value: true when no row carried a value for it.
    pub bites_disabled: Option<Vec<bool>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuickchartsSpec {
    /// Column (by HXL tag) the charted values are matched against.
    pub hashtag: String,
    pub values: Vec<String>,
    pub numeric_hashtag: String,
    /// Columns (by HXL tag) kept in the cut-down file; the numeric column is
    /// always kept.
    pub cutdown_hashtags: Vec<String>,
}

fn hxl_tag<'a>(hxltags: &[(&str, &'a str)], header: &str) -> &'a str {
    hxltags
        .iter()
        .find(|(h, _)| *h == header)
        .map(|(_, tag)| *tag)
        .unwrap_or("")
}

fn header_for<'h>(headers: &'h [String], hxltags: &[(&str, &str)], tag: &str) -> Option<&'h String> {
    headers.iter().find(|h| hxl_tag(hxltags, h) == tag)
}

fn write_rows<I>(
    writer: &mut csv::Writer<File>,
    headers: &[String],
    rows: I,
    mut cutdown: Option<&mut Cutdown>,
) -> Result<usize>
where
    I: IntoIterator<Item = Result<Row>>,
{
    let mut count = 0;
    for row in rows {
        let row = row?;
        writer.write_record(headers.iter().map(|h| row.get(h).map(String::as_str).unwrap_or("")))?;
        if let Some(cutdown) = cutdown.as_deref_mut() {
            cutdown.observe(&row)?;
        }
        count += 1;
    }
    Ok(count)
}

/// Remove the files of a generation that failed part way.
fn discard_partial(path: &Path, cutdown: Option<Cutdown>) {
    if let Err(e) = fs::remove_file(path) {
        warn!(path = %path.display(), error = %e, "failed to remove partial resource");
    }
    if let Some(cutdown) = cutdown {
        if let Err(e) = cutdown.discard() {
            warn!(error = %e, "failed to remove partial QuickCharts file");
        }
    }
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    Ok(csv::WriterBuilder::new()
        .terminator(csv::Terminator::CRLF)
        .from_writer(file))
}

/// In-progress QuickCharts cut-down file.
struct Cutdown {
    path: PathBuf,
    writer: csv::Writer<File>,
    match_header: Option<String>,
    numeric_header: Option<String>,
    columns: Vec<String>,
    values: Vec<String>,
    wanted: HashSet<String>,
    bites_disabled: Vec<bool>,
    rows: usize,
}

impl Cutdown {
    fn start(
        qc: &QuickchartsSpec,
        folder: &Path,
        filename: &str,
        headers: &[String],
        hxltags: &[(&str, &str)],
    ) -> Result<Self> {
        let mut keep: Vec<&str> = qc.cutdown_hashtags.iter().map(String::as_str).collect();
        if !keep.contains(&qc.numeric_hashtag.as_str()) {
            keep.push(&qc.numeric_hashtag);
        }
        let columns: Vec<String> = headers
            .iter()
            .filter(|h| keep.contains(&hxl_tag(hxltags, h)))
            .cloned()
            .collect();

        let path = folder.join(format!("qc_{}", filename));
        let mut writer = csv_writer(&path)?;
        writer.write_record(&columns)?;
        writer.write_record(columns.iter().map(|h| hxl_tag(hxltags, h)))?;

        Ok(Self {
            path,
            writer,
            match_header: header_for(headers, hxltags, &qc.hashtag).cloned(),
            numeric_header: header_for(headers, hxltags, &qc.numeric_hashtag).cloned(),
            columns,
            values: qc.values.clone(),
            wanted: qc.values.iter().cloned().collect(),
            bites_disabled: vec![true; qc.values.len()],
            rows: 0,
        })
    }

    fn observe(&mut self, row: &Row) -> Result<()> {
        let Some(value) = self.match_header.as_ref().and_then(|h| row.get(h)) else {
            return Ok(());
        };
        if !self.wanted.contains(value) {
            return Ok(());
        }
        let has_number = self
            .numeric_header
            .as_ref()
            .and_then(|h| row.get(h))
            .map_or(false, |v| !v.trim().is_empty());
        if has_number {
            if let Some(i) = self.values.iter().position(|v| v == value) {
                self.bites_disabled[i] = false;
            }
        }
        self.writer
            .write_record(self.columns.iter().map(|h| row.get(h).map(String::as_str).unwrap_or("")))?;
        self.rows += 1;
        Ok(())
    }

    fn finish(mut self) -> Result<(PathBuf, usize, Vec<bool>)> {
        self.writer.flush()?;
        Ok((self.path, self.rows, self.bites_disabled))
    }

    fn discard(mut self) -> Result<()> {
        self.writer.flush()?;
        drop(self.writer);
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Showcase {
    pub name: String,
    pub title: String,
    pub notes: String,
    pub url: String,
    pub image_url: String,
    pub tags: Vec<Tag>,
}

impl Showcase {
    pub fn add_tags(&mut self, names: &[&str]) {
        for tag in tags_from(names) {
            if !self.tags.contains(&tag) {
                self.tags.push(tag);
            }
        }
    }
}

/// Catalog-safe name: ASCII-folded, lower case, runs of anything else
/// collapsed to one `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut push = |ch: char| {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('-') && !slug.is_empty() {
            slug.push('-');
        }
    };
    for c in text.chars() {
        match fold_char(c) {
            Some(folded) => folded.chars().for_each(&mut push),
            None => push(c),
        }
    }
    slug.trim_end_matches('-').to_string()
}

/// ASCII spelling of common Latin letters with diacritics.
fn fold_char(c: char) -> Option<&'static str> {
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' => "a",
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' => "A",
        'ç' | 'ć' | 'č' => "c",
        'Ç' | 'Ć' | 'Č' => "C",
        'è' | 'é' | 'ê' | 'ë' | 'ē' => "e",
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' => "E",
        'ì' | 'í' | 'î' | 'ï' | 'ı' => "i",
        'Ì' | 'Í' | 'Î' | 'Ï' | 'İ' => "I",
        'ñ' => "n",
        'Ñ' => "N",
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' => "o",
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' => "O",
        'ù' | 'ú' | 'û' | 'ü' => "u",
        'Ù' | 'Ú' | 'Û' | 'Ü' => "U",
        'ý' | 'ÿ' => "y",
        'Ý' => "Y",
        'ş' | 'š' => "s",
        'Ş' | 'Š' => "S",
        'ğ' => "g",
        'ł' => "l",
        'ž' => "z",
        'ß' => "ss",
        'æ' => "ae",
        'Æ' => "AE",
        'œ' => "oe",
        'Œ' => "OE",
        _ => return None,
    };
    Some(folded)
}
