//! Archive member classification and header-normalizing extraction.
//!
//! Each UIS bulk archive carries a README (whose name holds the release
//! date), an indicator LABEL file, a COUNTRY file, the DATA_NATIONAL values
//! and, for some indicator-sets, a METADATA file. Header casing differs
//! between vintages, so every extracted member is rewritten with a
//! lower-cased header line; the raw member is kept as `orig_{FILE}`.

use anyhow::{Context, Result};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Data,
    Indicator,
    Country,
    Metadata,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Data => "data",
            Self::Indicator => "indicator",
            Self::Country => "country",
            Self::Metadata => "metadata",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("No {kind} file in zip {}!", path.display())]
    MissingMember { kind: MemberKind, path: PathBuf },
}

/// Member names picked out of an archive listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemberNames {
    pub produced_date_label: Option<String>,
    pub indicator: Option<String>,
    pub country: Option<String>,
    pub metadata: Option<String>,
    pub data: Option<String>,
}

/// Every name is tested against every marker; a later match replaces an
/// earlier one.
pub fn classify_members<'a>(names: impl IntoIterator<Item = &'a str>) -> MemberNames {
    let mut members = MemberNames::default();
    for name in names {
        if name.contains("README") {
            members.produced_date_label = produced_date_label(name);
        }
        if name.contains("LABEL") {
            members.indicator = Some(name.to_string());
        }
        if name.contains("COUNTRY") {
            members.country = Some(name.to_string());
        }
        if name.contains("METADATA") {
            members.metadata = Some(name.to_string());
        }
        if name.contains("DATA_NATIONAL") {
            members.data = Some(name.to_string());
        }
    }
    members
}

/// Working copies of one archive's members, header-normalized.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedArchive {
    pub indicator_file: PathBuf,
    pub country_file: PathBuf,
    pub metadata_file: Option<PathBuf>,
    pub data_file: PathBuf,
    pub produced_date_label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    output_folder: PathBuf,
}

impl ArchiveExtractor {
    pub fn new(output_folder: impl Into<PathBuf>) -> Self {
        Self {
            output_folder: output_folder.into(),
        }
    }

    pub fn extract(&self, zip_path: &Path, code: &str) -> Result<ExtractedArchive> {
        let file = File::open(zip_path)
            .with_context(|| format!("Failed to open archive {}", zip_path.display()))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("Failed to read archive {}", zip_path.display()))?;

        let members = classify_members(archive.file_names());
        debug!(indicator_set = code, ?members, "classified archive members");

        let missing = |kind| ExtractError::MissingMember {
            kind,
            path: zip_path.to_path_buf(),
        };
        let data = members.data.clone().ok_or_else(|| missing(MemberKind::Data))?;
        let indicator = members
            .indicator
            .clone()
            .ok_or_else(|| missing(MemberKind::Indicator))?;
        let country = members
            .country
            .clone()
            .ok_or_else(|| missing(MemberKind::Country))?;

        let folder = self.output_folder.join(code);
        fs::create_dir_all(&folder)
            .with_context(|| format!("Failed to create {}", folder.display()))?;

        let extracted = ExtractedArchive {
            indicator_file: extract_member(&mut archive, &indicator, &folder)?,
            country_file: extract_member(&mut archive, &country, &folder)?,
            metadata_file: match &members.metadata {
                Some(metadata) => Some(extract_member(&mut archive, metadata, &folder)?),
                None => None,
            },
            data_file: extract_member(&mut archive, &data, &folder)?,
            produced_date_label: members.produced_date_label,
        };

        info!(
            indicator_set = code,
            produced = extracted.produced_date_label.as_deref().unwrap_or("unknown"),
            has_metadata = extracted.metadata_file.is_some(),
            "archive extracted"
        );
        Ok(extracted)
    }
}

/// Extract `member` into `folder`, move the raw copy aside as `orig_{FILE}`
/// and write the header-normalized working copy at `{FILE}`.
fn extract_member(archive: &mut ZipArchive<File>, member: &str, folder: &Path) -> Result<PathBuf> {
    let filename = Path::new(member)
        .file_name()
        .with_context(|| format!("Archive member {:?} has no file name", member))?;
    let working = folder.join(filename);
    let mut orig_name = std::ffi::OsString::from("orig_");
    orig_name.push(filename);
    let orig = folder.join(orig_name);

    {
        let mut entry = archive
            .by_name(member)
            .with_context(|| format!("Failed to open archive member {}", member))?;
        let mut output = BufWriter::new(
            File::create(&working)
                .with_context(|| format!("Failed to create {}", working.display()))?,
        );
        io::copy(&mut entry, &mut output)
            .with_context(|| format!("Failed to extract {}", member))?;
        output.flush()?;
    }

    fs::rename(&working, &orig)
        .with_context(|| format!("Failed to rename {} to {}", working.display(), orig.display()))?;
    normalize_header(&orig, &working)?;
    Ok(working)
}

/// Copy `input` to `output` with only the first line lower-cased.
pub fn normalize_header(input: &Path, output: &Path) -> Result<()> {
    let mut reader = BufReader::new(
        File::open(input).with_context(|| format!("Failed to open {}", input.display()))?,
    );
    let mut writer = BufWriter::new(
        File::create(output).with_context(|| format!("Failed to create {}", output.display()))?,
    );

    let mut header = Vec::new();
    reader.read_until(b'\n', &mut header)?;
    header.make_ascii_lowercase();
    writer.write_all(&header)?;
    io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    Ok(())
}

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

fn is_month(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    token.len() >= 3 && MONTHS.iter().any(|month| month.starts_with(&token))
}

fn is_year(token: &str) -> bool {
    token.len() == 4
        && token.bytes().all(|b| b.is_ascii_digit())
        && token.parse::<u32>().map_or(false, |y| (1900..=2100).contains(&y))
}

/// Fuzzy release date from a README member name:
/// `NATMON_README_2020_September.md` -> `2020 September`.
pub fn produced_date_label(member: &str) -> Option<String> {
    let name = Path::new(member)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(member);
    let stem = match name.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() && ext.len() <= 5 => stem,
        _ => name,
    };
    let stem = stem.replace('_', " ");

    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in stem.chars() {
        let boundary = match current.chars().last() {
            Some(prev) => {
                !ch.is_alphanumeric() || prev.is_ascii_digit() != ch.is_ascii_digit()
            }
            None => false,
        };
        if boundary && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        if ch.is_alphanumeric() {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    let dates: Vec<String> = tokens
        .into_iter()
        .filter(|t| is_year(t) || is_month(t))
        .collect();
    if dates.is_empty() {
        None
    } else {
        Some(dates.join(" "))
    }
}
