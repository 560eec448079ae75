//! Parser - turns cached UIS archives into indexed tables
//!
//! Responsibilities:
//! - Classify archive members and extract them with normalized headers
//! - Read CSV members with their declared text encoding
//! - Index indicator labels (rows + short names) per indicator-set
//! - Resolve the countries seen across all indicator-sets

pub mod countries;
pub mod extract;
pub mod index;
pub mod indicators;
pub mod tabular;

pub use countries::{index_countries, Country, CountryCodes, CountryLookup};
pub use extract::{ArchiveExtractor, ExtractError, ExtractedArchive, MemberKind};
pub use index::{index_archives, ArchiveIndex, DataFileRef, COUNTRY_COLUMN};
pub use indicators::{short_name, IndicatorTable};
pub use tabular::{Row, TabularReader};
