//! Collector - acquires the UIS bulk-data archives
//!
//! One zip per indicator-set is downloaded into the working folder and kept
//! alongside a status marker, so later runs reuse it without a network call.

pub mod cache;
pub mod config;
pub mod fetch;

pub use cache::{ArchiveCache, CacheError, STATUS_OK};
pub use config::{ChartIndicator, Config, IndicatorSet, IndicatorSetsConfig};
pub use fetch::{ArchiveFetcher, HttpFetcher};
