//! Publisher - builds one catalog dataset per country and publishes it
//!
//! Responsibilities:
//! - Assemble per-country datasets, resources and showcases from the index
//! - Write resource CSVs with HXL tags and QuickCharts cut-downs
//! - Publish to a CKAN catalog (or write dry-run payloads)
//! - Drive the whole run with a resumable country loop

pub mod builder;
pub mod catalog;
pub mod config;
pub mod period;
pub mod pipeline;
pub mod progress;
pub mod publish;
pub mod quickcharts;

pub use builder::{BuiltCountry, CountryAccumulator, CountryDatasetBuilder};
pub use catalog::{slugify, CatalogError, Dataset, Resource, Showcase, UpdateFrequency};
pub use config::PipelineConfig;
pub use period::DateSpan;
pub use pipeline::{run, RunOptions};
pub use progress::Progress;
pub use publish::{CkanClient, PublishError, Publisher};
pub use quickcharts::{quickcharts_view, ResourceView};
