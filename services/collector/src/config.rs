//! Indicator-set definitions and environment configuration for the collector.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub const DEFAULT_BASE_URL: &str =
    "https://uis.unesco.org/sites/default/files/documents/bdds/022025/";
pub const DEFAULT_WORK_DIR: &str = "./data/uis";

// =============================================================================
// Indicator-set configuration
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct IndicatorSetsConfig {
    pub version: String,
    /// Keyed by indicator-set code, in processing order.
    pub indicator_sets: IndexMap<String, IndicatorSet>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSet {
    pub title: String,
    #[serde(default)]
    pub quickcharts: Vec<ChartIndicator>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// An indicator chosen for a QuickCharts bite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartIndicator {
    pub code: String,
    pub title: String,
    pub unit: String,
}

impl IndicatorSetsConfig {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read indicator-set config {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse indicator-set config {}", path.display()))
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Enabled indicator-sets, optionally narrowed to the given codes.
    pub fn select(&self, only: &[String]) -> IndexMap<String, IndicatorSet> {
        self.indicator_sets
            .iter()
            .filter(|(code, set)| {
                if !set.enabled {
                    return false;
                }
                only.is_empty() || only.iter().any(|o| o == *code)
            })
            .map(|(code, set)| (code.clone(), set.clone()))
            .collect()
    }
}

// =============================================================================
// Environment
// =============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub work_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            work_dir: PathBuf::from(
                std::env::var("WORK_DIR").unwrap_or_else(|_| DEFAULT_WORK_DIR.to_string()),
            ),
        }
    }
}
