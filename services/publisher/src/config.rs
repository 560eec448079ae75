//! Pipeline configuration: collector settings plus catalog access.

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::path::Path;
use tokio::fs;

pub const DEFAULT_CKAN_URL: &str = "https://data.humdata.org";
pub const UPDATED_BY_SCRIPT: &str = "HDX Scraper: UNESCO";

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub collector: collector::Config,
    pub ckan_url: String,
    pub ckan_api_key: Option<String>,
    pub wheretostart: Option<String>,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        Self {
            collector: collector::Config::from_env(),
            ckan_url: std::env::var("CKAN_URL").unwrap_or_else(|_| DEFAULT_CKAN_URL.to_string()),
            ckan_api_key: std::env::var("CKAN_API_KEY").ok().filter(|k| !k.is_empty()),
            wheretostart: std::env::var("WHERETOSTART").ok().filter(|w| !w.is_empty()),
        }
    }
}

/// Fixed dataset fields merged into every dataset.
pub async fn load_static_fields(path: impl AsRef<Path>) -> Result<Map<String, Value>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read dataset fields {}", path.display()))?;
    parse_static_fields(&content)
        .with_context(|| format!("Failed to parse dataset fields {}", path.display()))
}

pub fn parse_static_fields(content: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(content)? {
        Value::Object(fields) => Ok(fields),
        other => anyhow::bail!("expected a JSON object, found {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_static_fields_keeps_order() {
        let fields = parse_static_fields(
            r#"{"license_id": "cc-by-igo", "methodology": "Registry", "caveats": "None"}"#,
        )
        .unwrap();
        let keys: Vec<_> = fields.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["license_id", "methodology", "caveats"]);
    }

    #[test]
    fn test_parse_static_fields_rejects_non_object() {
        assert!(parse_static_fields("[1, 2]").is_err());
    }

    #[tokio::test]
    async fn test_repository_static_fields_load() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../config/dataset_static.json");
        let fields = load_static_fields(&path).await.unwrap();
        assert!(fields.contains_key("license_id"));
        assert!(fields.contains_key("dataset_source"));
    }
}
