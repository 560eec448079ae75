//! QuickCharts resource view: one time-series bite per charted indicator.

use anyhow::{Context, Result};
use collector::ChartIndicator;
use serde::Serialize;
use serde_json::{json, Value};

use crate::catalog::Dataset;

pub const VIEW_TYPE: &str = "hdx_hxl_preview";
const CONFIG_VERSION: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceView {
    pub title: String,
    pub description: String,
    pub view_type: String,
    /// JSON document, serialized, as the preview extension expects it.
    pub hxl_preview_config: String,
}

/// View for the dataset's QuickCharts resource, or `None` when the dataset
/// has no such resource or every bite is disabled.
pub fn quickcharts_view(
    dataset: &Dataset,
    bites_disabled: Option<&[bool]>,
    indicators: &[ChartIndicator],
) -> Result<Option<ResourceView>> {
    if !dataset.resources().iter().any(|r| r.is_quickcharts()) {
        return Ok(None);
    }

    let bites: Vec<Value> = indicators
        .iter()
        .enumerate()
        .filter(|(i, _)| !bites_disabled.and_then(|d| d.get(*i)).copied().unwrap_or(false))
        .map(|(_, indicator)| timeseries_bite(indicator))
        .collect();
    if bites.is_empty() {
        return Ok(None);
    }

    let config = json!({
        "configVersion": CONFIG_VERSION,
        "bites": bites,
        "recipeUrl": "",
    });
    Ok(Some(ResourceView {
        title: "Quick Charts".to_string(),
        description: String::new(),
        view_type: VIEW_TYPE.to_string(),
        hxl_preview_config: serde_json::to_string(&config)
            .context("Failed to serialize QuickCharts config")?,
    }))
}

fn timeseries_bite(indicator: &ChartIndicator) -> Value {
    json!({
        "init": true,
        "type": "timeseries",
        "filteredValues": [],
        "errorMsg": null,
        "ingredient": {
            "valueColumn": "#indicator+value+num",
            "aggregateFunction": "sum",
            "dateColumn": "#date+year",
            "comparisonOperator": null,
            "comparisonValue": null,
            "title": indicator.title,
            "description": format!("Unit: {}", indicator.unit),
            "filters": {
                "filterWith": [{ "#indicator+code": indicator.code }],
            },
        },
        "dataTitle": indicator.unit,
        "displayCategory": "Timeseries",
        "hashCode": indicator.code,
    })
}
