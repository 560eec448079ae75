//! Catalog publishing: the CKAN action API, or a dry run that writes the
//! payloads to disk.

use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info};

use crate::builder::BuiltCountry;
use crate::catalog::{Dataset, Resource, Showcase};
use crate::config::UPDATED_BY_SCRIPT;
use crate::quickcharts::ResourceView;

const USER_AGENT: &str = "uis-education-indicators/0.1 (HDX scraper)";

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("API token may not create datasets in organization {organization}")]
    PermissionDenied { organization: String },
    #[error("{action} failed: {message}")]
    Action { action: String, message: String },
}

/// Identifiers the catalog assigned to a published dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedDataset {
    pub id: String,
    pub resource_ids: Vec<String>,
}

pub struct CkanClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CkanClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/api/3/action/{}", self.base_url, action)
    }

    /// Call `action` with a JSON body. `Ok(None)` when the object does not
    /// exist.
    async fn call(&self, action: &str, body: &Value) -> Result<Option<Value>> {
        debug!(action, "ckan call");
        let resp = self
            .client
            .post(self.action_url(action))
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("{} request failed", action))?;
        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .with_context(|| format!("{} returned a non-JSON body", action))?;
        action_result(action, status.as_u16(), body)
    }

    async fn call_required(&self, action: &str, body: &Value) -> Result<Value> {
        self.call(action, body).await?.ok_or_else(|| {
            PublishError::Action {
                action: action.to_string(),
                message: "not found".to_string(),
            }
            .into()
        })
    }

    /// Fail unless the token may create datasets in `organization` (id or
    /// name).
    pub async fn check_organization_access(&self, organization: &str) -> Result<()> {
        let orgs = self
            .call_required(
                "organization_list_for_user",
                &json!({ "permission": "create_dataset" }),
            )
            .await?;
        let allowed = orgs.as_array().is_some_and(|orgs| {
            orgs.iter().any(|org| {
                org["id"].as_str() == Some(organization) || org["name"].as_str() == Some(organization)
            })
        });
        if !allowed {
            return Err(PublishError::PermissionDenied {
                organization: organization.to_string(),
            }
            .into());
        }
        info!(organization, "organization access confirmed");
        Ok(())
    }

    /// Create or update the dataset by name, then upload its resources in
    /// order. Resources already on the catalog are replaced.
    pub async fn publish_dataset(&self, dataset: &Dataset, batch: &str) -> Result<PublishedDataset> {
        let existing = self
            .call("package_show", &json!({ "id": dataset.name }))
            .await?;

        let mut body = serde_json::to_value(dataset)?;
        body["resources"] = json!([]);
        body["batch"] = json!(batch);
        body["updated_by_script"] = json!(UPDATED_BY_SCRIPT);

        let action = match existing.as_ref().and_then(|p| p["id"].as_str()) {
            Some(id) => {
                body["id"] = json!(id);
                "package_update"
            }
            None => "package_create",
        };
        let package = self.call_required(action, &body).await?;
        let id = package["id"]
            .as_str()
            .with_context(|| format!("{} returned no dataset id", action))?
            .to_string();
        info!(dataset = %dataset.name, action, "dataset saved");

        let mut resource_ids = Vec::with_capacity(dataset.number_of_resources());
        for resource in dataset.resources() {
            resource_ids.push(self.upload_resource(&id, resource).await?);
        }
        Ok(PublishedDataset { id, resource_ids })
    }

    async fn upload_resource(&self, package_id: &str, resource: &Resource) -> Result<String> {
        let bytes = fs::read(&resource.path)
            .await
            .with_context(|| format!("Failed to read {}", resource.path.display()))?;
        let file_name = resource
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| resource.name.clone());
        let size = bytes.len();

        let form = Form::new()
            .text("package_id", package_id.to_string())
            .text("name", resource.name.clone())
            .text("description", resource.description.clone())
            .text("format", resource.format.clone())
            .text("resource_type", resource.resource_type.clone())
            .text("url_type", resource.url_type.clone())
            .text("url", "")
            .part("upload", Part::bytes(bytes).file_name(file_name).mime_str("text/csv")?);

        let resp = self
            .client
            .post(self.action_url("resource_create"))
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .multipart(form)
            .send()
            .await
            .context("resource_create request failed")?;
        let status = resp.status().as_u16();
        let body: Value = resp.json().await.context("resource_create returned a non-JSON body")?;
        let created = action_result("resource_create", status, body)?.unwrap_or(Value::Null);
        let id = created["id"]
            .as_str()
            .context("resource_create returned no resource id")?
            .to_string();
        info!(resource = %resource.name, bytes = size, "resource uploaded");
        Ok(id)
    }

    pub async fn create_view(&self, resource_id: &str, view: &ResourceView) -> Result<()> {
        let mut body = serde_json::to_value(view)?;
        body["resource_id"] = json!(resource_id);
        self.call_required("resource_view_create", &body).await?;
        info!(resource_id, view_type = %view.view_type, "resource view created");
        Ok(())
    }

    /// Create or update the showcase by name and link it to the dataset.
    pub async fn publish_showcase(&self, showcase: &Showcase, package_id: &str) -> Result<()> {
        let existing = self
            .call("ckanext_showcase_show", &json!({ "id": showcase.name }))
            .await?;
        let mut body = serde_json::to_value(showcase)?;
        let action = match existing.as_ref().and_then(|s| s["id"].as_str()) {
            Some(id) => {
                body["id"] = json!(id);
                "ckanext_showcase_update"
            }
            None => "ckanext_showcase_create",
        };
        let saved = self.call_required(action, &body).await?;
        let showcase_id = saved["id"]
            .as_str()
            .unwrap_or(showcase.name.as_str())
            .to_string();

        self.call_required(
            "ckanext_showcase_package_association_create",
            &json!({ "package_id": package_id, "showcase_id": showcase_id }),
        )
        .await?;
        info!(showcase = %showcase.name, action, "showcase saved");
        Ok(())
    }
}

/// Unwrap a CKAN action envelope.
fn action_result(action: &str, status: u16, body: Value) -> Result<Option<Value>> {
    if body["success"].as_bool() == Some(true) {
        return Ok(Some(body["result"].clone()));
    }
    let error = &body["error"];
    if status == 404 || error["__type"].as_str() == Some("Not Found Error") {
        return Ok(None);
    }
    let message = error["message"]
        .as_str()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}: {}", status, error));
    Err(PublishError::Action {
        action: action.to_string(),
        message,
    }
    .into())
}

#[derive(Serialize)]
struct DryRunRecord<'a> {
    batch: &'a str,
    updated_by_script: &'a str,
    dataset: &'a Dataset,
    resources: Vec<DryRunResource<'a>>,
    view: Option<&'a ResourceView>,
    showcase: &'a Showcase,
}

#[derive(Serialize)]
struct DryRunResource<'a> {
    #[serde(flatten)]
    resource: &'a Resource,
    file: String,
}

pub enum Publisher {
    Ckan(CkanClient),
    /// Write `{folder}/{dataset name}.json` instead of calling the catalog.
    DryRun { folder: PathBuf },
}

impl Publisher {
    pub async fn check_access(&self, organization: &str) -> Result<()> {
        match self {
            Self::Ckan(client) => client.check_organization_access(organization).await,
            Self::DryRun { .. } => Ok(()),
        }
    }

    pub async fn publish(
        &self,
        built: &BuiltCountry,
        view: Option<&ResourceView>,
        batch: &str,
    ) -> Result<()> {
        match self {
            Self::Ckan(client) => {
                let published = client.publish_dataset(&built.dataset, batch).await?;
                if let Some(view) = view {
                    let qc_id = built
                        .dataset
                        .resources()
                        .iter()
                        .zip(&published.resource_ids)
                        .filter(|(r, _)| r.is_quickcharts())
                        .map(|(_, id)| id)
                        .last();
                    if let Some(id) = qc_id {
                        client.create_view(id, view).await?;
                    }
                }
                client.publish_showcase(&built.showcase, &published.id).await
            }
            Self::DryRun { folder } => {
                let record = DryRunRecord {
                    batch,
                    updated_by_script: UPDATED_BY_SCRIPT,
                    dataset: &built.dataset,
                    resources: built
                        .dataset
                        .resources()
                        .iter()
                        .map(|resource| DryRunResource {
                            resource,
                            file: resource.path.display().to_string(),
                        })
                        .collect(),
                    view,
                    showcase: &built.showcase,
                };
                fs::create_dir_all(folder).await?;
                let path = folder.join(format!("{}.json", built.dataset.name));
                fs::write(&path, serde_json::to_vec_pretty(&record)?)
                    .await
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                info!(path = %path.display(), "dry run: dataset written");
                Ok(())
            }
        }
    }
}
