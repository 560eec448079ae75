//! Network side of archive acquisition.

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;
use tokio::fs;
use tracing::info;

pub const USER_AGENT: &str = "uis-education-indicators/0.1 (HDX scraper)";

/// Downloads one archive into the working folder.
#[allow(async_fn_in_trait)]
pub trait ArchiveFetcher {
    /// Fetch `url` into `dest` and return the declared MIME type.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<String>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<String> {
        info!(url, "fetching archive");
        let resp = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()
            .context("HTTP request failed")?;

        let mime = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(mime_essence)
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let bytes = resp.bytes().await?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let content_hash = format!("sha256:{:x}", hasher.finalize());

        fs::write(dest, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", dest.display()))?;

        info!(
            path = %dest.display(),
            bytes = bytes.len(),
            mime = %mime,
            content_hash = %content_hash,
            "archive downloaded"
        );
        Ok(mime)
    }
}

/// `application/zip; charset=binary` -> `application/zip`
fn mime_essence(header: &str) -> String {
    header
        .split(';')
        .next()
        .unwrap_or(header)
        .trim()
        .to_ascii_lowercase()
}
