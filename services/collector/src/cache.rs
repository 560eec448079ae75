//! Idempotent per-indicator-set archive cache.
//!
//! Layout inside the working folder:
//!   {CODE}.zip  - the archive
//!   {CODE}.txt  - status marker, exactly "OK" once the archive is usable
//!
//! A zip without a readable "OK" marker is treated as stale: both files are
//! purged and the archive is downloaded again, once.

use anyhow::{Context, Result};
use indexmap::IndexMap;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::fetch::ArchiveFetcher;

pub const STATUS_OK: &str = "OK";

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Problem with {}: content type {content_type:?} is not an archive", path.display())]
    NotAnArchive { path: PathBuf, content_type: String },
}

#[derive(Debug, Clone)]
pub struct ArchiveCache {
    folder: PathBuf,
}

impl ArchiveCache {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    pub fn archive_path(&self, code: &str) -> PathBuf {
        self.folder.join(format!("{}.zip", code))
    }

    pub fn status_path(&self, code: &str) -> PathBuf {
        self.folder.join(format!("{}.txt", code))
    }

    /// True when the zip exists and its status marker reads exactly "OK".
    pub async fn is_valid(&self, code: &str) -> bool {
        if !fs::try_exists(self.archive_path(code)).await.unwrap_or(false) {
            return false;
        }
        match fs::read(self.status_path(code)).await {
            Ok(status) => status == STATUS_OK.as_bytes(),
            Err(_) => false,
        }
    }

    /// Remove the archive and its status marker, whichever exist.
    pub async fn invalidate(&self, code: &str) -> Result<()> {
        for path in [self.status_path(code), self.archive_path(code)] {
            if fs::try_exists(&path).await.unwrap_or(false) {
                fs::remove_file(&path)
                    .await
                    .with_context(|| format!("Failed to remove stale {}", path.display()))?;
            }
        }
        Ok(())
    }

    /// Make every code's archive available locally, downloading only those
    /// without a valid status marker. Returned in `codes` order.
    pub async fn acquire<F, I, S>(
        &self,
        fetcher: &F,
        base_url: &str,
        codes: I,
    ) -> Result<IndexMap<String, PathBuf>>
    where
        F: ArchiveFetcher,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        fs::create_dir_all(&self.folder)
            .await
            .with_context(|| format!("Failed to create {}", self.folder.display()))?;

        let mut archives = IndexMap::new();
        for code in codes {
            let code = code.as_ref();
            let path = self.archive_path(code);

            if self.is_valid(code).await {
                info!(indicator_set = code, path = %path.display(), outcome = "cached", "reusing archive");
                archives.insert(code.to_string(), path);
                continue;
            }

            self.invalidate(code).await?;

            let url = format!("{}{}.zip", base_url, code);
            let content_type = fetcher.fetch(&url, &path).await?;
            if !content_type.contains("zip") {
                warn!(indicator_set = code, content_type = %content_type, "download is not an archive");
                return Err(CacheError::NotAnArchive { path, content_type }.into());
            }

            fs::write(self.status_path(code), STATUS_OK)
                .await
                .with_context(|| format!("Failed to write status for {}", code))?;
            info!(indicator_set = code, path = %path.display(), outcome = "downloaded", "archive ready");
            archives.insert(code.to_string(), path);
        }
        Ok(archives)
    }
}
