//! Resume marker for the country loop.
//!
//! `{folder}/progress.txt` holds the iso3 of the country being processed. An
//! interrupted run restarts at that country; a finished run removes the file.

use anyhow::{Context, Result};
use parser::Country;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, warn};

pub const PROGRESS_FILE: &str = "progress.txt";
pub const RESET: &str = "RESET";

#[derive(Debug, Clone)]
pub struct Progress {
    path: PathBuf,
    start_at: Option<String>,
}

impl Progress {
    /// Resume point from `wheretostart` if given, otherwise from the marker.
    /// `RESET` removes the marker and starts from the beginning.
    pub async fn load(folder: &Path, wheretostart: Option<&str>) -> Result<Self> {
        let path = folder.join(PROGRESS_FILE);
        let start_at = match wheretostart.map(str::trim) {
            Some(value) if value.eq_ignore_ascii_case(RESET) => {
                remove_if_exists(&path).await?;
                info!("progress reset");
                None
            }
            Some(value) if !value.is_empty() => Some(value.to_uppercase()),
            _ => match fs::read_to_string(&path).await {
                Ok(content) => {
                    let code = content.trim().to_uppercase();
                    (!code.is_empty()).then_some(code)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("Failed to read {}", path.display()))
                }
            },
        };
        if let Some(code) = &start_at {
            info!(country = %code, "resuming");
        }
        Ok(Self { path, start_at })
    }

    pub fn start_at(&self) -> Option<&str> {
        self.start_at.as_deref()
    }

    /// Countries still to process: everything from the resume country on,
    /// or all of them when it is unset or not in the list.
    pub fn remaining<'c>(&self, countries: &'c [Country]) -> &'c [Country] {
        let Some(code) = &self.start_at else {
            return countries;
        };
        match countries.iter().position(|c| &c.iso3 == code) {
            Some(i) => &countries[i..],
            None => {
                warn!(country = %code, "resume country not found, starting from the beginning");
                countries
            }
        }
    }

    pub async fn mark_started(&self, country: &Country) -> Result<()> {
        fs::write(&self.path, &country.iso3)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }

    /// The loop ran to the end; the next run starts fresh.
    pub async fn complete(self) -> Result<()> {
        remove_if_exists(&self.path).await
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn countries() -> Vec<Country> {
        ["AFG", "ALB", "ARM", "ZWE"]
            .iter()
            .map(|iso3| Country {
                iso3: iso3.to_string(),
                iso2: iso3[..2].to_string(),
                countryname: iso3.to_string(),
            })
            .collect()
    }

    fn codes(countries: &[Country]) -> Vec<&str> {
        countries.iter().map(|c| c.iso3.as_str()).collect()
    }

    #[tokio::test]
    async fn test_fresh_start_processes_everything() {
        let tmp = tempfile::tempdir().unwrap();
        let progress = Progress::load(tmp.path(), None).await.unwrap();
        let all = countries();
        assert_eq!(progress.start_at(), None);
        assert_eq!(progress.remaining(&all).len(), 4);
    }

    #[tokio::test]
    async fn test_resume_from_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let all = countries();
        let progress = Progress::load(tmp.path(), None).await.unwrap();
        progress.mark_started(&all[2]).await.unwrap();

        let resumed = Progress::load(tmp.path(), None).await.unwrap();

        assert_eq!(resumed.start_at(), Some("ARM"));
        assert_eq!(codes(resumed.remaining(&all)), vec!["ARM", "ZWE"]);
    }

    #[tokio::test]
    async fn test_override_beats_marker() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(PROGRESS_FILE), "ARM").unwrap();

        let progress = Progress::load(tmp.path(), Some("alb")).await.unwrap();

        assert_eq!(codes(progress.remaining(&countries())), vec!["ALB", "ARM", "ZWE"]);
    }

    #[tokio::test]
    async fn test_reset_clears_marker() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join(PROGRESS_FILE), "ARM").unwrap();

        let progress = Progress::load(tmp.path(), Some("RESET")).await.unwrap();

        assert_eq!(progress.start_at(), None);
        assert!(!tmp.path().join(PROGRESS_FILE).exists());
    }

    #[tokio::test]
    async fn test_unknown_resume_country_starts_over() {
        let tmp = tempfile::tempdir().unwrap();
        let progress = Progress::load(tmp.path(), Some("XYZ")).await.unwrap();
        assert_eq!(progress.remaining(&countries()).len(), 4);
    }

    #[tokio::test]
    async fn test_complete_removes_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let progress = Progress::load(tmp.path(), None).await.unwrap();
        progress.mark_started(&countries()[0]).await.unwrap();
        assert!(tmp.path().join(PROGRESS_FILE).exists());

        progress.complete().await.unwrap();

        assert!(!tmp.path().join(PROGRESS_FILE).exists());
    }
}
