//! Directory listing for `GET /`.

use crate::models::file_status::FileStatus;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use std::{
    env, io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::fs;

#[derive(Debug, Error)]
pub enum ListError {
    #[error("cannot read directory `{}`: {source}", path.display())]
    ReadDir { path: PathBuf, source: io::Error },
    #[error("cannot stat `{}`: {source}", path.display())]
    Stat { path: PathBuf, source: io::Error },
}

#[async_trait]
pub trait StatusLister: Send + Sync {
    async fn list_statuses(&self, directory: &Path) -> Result<Vec<FileStatus>, ListError>;
}

/// Reads the storage directory straight from the filesystem.
///
/// Every file in the flat storage directory is written by this process, so the
/// owner reported is the account the server runs as.
#[derive(Debug, Clone)]
pub struct FsStatusLister {
    owner: String,
}

impl FsStatusLister {
    pub fn new() -> Self {
        let owner = env::var("USER")
            .or_else(|_| env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".into());
        Self::with_owner(owner)
    }

    pub fn with_owner(owner: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl Default for FsStatusLister {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusLister for FsStatusLister {
    async fn list_statuses(&self, directory: &Path) -> Result<Vec<FileStatus>, ListError> {
        let read_dir_err = |source| ListError::ReadDir {
            path: directory.to_path_buf(),
            source,
        };
        let mut entries = fs::read_dir(directory).await.map_err(read_dir_err)?;

        let mut statuses = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_dir_err)? {
            let path = entry.path();
            let meta = fs::metadata(&path)
                .await
                .map_err(|source| ListError::Stat {
                    path: path.clone(),
                    source,
                })?;
            if !meta.is_file() {
                continue;
            }

            // Birth time is not available on every filesystem.
            let created = meta
                .created()
                .or_else(|_| meta.modified())
                .map_err(|source| ListError::Stat {
                    path: path.clone(),
                    source,
                })?;

            statuses.push(FileStatus {
                file: entry.file_name().to_string_lossy().into_owned(),
                size: format_size(meta.len()),
                last_modified: DateTime::<Utc>::from(created)
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                owner: self.owner.clone(),
            });
        }

        statuses.sort_by(|a, b| a.file.cmp(&b.file));
        Ok(statuses)
    }
}

const UNITS: [&str; 9] = ["B", "kB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Decimal (SI) magnitude with three significant digits: `78902` → `"78.9 kB"`.
pub fn format_size(bytes: u64) -> String {
    if bytes < 1000 {
        return format!("{} B", bytes);
    }

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1000.0 && unit < UNITS.len() - 1 {
        value /= 1000.0;
        unit += 1;
    }

    let int_digits = value.log10().floor() as usize + 1;
    let decimals = 3usize.saturating_sub(int_digits);
    let mut number = format!("{:.*}", decimals, value);
    if number.contains('.') {
        let trimmed = number.trim_end_matches('0').trim_end_matches('.').len();
        number.truncate(trimmed);
    }

    format!("{} {}", number, UNITS[unit])
}
