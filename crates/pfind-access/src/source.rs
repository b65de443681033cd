//! Allow-list sources

use async_trait::async_trait;
use pfind_core::{Error, Result};
use std::path::PathBuf;

/// Trim and lower-case an identity; empty input yields `None`.
pub fn normalize_identity(identity: &str) -> Option<String> {
    let trimmed = identity.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_lowercase())
}

/// Produces the current set of authorized identities.
#[async_trait]
pub trait AllowlistSource: Send + Sync {
    /// Fetch the raw entries; normalization happens in the [`crate::Authorizer`].
    async fn fetch(&self) -> Result<Vec<String>>;

    fn describe(&self) -> String;
}

/// A fixed list, typically from config.toml.
pub struct StaticAllowlist {
    users: Vec<String>,
}

impl StaticAllowlist {
    pub fn new<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            users: users.into_iter().map(Into::into).collect(),
        }
    }
}

#[async_trait]
impl AllowlistSource for StaticAllowlist {
    async fn fetch(&self) -> Result<Vec<String>> {
        Ok(self.users.clone())
    }

    fn describe(&self) -> String {
        format!("static list ({} entries)", self.users.len())
    }
}

/// A text file with one identity per line.
///
/// Blank lines and lines starting with `#` are skipped; for CSV exports only
/// the first column is read.
pub struct FileAllowlist {
    path: PathBuf,
}

impl FileAllowlist {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl AllowlistSource for FileAllowlist {
    async fn fetch(&self) -> Result<Vec<String>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Config(format!(
                "cannot read allow-list {}: {}",
                self.path.display(),
                e
            ))
        })?;

        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .filter_map(|line| line.split(',').next())
            .map(|cell| cell.trim().trim_matches('"').to_string())
            .collect())
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}
