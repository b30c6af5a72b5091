use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::dates::parse_db_timestamp;
use common::{AppError, Result};
use normalizer::Document;
use regex::Regex;
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Destination of extracted documents.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Stores documents; a document replaces any earlier one with the same id.
    async fn update(&self, documents: &[Document]) -> Result<()>;

    /// `updated_at` of the most recently updated change stored for the repository.
    async fn last_updated(&self, repository_fullname: &str) -> Result<Option<DateTime<Utc>>>;
}

/// Which stored changes count toward a repository's watermark.
///
/// A repository starting with `^` is a Gerrit project regex and must match
/// the whole `repository_fullname`; anything else is an exact project name.
#[derive(Debug)]
pub enum RepositoryMatcher {
    Exact(String),
    Pattern(Regex),
}

impl RepositoryMatcher {
    pub fn new(repository: &str) -> Result<Self> {
        if repository.starts_with('^') {
            let anchored = format!("^(?:{})$", &repository[1..]);
            let pattern = Regex::new(&anchored).map_err(|err| AppError::Other(err.into()))?;
            Ok(Self::Pattern(pattern))
        } else {
            Ok(Self::Exact(repository.to_string()))
        }
    }

    pub fn matches(&self, repository_fullname: &str) -> bool {
        match self {
            Self::Exact(name) => name == repository_fullname,
            Self::Pattern(pattern) => pattern.is_match(repository_fullname),
        }
    }
}

/// One JSON document per line, at most one line per document id.
///
/// Every update rewrites the file through a temporary file in the same
/// directory, so readers see either the old or the new content.
pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parsed lines of the file, in file order. Unreadable lines are skipped.
    async fn read_values(&self) -> Result<Vec<Value>> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(AppError::sink(err)),
        };
        let mut values = Vec::new();
        for (index, line) in data.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(value) => values.push(value),
                Err(err) => {
                    warn!(path = %self.path.display(), line = index + 1, error = %err, "skipping unreadable line");
                }
            }
        }
        Ok(values)
    }
}

#[async_trait]
impl DocumentSink for JsonLinesSink {
    async fn update(&self, documents: &[Document]) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }
        let mut stored = Map::new();
        for value in self.read_values().await? {
            match value["id"].as_str() {
                Some(id) => {
                    stored.insert(id.to_string(), value);
                }
                None => warn!(path = %self.path.display(), "dropping stored document without id"),
            }
        }
        let before = stored.len();
        for document in documents {
            let value = serde_json::to_value(document).map_err(AppError::sink)?;
            stored.insert(document.id().to_string(), value);
        }

        let mut buffer = Vec::new();
        for value in stored.values() {
            serde_json::to_writer(&mut buffer, value).map_err(AppError::sink)?;
            buffer.push(b'\n');
        }
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || replace_file(&path, &buffer))
            .await
            .map_err(AppError::sink)??;
        debug!(
            path = %self.path.display(),
            written = documents.len(),
            added = stored.len() - before,
            total = stored.len(),
            "documents stored"
        );
        Ok(())
    }

    async fn last_updated(&self, repository_fullname: &str) -> Result<Option<DateTime<Utc>>> {
        let matcher = RepositoryMatcher::new(repository_fullname)?;
        let mut newest: Option<DateTime<Utc>> = None;
        for value in self.read_values().await? {
            if value["type"] != "Change" {
                continue;
            }
            let Some(repository) = value["repository_fullname"].as_str() else {
                continue;
            };
            if !matcher.matches(repository) {
                continue;
            }
            let Some(updated_at) = value["updated_at"].as_str() else {
                continue;
            };
            let updated_at = match parse_db_timestamp(updated_at) {
                Ok(updated_at) => updated_at,
                Err(err) => {
                    warn!(path = %self.path.display(), id = %value["id"], error = %err, "skipping change with unreadable updated_at");
                    continue;
                }
            };
            if newest.map_or(true, |current| updated_at > current) {
                newest = Some(updated_at);
            }
        }
        Ok(newest)
    }
}

fn replace_file(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir).map_err(AppError::sink)?;
    file.write_all(contents).map_err(AppError::sink)?;
    file.as_file().sync_all().map_err(AppError::sink)?;
    file.persist(path).map_err(AppError::sink)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_repository_matches_exactly() {
        let matcher = RepositoryMatcher::new("zuul/zuul").unwrap();
        assert!(matcher.matches("zuul/zuul"));
        assert!(!matcher.matches("zuul/zuul-jobs"));
        assert!(!matcher.matches("zuul"));
    }

    #[test]
    fn caret_repository_is_a_whole_name_regex() {
        let matcher = RepositoryMatcher::new("^zuul/.*").unwrap();
        assert!(matcher.matches("zuul/zuul"));
        assert!(matcher.matches("zuul/nodepool"));
        assert!(!matcher.matches("openstack/zuul"));
        assert!(!matcher.matches("opendev/zuul"));
    }

    #[test]
    fn invalid_regex_is_an_error() {
        assert!(RepositoryMatcher::new("^zuul/(").is_err());
    }
}
