//! Metadata describing a completed load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ResourceLocator;

/// Result of a successful load.
///
/// Values are immutable once built; the `with_*` methods consume the value
/// and return an updated copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedDataMeta {
    /// The locator that was loaded.
    pub locator: ResourceLocator,
    /// Absolute path of the local materialization (directory or file).
    pub path: PathBuf,
    /// Concrete upstream version that was fetched (commit SHA, content digest).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_ref: Option<String>,
    /// Whether the data was served from the cache without downloading.
    pub from_cache: bool,
    /// Subpath of interest below `path`, relative.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subpath: Option<String>,
    /// Whether `path` is a single file rather than a directory.
    pub is_file: bool,
    /// When the data at `path` was fetched.
    pub fetched_at: DateTime<Utc>,
}

impl LoadedDataMeta {
    /// Create metadata for a directory materialized now.
    #[must_use]
    pub fn new(locator: ResourceLocator, path: impl Into<PathBuf>) -> Self {
        Self {
            locator,
            path: path.into(),
            resolved_ref: None,
            from_cache: false,
            subpath: None,
            is_file: false,
            fetched_at: Utc::now(),
        }
    }

    /// Set the resolved upstream version.
    #[must_use]
    pub fn with_resolved_ref(mut self, resolved_ref: impl Into<String>) -> Self {
        self.resolved_ref = Some(resolved_ref.into());
        self
    }

    /// Mark whether the data came from the cache.
    #[must_use]
    pub fn with_from_cache(mut self, from_cache: bool) -> Self {
        self.from_cache = from_cache;
        self
    }

    /// Set the subpath of interest.
    #[must_use]
    pub fn with_subpath(mut self, subpath: impl Into<String>) -> Self {
        self.subpath = Some(subpath.into());
        self
    }

    /// Mark the materialization as a single file.
    #[must_use]
    pub fn with_is_file(mut self, is_file: bool) -> Self {
        self.is_file = is_file;
        self
    }

    /// Override the fetch timestamp (used when serving from cache).
    #[must_use]
    pub fn with_fetched_at(mut self, fetched_at: DateTime<Utc>) -> Self {
        self.fetched_at = fetched_at;
        self
    }

    /// The path of interest: `path` joined with `subpath` when set.
    #[must_use]
    pub fn target_path(&self) -> PathBuf {
        match &self.subpath {
            Some(sub) if !sub.is_empty() => self.path.join(sub),
            _ => self.path.clone(),
        }
    }

    /// Root of the local materialization.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.path
    }
}
