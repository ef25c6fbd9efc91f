//! Freshness bookkeeping for fetched resources.
//!
//! Each target directory carries a single JSON index mapping locator strings
//! to what was last fetched for them:
//!
//! ```text
//! <target_dir>/
//! ├── .clirack-index.json   # locator -> {path, resolved_ref, fetched_at}
//! ├── .clirack-index.lock   # exclusive lock held while the index is rewritten
//! ├── corvis-esphome-packages-1a2b3c4d/
//! └── tool.tar.gz-5e6f7a8b/
//! ```
//!
//! Entries are created on the first successful fetch and replaced on refresh.
//! Nothing here deletes directories; clearing the target directory is the
//! caller's business.

use chrono::{DateTime, Utc};
use fs4::tokio::AsyncFileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::{Error, Result};

/// File name of the index inside the target directory.
pub const INDEX_FILE_NAME: &str = ".clirack-index.json";

const LOCK_FILE_NAME: &str = ".clirack-index.lock";
const INDEX_VERSION: u32 = 1;

/// What was last fetched for a locator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Locator string exactly as given to `load()`.
    pub locator: String,
    /// Absolute path of the materialization.
    pub path: PathBuf,
    /// Concrete version that was fetched.
    pub resolved_ref: String,
    /// When the fetch completed.
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Whether the materialization recorded by this entry is still present
    /// (an existing file, or a non-empty directory).
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        if self.path.is_file() {
            return true;
        }
        std::fs::read_dir(&self.path)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IndexDocument {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, CacheEntry>,
}

impl Default for IndexDocument {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

/// Durable locator index co-located with a target directory.
#[derive(Debug)]
pub struct CacheIndex {
    root: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl CacheIndex {
    /// Create an index for the given target directory.
    ///
    /// Nothing is created on disk until the first [`record`](Self::record).
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// The target directory this index belongs to.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the index file.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE_NAME)
    }

    /// Look up the entry for a locator.
    pub async fn lookup(&self, locator: &str) -> Result<Option<CacheEntry>> {
        let document = self.read_document().await?;
        let entry = document.entries.get(locator).cloned();
        trace!(locator, hit = entry.is_some(), "Cache index lookup");
        Ok(entry)
    }

    /// Record a successful fetch, replacing any previous entry.
    pub async fn record(
        &self,
        locator: &str,
        path: impl Into<PathBuf>,
        resolved_ref: impl Into<String>,
    ) -> Result<CacheEntry> {
        let entry = CacheEntry {
            locator: locator.to_string(),
            path: path.into(),
            resolved_ref: resolved_ref.into(),
            fetched_at: Utc::now(),
        };

        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::io(e, &self.root, "create_dir_all"))?;

        let lock_path = self.root.join(LOCK_FILE_NAME);
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .await
            .map_err(|e| Error::io(e, &lock_path, "open"))?;
        lock_file
            .lock_exclusive()
            .map_err(|e| Error::io(e, &lock_path, "lock"))?;

        let mut document = self.read_document().await?;
        document.entries.insert(locator.to_string(), entry.clone());
        self.write_document(&document).await?;

        // Unlock happens automatically when the lock file is dropped
        drop(lock_file);

        debug!(locator, resolved_ref = %entry.resolved_ref, "Recorded cache entry");
        Ok(entry)
    }

    /// All entries, ordered by locator.
    pub async fn entries(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.read_document().await?.entries.into_values().collect())
    }

    async fn read_document(&self) -> Result<IndexDocument> {
        let path = self.index_path();
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(IndexDocument::default());
            }
            Err(e) => return Err(Error::io(e, &path, "read")),
        };

        match serde_json::from_str::<IndexDocument>(&contents) {
            Ok(document) if document.version == INDEX_VERSION => Ok(document),
            Ok(document) => {
                warn!(
                    path = %path.display(),
                    version = document.version,
                    "Cache index has unknown version, treating as empty"
                );
                Ok(IndexDocument::default())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cache index is corrupted, treating as empty");
                Ok(IndexDocument::default())
            }
        }
    }

    async fn write_document(&self, document: &IndexDocument) -> Result<()> {
        let path = self.index_path();
        let contents = serde_json::to_string_pretty(document)
            .map_err(|e| Error::serialization(format!("Failed to serialize cache index: {e}")))?;

        // Write to a temporary file first, then rename atomically
        let temp_path = path.with_extension("json.tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .await
            .map_err(|e| Error::io(e, &temp_path, "open"))?;
        file.write_all(contents.as_bytes())
            .await
            .map_err(|e| Error::io(e, &temp_path, "write_all"))?;
        file.sync_all()
            .await
            .map_err(|e| Error::io(e, &temp_path, "sync_all"))?;
        drop(file);

        fs::rename(&temp_path, &path)
            .await
            .map_err(|e| Error::io(e, &path, "rename"))?;
        Ok(())
    }
}
