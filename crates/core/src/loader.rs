//! Loader trait for pluggable resource fetching.
//!
//! Each scheme (`local`, `github`, `https`, ...) is served by a [`Loader`]
//! registered with the [`LoaderRegistry`](crate::LoaderRegistry). Loaders
//! receive the parsed locator plus a [`FetchContext`] describing where to
//! materialize data and how to bound network work.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CacheIndex;
use crate::lock::{KeyLock, LockTable};
use crate::retry::{RetryConfig, with_retry};
use crate::{Error, LoadedDataMeta, ResourceLocator, Result};

/// Everything a loader needs besides the locator.
#[derive(Debug, Clone, Copy)]
pub struct FetchContext<'a> {
    /// Absolute root directory for materialized resources.
    pub target_dir: &'a Path,
    /// Freshness index for `target_dir`.
    pub cache: &'a CacheIndex,
    /// Deadline applied to each network call.
    pub timeout: Option<Duration>,
    /// Retry policy for transient remote failures.
    pub retry: &'a RetryConfig,
    /// Skip the freshness check.
    pub force_reload: bool,
    /// Locks for directories being written, shared by every load of the
    /// registry.
    pub writers: &'a LockTable,
}

impl<'a> FetchContext<'a> {
    /// Directory reserved for a resource with the given computed name.
    #[must_use]
    pub fn resource_dir(&self, name: &str) -> PathBuf {
        self.target_dir.join(name)
    }

    /// Reserve exclusive write access to `dir`.
    ///
    /// Distinct locators may map to the same directory, so loaders hold this
    /// from the freshness check until the cache entry is recorded:
    ///
    /// ```ignore
    /// let dir_lock = ctx.lock_dir(&dest);
    /// let _writing = dir_lock.acquire().await;
    /// ```
    #[must_use]
    pub fn lock_dir(&self, dir: &Path) -> KeyLock<'a> {
        self.writers.key(dir.to_string_lossy())
    }

    /// Run a network future under the configured deadline.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`] when the deadline passes; the future is
    /// dropped, so anything it staged is discarded.
    pub async fn with_deadline<T, F>(&self, locator: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match self.timeout {
            Some(after) => tokio::time::timeout(after, fut)
                .await
                .map_err(|_| Error::timeout(locator, after))?,
            None => fut.await,
        }
    }

    /// Run a network operation with the configured deadline and retry policy.
    pub async fn remote_call<T, F, Fut>(&self, locator: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        with_retry(self.retry, || self.with_deadline(locator, operation())).await
    }
}

/// Trait for resource loaders (local paths, GitHub repositories, archive URLs).
///
/// Implementations must only write below directories they compute from the
/// locator under [`FetchContext::target_dir`].
///
/// # Example
///
/// ```ignore
/// pub struct MyLoader;
///
/// #[async_trait]
/// impl Loader for MyLoader {
///     fn name(&self) -> &'static str { "my" }
///     fn description(&self) -> &'static str { "Fetch things from my service" }
///     async fn fetch(&self, locator: &ResourceLocator, ctx: &FetchContext<'_>)
///         -> Result<LoadedDataMeta> { /* ... */ }
/// }
/// ```
#[async_trait]
pub trait Loader: Send + Sync {
    /// Short loader name used in listings and logs.
    fn name(&self) -> &'static str;

    /// Human-readable description for help text.
    fn description(&self) -> &'static str;

    /// Produce or reuse a local materialization of `locator`.
    ///
    /// # Errors
    ///
    /// Returns one of the loader error kinds: [`Error::MalformedLocator`]
    /// when the payload does not match the loader's grammar,
    /// [`Error::ResourceNotFound`], [`Error::RemoteUnavailable`],
    /// [`Error::Timeout`], or I/O and unpacking failures.
    async fn fetch(
        &self,
        locator: &ResourceLocator,
        ctx: &FetchContext<'_>,
    ) -> Result<LoadedDataMeta>;
}

/// First 8 hex characters of the SHA-256 of `input`.
///
/// Used to derive stable directory names from locator fields.
#[must_use]
pub fn hash_suffix(input: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(input.as_bytes()));
    digest[..8].to_string()
}

/// Replace characters that are awkward in directory names.
#[must_use]
pub fn sanitize_component(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        "resource".to_string()
    } else {
        trimmed.to_string()
    }
}
